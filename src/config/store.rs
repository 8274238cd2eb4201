use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::backend::Backend;
use crate::config::device::DeviceIdentity;
use crate::config::types::{Config, Device, Game, Settings};
use crate::error::{Error, Result};
use crate::notify::Notifier;

/// Process-wide configuration store.
///
/// State lives inside a watch channel: `snapshot` clones it, `with` reads
/// it in place, `subscribe` hands out a change-notified receiver. Only the
/// action methods below reach the sender, so every persisting write flows
/// through `save`. What goes to the backend is always a plain `Config`
/// clone, never anything carrying subscription state.
pub struct ConfigStore {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    identity: Arc<DeviceIdentity>,
    tx: watch::Sender<Config>,
}

impl ConfigStore {
    pub fn new(
        backend: Arc<dyn Backend>,
        notifier: Notifier,
        identity: Arc<DeviceIdentity>,
    ) -> Self {
        let (tx, _) = watch::channel(Config::default());
        Self {
            backend,
            notifier,
            identity,
            tx,
        }
    }

    pub fn snapshot(&self) -> Config {
        self.tx.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&Config) -> R) -> R {
        f(&self.tx.borrow())
    }

    pub fn subscribe(&self) -> watch::Receiver<Config> {
        self.tx.subscribe()
    }

    /// Replace the whole store with the backend's authoritative config.
    /// On failure the local state is left exactly as it was.
    pub async fn refresh(&self) {
        match self.backend.get_config().await {
            Ok(config) => {
                self.tx.send_replace(config);
            }
            Err(e) => {
                log::error!("failed to load local config: {e}");
                self.notifier.error(format!("Failed to load local config: {e}"));
            }
        }
    }

    /// Replace the store without persisting; used for backend pushes and
    /// the remote-apply path, where the backend already holds this value.
    pub fn apply_snapshot(&self, config: Config) {
        self.tx.send_replace(config);
    }

    /// Replace the store with `config` and persist it exactly as given,
    /// without stamping `last_updated`. The undo path.
    pub async fn restore(&self, config: Config) -> Result<()> {
        self.tx.send_replace(config.clone());
        self.backend.save_config(&config).await
    }

    /// Stamp `last_updated` and hand a plain snapshot to the backend. A
    /// failed save keeps the in-memory change; a later refresh or restart
    /// reconciles through `last_updated`.
    pub async fn save(&self) {
        let mut snapshot = Config::default();
        self.tx.send_modify(|config| {
            config.last_updated = Utc::now();
            snapshot = config.clone();
        });
        self.persist(&snapshot).await;
    }

    /// Record a completed upload. Deliberately does not move
    /// `last_updated`: stamping it here would mark the config dirty again
    /// and re-trigger the next auto upload.
    pub async fn set_last_uploaded(&self, at: DateTime<Utc>) {
        let mut snapshot = Config::default();
        self.tx.send_modify(|config| {
            config.last_uploaded = Some(at);
            snapshot = config.clone();
        });
        self.persist(&snapshot).await;
    }

    async fn persist(&self, snapshot: &Config) {
        if let Err(e) = self.backend.save_config(snapshot).await {
            log::error!("failed to save config: {e}");
            self.notifier.error(format!("Failed to save config: {e}"));
        }
    }

    pub async fn add_game(&self, mut game: Game) {
        game.added_time = Utc::now();
        self.tx.send_modify(move |config| config.games.push(game));
        self.save().await;
    }

    /// Splice by positional index. Callers resolve the index from the
    /// stable id first (`Config::game_index`); an unresolvable index here
    /// means the view and the store disagree.
    pub async fn remove_game(&self, index: usize) {
        let in_range = self.with(|config| index < config.games.len());
        if !in_range {
            log::error!("remove_game: no game at index {index}");
            self.notifier
                .internal(format!("delete failed, no game at position {index}"));
            return;
        }
        self.tx.send_modify(|config| {
            config.games.remove(index);
        });
        self.save().await;
    }

    pub async fn update_game(&self, index: usize, game: Game) {
        let in_range = self.with(|config| index < config.games.len());
        if !in_range {
            log::warn!("update_game: no game at index {index}");
            return;
        }
        self.tx.send_modify(move |config| {
            config.games[index] = game;
        });
        self.save().await;
    }

    pub async fn update_settings(&self, f: impl FnOnce(&mut Settings)) {
        self.tx.send_modify(move |config| f(&mut config.settings));
        self.save().await;
    }

    /// General transform over the whole config. Anything persisted must go
    /// through an action; this is the escape hatch for one-off edits.
    pub async fn mutate(&self, f: impl FnOnce(&mut Config)) {
        self.tx.send_modify(f);
        self.save().await;
    }

    pub async fn update_device_var(&self, uid: &str, key: &str, value: &str) {
        self.tx.send_modify(|config| {
            if let Some(device) = config.devices.iter_mut().find(|d| d.uid == uid) {
                device.variables.insert(key.to_string(), value.to_string());
            }
        });
        self.save().await;
    }

    /// Adding a variable with a key the device already has is rejected
    /// before any backend call, so the editing UI can keep the input open.
    pub async fn add_device_var(&self, uid: &str, key: &str, value: &str) -> Result<()> {
        let duplicate = self.with(|config| {
            config
                .device_by_uid(uid)
                .is_some_and(|d| d.variables.contains_key(key))
        });
        if duplicate {
            return Err(Error::Conflict(format!("variable key already exists: {key}")));
        }
        self.update_device_var(uid, key, value).await;
        Ok(())
    }

    pub async fn current_device(&self) -> Result<Option<Device>> {
        let uid = self.identity.get().await?;
        Ok(self.with(|config| config.device_by_uid(&uid).cloned()))
    }

    /// The device entry for this machine, or a freshly named placeholder.
    /// The placeholder is not inserted; insertion happens only through
    /// `update_current_device`.
    pub async fn current_device_or_default(&self) -> Result<Device> {
        let uid = self.identity.get().await?;
        Ok(self.with(|config| {
            config.device_by_uid(&uid).cloned().unwrap_or_else(|| Device {
                name: format!("Unnamed{}", config.devices.len() + 1),
                uid: uid.clone(),
                variables: HashMap::new(),
            })
        }))
    }

    /// Upsert keyed by the resolved current uid: replace the existing
    /// entry, else append. Keeps at most one device per uid.
    pub async fn update_current_device(&self, device: Device) -> Result<()> {
        let uid = self.identity.get().await?;
        self.tx.send_modify(move |config| {
            if let Some(found) = config.devices.iter_mut().find(|d| d.uid == uid) {
                *found = device;
            } else {
                config.devices.push(device);
            }
        });
        self.save().await;
        Ok(())
    }
}
