use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::backend::{Backend, BackendEvent};
use crate::config::device::DeviceIdentity;
use crate::config::store::ConfigStore;
use crate::config::types::Game;
use crate::error::Result;
use crate::notify::{Notice, Notifier};
use crate::sync::archive::ArchiveSync;
use crate::sync::autoupload::AutoUploadScheduler;
use crate::sync::remote::RemoteReconciler;

/// Everything one application run owns: the store, the reconcilers and the
/// background tasks. Constructed once at startup, dropped on exit; tests
/// build as many independent instances as they need.
pub struct Session {
    pub store: Arc<ConfigStore>,
    pub remote: Arc<RemoteReconciler>,
    pub games: Arc<GameOps>,
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    autoupload: AutoUploadScheduler,
    events: JoinHandle<()>,
}

impl Session {
    /// Boot sequence: subscribe to backend pushes, pull the local config,
    /// run the passive remote check, then start the upload scheduler.
    pub async fn init(backend: Arc<dyn Backend>) -> (Session, UnboundedReceiver<Notice>) {
        let (notifier, notices) = Notifier::channel();
        let identity = Arc::new(DeviceIdentity::new(backend.clone()));
        let store = Arc::new(ConfigStore::new(
            backend.clone(),
            notifier.clone(),
            identity,
        ));
        let games = Arc::new(GameOps::new(backend.clone(), notifier.clone()));

        let events = tokio::spawn(event_loop(
            backend.subscribe(),
            store.clone(),
            games.clone(),
            notifier.clone(),
        ));

        store.refresh().await;

        let remote = Arc::new(RemoteReconciler::new(
            store.clone(),
            backend.clone(),
            notifier.clone(),
        ));
        remote.check_and_pull(false).await;

        let autoupload = {
            let remote = remote.clone();
            AutoUploadScheduler::spawn(store.subscribe(), move || {
                let remote = remote.clone();
                async move { remote.upload(true).await }
            })
        };

        let session = Session {
            store,
            remote,
            games,
            backend,
            notifier,
            autoupload,
            events,
        };
        (session, notices)
    }

    /// Start a per-game archive sync session.
    pub fn archive_sync(&self, game: &Game) -> ArchiveSync {
        ArchiveSync::new(self.backend.clone(), self.notifier.clone(), game)
    }

    pub fn shutdown(&self) {
        self.autoupload.shutdown();
        self.events.abort();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.events.abort();
    }
}

async fn event_loop(
    mut events: broadcast::Receiver<BackendEvent>,
    store: Arc<ConfigStore>,
    games: Arc<GameOps>,
    notifier: Notifier,
) {
    loop {
        match events.recv().await {
            Ok(BackendEvent::ConfigUpdated(config)) => {
                log::debug!("config updated from backend");
                store.apply_snapshot(config);
            }
            Ok(BackendEvent::GameSpawned(game_id)) => {
                games.playing.lock().insert(game_id);
                if let Some(name) = game_name(&store, game_id) {
                    notifier.success(format!("{name} is running"));
                }
            }
            Ok(BackendEvent::GameExited { game_id, success }) => {
                games.playing.lock().remove(&game_id);
                if !success {
                    let name =
                        game_name(&store, game_id).unwrap_or_else(|| format!("Game {game_id}"));
                    notifier.error(format!("{name} exited abnormally"));
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("backend event stream lagged, {skipped} events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn game_name(store: &ConfigStore, game_id: u32) -> Option<String> {
    store.with(|config| {
        config
            .game_index(game_id)
            .map(|index| config.games[index].name.clone())
    })
}

/// Launch and backup operations with per-id in-flight tracking: different
/// games proceed independently, the same game never runs two of the same
/// operation at once.
pub struct GameOps {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    backing_up: Mutex<HashSet<u32>>,
    playing: Mutex<HashSet<u32>>,
}

impl GameOps {
    fn new(backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        Self {
            backend,
            notifier,
            backing_up: Mutex::new(HashSet::new()),
            playing: Mutex::new(HashSet::new()),
        }
    }

    pub fn is_backing_up(&self, game_id: u32) -> bool {
        self.backing_up.lock().contains(&game_id)
    }

    pub fn is_playing(&self, game_id: u32) -> bool {
        self.playing.lock().contains(&game_id)
    }

    /// Archive the save paths, then upload the result, strictly in that
    /// order. The id leaves the in-flight set however the operation ends.
    pub async fn backup(&self, game: &Game) {
        if game.save_paths.is_empty() {
            self.notifier
                .error(format!("{}: no save paths configured", game.name));
            return;
        }
        if !self.backing_up.lock().insert(game.id) {
            return;
        }
        let result = self.archive_and_upload(game.id).await;
        self.backing_up.lock().remove(&game.id);
        match result {
            Ok(()) => self.notifier.success(format!("Sync finished: {}", game.name)),
            Err(e) => self
                .notifier
                .error(format!("Sync failed for {}: {e}", game.name)),
        }
    }

    async fn archive_and_upload(&self, game_id: u32) -> Result<()> {
        let filename = self.backend.archive(game_id).await?;
        self.backend.upload_archive(game_id, &filename).await?;
        Ok(())
    }

    /// The playing set is driven by the spawn/exit events, not by `exec`
    /// resolving.
    pub async fn launch(&self, game: &Game) {
        if self.playing.lock().contains(&game.id) {
            return;
        }
        if let Err(e) = self.backend.exec(game.id).await {
            log::error!("failed to start {}: {e}", game.name);
            self.notifier
                .error(format!("Failed to start {}: {e}", game.name));
        }
    }
}
