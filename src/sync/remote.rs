use std::sync::Arc;

use chrono::Utc;

use crate::backend::Backend;
use crate::config::store::ConfigStore;
use crate::config::types::Config;
use crate::error::Error;
use crate::notify::Notifier;

/// Decides whether the remote copy of the configuration should replace the
/// local one, applies it, and offers a single-shot undo through the notice
/// that announced the overwrite.
pub struct RemoteReconciler {
    store: Arc<ConfigStore>,
    backend: Arc<dyn Backend>,
    notifier: Notifier,
}

impl RemoteReconciler {
    pub fn new(store: Arc<ConfigStore>, backend: Arc<dyn Backend>, notifier: Notifier) -> Self {
        Self {
            store,
            backend,
            notifier,
        }
    }

    /// `skip_check = false` is the passive startup path: the backend only
    /// overwrites when the remote copy is newer, and an unconfigured
    /// provider is expected, not an error. `skip_check = true` forces the
    /// overwrite and surfaces a missing remote config distinctly.
    pub async fn check_and_pull(&self, skip_check: bool) {
        if !skip_check && !self.store.with(|c| c.settings.storage.is_configured()) {
            log::info!("remote storage not configured, skipping remote config check");
            self.notifier.info("Remote storage is not configured");
            return;
        }

        match self.backend.apply_remote_config(!skip_check).await {
            Ok(outcome) => {
                if let Some(previous) = outcome.previous {
                    // the backend already swapped its copy; pull it in and
                    // hand the pre-overwrite snapshot to the undo notice
                    self.store.refresh().await;
                    self.notifier
                        .success_with_undo("Remote config is newer, applied", previous);
                } else if outcome.remote_absent {
                    if skip_check {
                        self.notifier.error(Error::RemoteConfigMissing.to_string());
                    } else {
                        log::info!("no config present on remote storage yet");
                    }
                } else {
                    self.notifier.success("Local config is the newest");
                }
            }
            Err(Error::ProviderNotConfigured) if !skip_check => {
                log::info!("storage provider not configured, skipping startup remote check");
            }
            Err(e) => {
                log::error!("remote config check failed: {e}");
                self.notifier
                    .error(format!("Failed to check remote config: {e}"));
            }
        }
    }

    /// Restore the snapshot captured before a remote apply: put it back in
    /// memory, persist it to local disk, confirm to the user.
    pub async fn undo(&self, previous: Config) {
        match self.store.restore(previous).await {
            Ok(()) => self.notifier.success("Restored previous configuration"),
            Err(e) => {
                log::error!("failed to restore previous config: {e}");
                self.notifier
                    .error(format!("Failed to restore previous config: {e}"));
            }
        }
    }

    /// Push the local configuration to the remote store. Auto uploads run
    /// the backend-side freshness check; manual uploads force. Either way a
    /// completed call stamps `last_uploaded` so the scheduler quiesces.
    pub async fn upload(&self, auto: bool) {
        let label = if auto { "Config auto upload" } else { "Config upload" };
        match self.backend.upload_config(auto).await {
            Ok(uploaded) => {
                self.store.set_last_uploaded(Utc::now()).await;
                if uploaded {
                    self.notifier.success(format!("{label} succeeded"));
                } else {
                    self.notifier.info(format!("{label} skipped, remote is newer"));
                }
            }
            Err(e) => {
                log::error!("config upload failed: {e}");
                self.notifier.error(format!("{label} failed: {e}"));
            }
        }
    }
}
