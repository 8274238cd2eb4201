use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::config::types::Config;
use crate::error::Result;

pub const EVENT_CONFIG_UPDATED: &str = "config://updated";
pub const EVENT_GAME_SPAWN: &str = "game://spawn";
pub const EVENT_GAME_EXIT: &str = "game://exit";

/// Push notifications from the native backend.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// Full configuration, applied wholesale to the store.
    ConfigUpdated(Config),
    /// A launched process started.
    GameSpawned(u32),
    /// A launched process ended; `success` is false on abnormal exit.
    GameExited { game_id: u32, success: bool },
}

/// Result of `apply_remote_config`. `previous` holds the pre-overwrite
/// config when an overwrite happened and is `None` when nothing changed;
/// `remote_absent` flags that no remote config exists at all.
#[derive(Debug, Clone, Default)]
pub struct RemoteApplyOutcome {
    pub previous: Option<Config>,
    pub remote_absent: bool,
}

/// The native backend's command surface. Owns persistent storage, the
/// remote store, archive creation/extraction and process launching; this
/// crate only drives it.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_config(&self) -> Result<Config>;
    async fn save_config(&self, new_config: &Config) -> Result<()>;
    async fn device_id(&self) -> Result<String>;

    /// Apply the remote configuration to local storage. With `safe` the
    /// backend only overwrites when the remote copy is newer.
    async fn apply_remote_config(&self, safe: bool) -> Result<RemoteApplyOutcome>;

    /// Push the local configuration to the remote store. With `safe` the
    /// upload is skipped when the remote copy is newer; the returned flag
    /// says whether an upload actually occurred.
    async fn upload_config(&self, safe: bool) -> Result<bool>;

    async fn list_local_archive(&self, game_id: u32) -> Result<Vec<String>>;
    async fn list_archive(&self, game_id: u32) -> Result<Vec<String>>;
    async fn upload_archive(&self, game_id: u32, archive_filename: &str) -> Result<()>;
    async fn pull_archive(&self, game_id: u32, archive_filename: &str) -> Result<()>;
    async fn extract(&self, game_id: u32, archive_filename: &str) -> Result<()>;
    async fn delete_archive(&self, game_id: u32, archive_filename: &str) -> Result<()>;
    async fn delete_local_archive(&self, game_id: u32, archive_filename: &str) -> Result<()>;
    async fn rename_remote_archive(
        &self,
        game_id: u32,
        archive_filename: &str,
        new_archive_filename: &str,
    ) -> Result<()>;
    async fn rename_local_archive(
        &self,
        game_id: u32,
        archive_filename: &str,
        new_archive_filename: &str,
    ) -> Result<()>;

    /// Create an archive of the game's save paths; returns its filename.
    async fn archive(&self, game_id: u32) -> Result<String>;

    /// Launch the game's executable. Spawn/exit arrive as events.
    async fn exec(&self, game_id: u32) -> Result<()>;

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent>;
}
