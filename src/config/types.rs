use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// The root persisted aggregate. One instance lives in the store; forms
/// work on clones and merge back through an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub db_version: u32,
    /// Last local mutation that must propagate; stamped on every save.
    pub last_updated: DateTime<Utc>,
    /// Last confirmed push to the remote store; absent until the first
    /// upload.
    #[serde(default)]
    pub last_uploaded: Option<DateTime<Utc>>,
    #[serde(default)]
    pub games: Vec<Game>,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub settings: Settings,
}

impl Config {
    /// Next free game id. Ids are assigned by the caller; the store does
    /// not re-check uniqueness on add.
    pub fn next_game_id(&self) -> u32 {
        self.games.iter().map(|g| g.id).max().unwrap_or(0) + 1
    }

    /// Resolve a positional index from the stable id. Views sort games for
    /// display, so positional parameters must be resolved through this
    /// right before calling an index-taking action.
    pub fn game_index(&self, id: u32) -> Option<usize> {
        self.games.iter().position(|g| g.id == id)
    }

    pub fn device_by_uid(&self, uid: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.uid == uid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub executable_path: Option<String>,
    #[serde(default)]
    pub save_paths: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_sha256: Option<String>,
    pub added_time: DateTime<Utc>,
    #[serde(default)]
    pub last_played_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub use_time: Duration,
    #[serde(default)]
    pub last_upload_time: Option<DateTime<Utc>>,
}

/// A machine this library has run on. `uid` is the opaque identity token
/// resolved once per process; at most one entry per uid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub name: String,
    pub uid: String,
    /// User-defined path-template substitutions.
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub archive: ArchiveSettings,
    #[serde(default)]
    pub appearance: AppearanceSettings,
    #[serde(default)]
    pub auto_sync_enabled: bool,
    /// Seconds between auto-upload checks; clamped to >= 1 at use.
    #[serde(default = "default_auto_sync_interval")]
    pub auto_sync_interval: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage: StorageSettings::default(),
            archive: ArchiveSettings::default(),
            appearance: AppearanceSettings::default(),
            auto_sync_enabled: false,
            auto_sync_interval: default_auto_sync_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    Local,
    WebDav,
    S3,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    #[serde(default)]
    pub provider: StorageProvider,
    /// Target directory for the local provider.
    #[serde(default)]
    pub local: String,
    #[serde(default)]
    pub webdav: WebDavSettings,
    #[serde(default)]
    pub s3: S3Settings,
}

impl StorageSettings {
    /// Whether a usable remote target has been set up. A fresh install
    /// defaults to the local provider with an empty path, which reads as
    /// not configured.
    pub fn is_configured(&self) -> bool {
        match self.provider {
            StorageProvider::Local => !self.local.trim().is_empty(),
            StorageProvider::WebDav => !self.webdav.endpoint.trim().is_empty(),
            StorageProvider::S3 => !self.s3.bucket.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDavSettings {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub root_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Settings {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArchiveAlgorithm {
    #[default]
    SquashfsZstd,
    TarZstd,
    TarGzip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSettings {
    #[serde(default)]
    pub algorithm: ArchiveAlgorithm,
    #[serde(default = "default_archive_level")]
    pub level: u32,
    #[serde(default = "default_true")]
    pub backup_before_restore: bool,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            algorithm: ArchiveAlgorithm::default(),
            level: default_archive_level(),
            backup_before_restore: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppearanceSettings {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            language: default_language(),
        }
    }
}

fn default_auto_sync_interval() -> u64 {
    1200
}

fn default_archive_level() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_theme() -> String {
    "system".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}
