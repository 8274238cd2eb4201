//! Client state core for a game-library save-sync manager: the reactive
//! configuration store, the remote-config reconciliation with undo, the
//! auto-upload scheduler and the per-game archive sync view. The native
//! side (persistence, remote storage, archiving, process launching) sits
//! behind the [`Backend`] trait.

pub mod backend;
pub mod config;
pub mod error;
pub mod notify;
pub mod session;
pub mod sync;
#[cfg(test)]
pub(crate) mod testing;

pub use crate::backend::{Backend, BackendEvent, RemoteApplyOutcome};
pub use crate::config::device::DeviceIdentity;
pub use crate::config::store::ConfigStore;
pub use crate::config::types::{Config, Device, Game, Settings, StorageProvider};
pub use crate::error::{Error, Result};
pub use crate::notify::{Notice, Notifier, Severity};
pub use crate::session::{GameOps, Session};
pub use crate::sync::archive::{ArchiveItem, ArchiveStatus, ArchiveSync, RenameOutcome};
pub use crate::sync::autoupload::AutoUploadScheduler;
pub use crate::sync::remote::RemoteReconciler;
