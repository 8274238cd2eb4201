use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::Backend;
use crate::config::types::Game;
use crate::error::Error;
use crate::notify::Notifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStatus {
    LocalOnly,
    RemoteOnly,
    Synced,
}

/// One named backup snapshot as seen by the merged view. Session-scoped,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveItem {
    pub name: String,
    pub status: ArchiveStatus,
}

/// Outcome of one rename attempt. `Renamed` and `Unchanged` close the
/// caller's editing state; `Conflict`, `Failed` and the rollback variants
/// leave it open for a retry; `Busy` means another commit was still in
/// flight and this one was ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum RenameOutcome {
    Busy,
    Unchanged,
    Conflict,
    Renamed,
    Failed(Error),
    /// The remote rename failed and the local name was restored.
    RolledBack { remote: Error },
    /// The remote rename failed and restoring the local name failed too;
    /// the archive is in a manual-intervention state.
    RollbackFailed { remote: Error, rollback: Error },
}

/// Merge the two enumerations into the status-tagged view: union of the
/// name sets, status by membership, sorted by name descending.
pub fn merge_archives(local: &[String], remote: &[String]) -> Vec<ArchiveItem> {
    let local_set: HashSet<&str> = local.iter().map(String::as_str).collect();
    let remote_set: HashSet<&str> = remote.iter().map(String::as_str).collect();

    let mut merged: Vec<ArchiveItem> = local_set
        .union(&remote_set)
        .map(|name| {
            let status = match (local_set.contains(name), remote_set.contains(name)) {
                (true, false) => ArchiveStatus::LocalOnly,
                (false, true) => ArchiveStatus::RemoteOnly,
                _ => ArchiveStatus::Synced,
            };
            ArchiveItem {
                name: name.to_string(),
                status,
            }
        })
        .collect();
    sort_view(&mut merged);
    merged
}

fn sort_view(items: &mut [ArchiveItem]) {
    items.sort_by(|a, b| b.name.cmp(&a.name));
}

/// Per-game archive sync session: the merged local/remote view plus the
/// operations that keep it consistent with single-item updates instead of
/// a re-fetch. Built when the sync panel opens, dropped when it closes.
pub struct ArchiveSync {
    backend: Arc<dyn Backend>,
    notifier: Notifier,
    game_id: u32,
    has_save_paths: bool,
    items: Vec<ArchiveItem>,
    renaming: bool,
}

impl ArchiveSync {
    pub fn new(backend: Arc<dyn Backend>, notifier: Notifier, game: &Game) -> Self {
        Self {
            backend,
            notifier,
            game_id: game.id,
            has_save_paths: !game.save_paths.is_empty(),
            items: Vec::new(),
            renaming: false,
        }
    }

    pub fn items(&self) -> &[ArchiveItem] {
        &self.items
    }

    /// Rebuild the merged view. A failed local enumeration is fatal (no
    /// action can be made safe without it, so the view empties); a failed
    /// remote enumeration degrades to an empty remote list.
    pub async fn fetch(&mut self) {
        let local = match self.backend.list_local_archive(self.game_id).await {
            Ok(list) => list,
            Err(e) => {
                log::error!("local archive enumeration failed: {e}");
                self.notifier
                    .error(format!("Failed to load archive list: {e}"));
                self.items.clear();
                return;
            }
        };

        // a game without declared save paths cannot have meaningful remote
        // archives; don't even ask
        let remote = if !self.has_save_paths {
            Vec::new()
        } else {
            match self.backend.list_archive(self.game_id).await {
                Ok(list) => list,
                Err(e) => {
                    log::warn!("remote archive enumeration failed: {e}");
                    self.notifier
                        .error(format!("Failed to load remote archive list: {e}"));
                    Vec::new()
                }
            }
        };

        self.items = merge_archives(&local, &remote);
    }

    fn position_with_status(&self, name: &str, valid: &[ArchiveStatus], op: &str) -> Option<usize> {
        match self.items.iter().position(|i| i.name == name) {
            Some(pos) if valid.contains(&self.items[pos].status) => Some(pos),
            _ => {
                log::error!("{op} requested for {name} in an invalid state");
                self.notifier.internal(format!("{op} is not valid for {name}"));
                None
            }
        }
    }

    pub async fn upload(&mut self, name: &str) {
        let Some(pos) = self.position_with_status(name, &[ArchiveStatus::LocalOnly], "upload")
        else {
            return;
        };
        match self.backend.upload_archive(self.game_id, name).await {
            Ok(()) => {
                self.items[pos].status = ArchiveStatus::Synced;
                self.notifier.success(format!("Uploaded {name}"));
            }
            Err(e) => self.notifier.error(format!("Failed to upload {name}: {e}")),
        }
    }

    pub async fn pull(&mut self, name: &str) {
        let Some(pos) = self.position_with_status(name, &[ArchiveStatus::RemoteOnly], "download")
        else {
            return;
        };
        match self.backend.pull_archive(self.game_id, name).await {
            Ok(()) => {
                self.items[pos].status = ArchiveStatus::Synced;
                self.notifier.success(format!("Downloaded {name}"));
            }
            Err(e) => self.notifier.error(format!("Failed to download {name}: {e}")),
        }
    }

    /// Restore the archive into the live save location. Orthogonal to sync
    /// status, which stays as it is.
    pub async fn extract(&mut self, name: &str) {
        if self
            .position_with_status(
                name,
                &[ArchiveStatus::LocalOnly, ArchiveStatus::Synced],
                "restore",
            )
            .is_none()
        {
            return;
        }
        match self.backend.extract(self.game_id, name).await {
            Ok(()) => self.notifier.success(format!("Restored {name}")),
            Err(e) => self.notifier.error(format!("Failed to restore {name}: {e}")),
        }
    }

    pub async fn delete_remote(&mut self, name: &str) {
        let Some(pos) = self.position_with_status(
            name,
            &[ArchiveStatus::Synced, ArchiveStatus::RemoteOnly],
            "remote delete",
        ) else {
            return;
        };
        match self.backend.delete_archive(self.game_id, name).await {
            Ok(()) => {
                if self.items[pos].status == ArchiveStatus::Synced {
                    self.items[pos].status = ArchiveStatus::LocalOnly;
                } else {
                    self.items.remove(pos);
                }
                self.notifier.success(format!("Deleted {name}"));
            }
            Err(e) => self.notifier.error(format!("Failed to delete {name}: {e}")),
        }
    }

    pub async fn delete_local(&mut self, name: &str) {
        let Some(pos) = self.position_with_status(
            name,
            &[ArchiveStatus::Synced, ArchiveStatus::LocalOnly],
            "local delete",
        ) else {
            return;
        };
        match self.backend.delete_local_archive(self.game_id, name).await {
            Ok(()) => {
                if self.items[pos].status == ArchiveStatus::Synced {
                    self.items[pos].status = ArchiveStatus::RemoteOnly;
                } else {
                    self.items.remove(pos);
                }
                self.notifier.success(format!("Deleted {name}"));
            }
            Err(e) => self.notifier.error(format!("Failed to delete {name}: {e}")),
        }
    }

    /// Commit one rename attempt. Validation happens before any backend
    /// call: empty or unchanged names exit quietly, a case-insensitive
    /// collision with any name in the view is a conflict. Synced items
    /// rename local first, then remote, rolling the local side back if the
    /// remote side refuses.
    pub async fn commit_rename(&mut self, old_name: &str, new_name: &str) -> RenameOutcome {
        if self.renaming {
            return RenameOutcome::Busy;
        }

        let new_name = new_name.trim();
        if new_name.is_empty() || new_name == old_name {
            return RenameOutcome::Unchanged;
        }
        let lowered = new_name.to_lowercase();
        if self.items.iter().any(|i| i.name.to_lowercase() == lowered) {
            self.notifier
                .error(format!("An archive named {new_name} already exists"));
            return RenameOutcome::Conflict;
        }
        let Some(pos) = self.items.iter().position(|i| i.name == old_name) else {
            let err = Error::Internal(format!("no archive named {old_name} in the current view"));
            self.notifier.internal(err.to_string());
            return RenameOutcome::Failed(err);
        };

        self.renaming = true;
        let outcome = self
            .rename_phases(old_name, new_name, self.items[pos].status)
            .await;
        self.renaming = false;

        match &outcome {
            RenameOutcome::Renamed => {
                self.items[pos].name = new_name.to_string();
                sort_view(&mut self.items);
                self.notifier
                    .success(format!("Renamed {old_name} to {new_name}"));
            }
            RenameOutcome::Failed(e) => {
                self.notifier
                    .error(format!("Failed to rename {old_name}: {e}"));
            }
            RenameOutcome::RolledBack { remote } => {
                self.notifier
                    .error(format!("Remote rename failed, local name restored: {remote}"));
            }
            RenameOutcome::RollbackFailed { remote, rollback } => {
                self.notifier.critical(format!(
                    "Remote rename failed and restoring the local name also failed; \
                     the archive needs manual repair. Remote: {remote}. Rollback: {rollback}"
                ));
            }
            _ => {}
        }
        outcome
    }

    async fn rename_phases(
        &self,
        old_name: &str,
        new_name: &str,
        status: ArchiveStatus,
    ) -> RenameOutcome {
        let result = match status {
            ArchiveStatus::LocalOnly => {
                self.backend
                    .rename_local_archive(self.game_id, old_name, new_name)
                    .await
            }
            ArchiveStatus::RemoteOnly => {
                self.backend
                    .rename_remote_archive(self.game_id, old_name, new_name)
                    .await
            }
            ArchiveStatus::Synced => {
                if let Err(e) = self
                    .backend
                    .rename_local_archive(self.game_id, old_name, new_name)
                    .await
                {
                    return RenameOutcome::Failed(e);
                }
                match self
                    .backend
                    .rename_remote_archive(self.game_id, old_name, new_name)
                    .await
                {
                    Ok(()) => Ok(()),
                    Err(remote) => {
                        // undo the local half before surfacing the error
                        return match self
                            .backend
                            .rename_local_archive(self.game_id, new_name, old_name)
                            .await
                        {
                            Ok(()) => RenameOutcome::RolledBack { remote },
                            Err(rollback) => RenameOutcome::RollbackFailed { remote, rollback },
                        };
                    }
                }
            }
        };
        match result {
            Ok(()) => RenameOutcome::Renamed,
            Err(e) => RenameOutcome::Failed(e),
        }
    }
}
