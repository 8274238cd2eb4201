use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::backend::{Backend, BackendEvent, RemoteApplyOutcome};
use crate::config::types::Config;
use crate::error::{Error, Result};

/// A scripted failure: succeed `after` more calls, then reject once.
pub struct FailPlan {
    pub after: u32,
    pub error: Error,
}

#[derive(Default)]
pub struct MockState {
    pub config: Config,
    /// Every payload handed to `save_config`, in order.
    pub saved: Vec<Config>,
    pub device_uid: String,
    pub device_calls: u32,
    pub device_delay: Option<Duration>,
    pub local_archives: Vec<String>,
    pub remote_archives: Vec<String>,
    pub apply_outcome: RemoteApplyOutcome,
    pub upload_config_result: bool,
    pub next_archive_name: String,
    pub archive_delay: Option<Duration>,
    pub fail: HashMap<&'static str, FailPlan>,
    /// Call log, one entry per backend call, arguments included.
    pub calls: Vec<String>,
}

/// In-memory backend double: records every call, mutates its archive lists
/// the way the real backend would, and injects scripted failures.
pub struct MockBackend {
    pub state: Mutex<MockState>,
    events: broadcast::Sender<BackendEvent>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            state: Mutex::new(MockState {
                device_uid: "device-1".to_string(),
                upload_config_result: true,
                next_archive_name: "backup-001.tar.zst".to_string(),
                ..MockState::default()
            }),
            events,
        })
    }

    pub fn emit(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }

    /// Reject the next call to `op`.
    pub fn fail_next(&self, op: &'static str, error: Error) {
        self.fail_after(op, 0, error);
    }

    /// Let `after` calls to `op` succeed, then reject one.
    pub fn fail_after(&self, op: &'static str, after: u32, error: Error) {
        self.state.lock().fail.insert(op, FailPlan { after, error });
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.split(':').next() == Some(op))
            .count()
    }

    fn begin(&self, call: String, op: &'static str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        check_fail(&mut state, op)
    }
}

fn check_fail(state: &mut MockState, op: &'static str) -> Result<()> {
    let fire = match state.fail.get_mut(op) {
        Some(plan) if plan.after == 0 => true,
        Some(plan) => {
            plan.after -= 1;
            false
        }
        None => false,
    };
    if fire {
        let plan = state.fail.remove(op).expect("fail plan present");
        return Err(plan.error);
    }
    Ok(())
}

fn rename_in(list: &mut [String], old_name: &str, new_name: &str) -> Result<()> {
    match list.iter_mut().find(|n| n.as_str() == old_name) {
        Some(slot) => {
            *slot = new_name.to_string();
            Ok(())
        }
        None => Err(Error::Backend(format!("no archive named {old_name}"))),
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn get_config(&self) -> Result<Config> {
        self.begin("get_config".to_string(), "get_config")?;
        Ok(self.state.lock().config.clone())
    }

    async fn save_config(&self, new_config: &Config) -> Result<()> {
        self.begin("save_config".to_string(), "save_config")?;
        let mut state = self.state.lock();
        state.config = new_config.clone();
        state.saved.push(new_config.clone());
        Ok(())
    }

    async fn device_id(&self) -> Result<String> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.push("device_id".to_string());
            state.device_calls += 1;
            state.device_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        check_fail(&mut state, "device_id")?;
        Ok(state.device_uid.clone())
    }

    async fn apply_remote_config(&self, safe: bool) -> Result<RemoteApplyOutcome> {
        self.begin(format!("apply_remote_config:{safe}"), "apply_remote_config")?;
        Ok(self.state.lock().apply_outcome.clone())
    }

    async fn upload_config(&self, safe: bool) -> Result<bool> {
        self.begin(format!("upload_config:{safe}"), "upload_config")?;
        Ok(self.state.lock().upload_config_result)
    }

    async fn list_local_archive(&self, game_id: u32) -> Result<Vec<String>> {
        self.begin(format!("list_local_archive:{game_id}"), "list_local_archive")?;
        Ok(self.state.lock().local_archives.clone())
    }

    async fn list_archive(&self, game_id: u32) -> Result<Vec<String>> {
        self.begin(format!("list_archive:{game_id}"), "list_archive")?;
        Ok(self.state.lock().remote_archives.clone())
    }

    async fn upload_archive(&self, game_id: u32, archive_filename: &str) -> Result<()> {
        self.begin(
            format!("upload_archive:{game_id}:{archive_filename}"),
            "upload_archive",
        )?;
        let mut state = self.state.lock();
        if !state.remote_archives.iter().any(|n| n == archive_filename) {
            state.remote_archives.push(archive_filename.to_string());
        }
        Ok(())
    }

    async fn pull_archive(&self, game_id: u32, archive_filename: &str) -> Result<()> {
        self.begin(
            format!("pull_archive:{game_id}:{archive_filename}"),
            "pull_archive",
        )?;
        let mut state = self.state.lock();
        if !state.local_archives.iter().any(|n| n == archive_filename) {
            state.local_archives.push(archive_filename.to_string());
        }
        Ok(())
    }

    async fn extract(&self, game_id: u32, archive_filename: &str) -> Result<()> {
        self.begin(format!("extract:{game_id}:{archive_filename}"), "extract")
    }

    async fn delete_archive(&self, game_id: u32, archive_filename: &str) -> Result<()> {
        self.begin(
            format!("delete_archive:{game_id}:{archive_filename}"),
            "delete_archive",
        )?;
        self.state
            .lock()
            .remote_archives
            .retain(|n| n != archive_filename);
        Ok(())
    }

    async fn delete_local_archive(&self, game_id: u32, archive_filename: &str) -> Result<()> {
        self.begin(
            format!("delete_local_archive:{game_id}:{archive_filename}"),
            "delete_local_archive",
        )?;
        self.state
            .lock()
            .local_archives
            .retain(|n| n != archive_filename);
        Ok(())
    }

    async fn rename_remote_archive(
        &self,
        game_id: u32,
        archive_filename: &str,
        new_archive_filename: &str,
    ) -> Result<()> {
        self.begin(
            format!("rename_remote_archive:{game_id}:{archive_filename}->{new_archive_filename}"),
            "rename_remote_archive",
        )?;
        rename_in(
            &mut self.state.lock().remote_archives,
            archive_filename,
            new_archive_filename,
        )
    }

    async fn rename_local_archive(
        &self,
        game_id: u32,
        archive_filename: &str,
        new_archive_filename: &str,
    ) -> Result<()> {
        self.begin(
            format!("rename_local_archive:{game_id}:{archive_filename}->{new_archive_filename}"),
            "rename_local_archive",
        )?;
        rename_in(
            &mut self.state.lock().local_archives,
            archive_filename,
            new_archive_filename,
        )
    }

    async fn archive(&self, game_id: u32) -> Result<String> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.push(format!("archive:{game_id}"));
            check_fail(&mut state, "archive")?;
            state.archive_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        let name = state.next_archive_name.clone();
        if !state.local_archives.iter().any(|n| *n == name) {
            state.local_archives.push(name.clone());
        }
        Ok(name)
    }

    async fn exec(&self, game_id: u32) -> Result<()> {
        self.begin(format!("exec:{game_id}"), "exec")
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }
}
