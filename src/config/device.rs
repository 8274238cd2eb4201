use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::backend::Backend;
use crate::error::{Error, Result};

enum LookupState {
    Empty,
    /// A lookup is in flight; waiters subscribe and get its result.
    Pending(broadcast::Sender<Result<String>>),
    Ready(String),
}

/// Resolves and caches this machine's identity token. At most one backend
/// lookup is in flight at any time; concurrent callers share it. A failed
/// attempt clears the memo so the next call retries, and the error reaches
/// every caller that was waiting on that attempt. The cache lives for the
/// process only.
pub struct DeviceIdentity {
    backend: Arc<dyn Backend>,
    state: Mutex<LookupState>,
}

impl DeviceIdentity {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: Mutex::new(LookupState::Empty),
        }
    }

    pub async fn get(&self) -> Result<String> {
        let waiter = {
            let mut state = self.state.lock();
            match &*state {
                LookupState::Ready(uid) => return Ok(uid.clone()),
                // subscribe under the lock so the result cannot slip past
                LookupState::Pending(tx) => Some(tx.subscribe()),
                LookupState::Empty => {
                    let (tx, _) = broadcast::channel(1);
                    *state = LookupState::Pending(tx);
                    None
                }
            }
        };

        if let Some(mut rx) = waiter {
            return match rx.recv().await {
                Ok(result) => result,
                Err(_) => Err(Error::Internal("device id lookup was dropped".to_string())),
            };
        }

        let result = self.backend.device_id().await;
        let mut state = self.state.lock();
        if let LookupState::Pending(tx) = std::mem::replace(&mut *state, LookupState::Empty) {
            let _ = tx.send(result.clone());
        }
        if let Ok(uid) = &result {
            *state = LookupState::Ready(uid.clone());
        }
        result
    }
}
