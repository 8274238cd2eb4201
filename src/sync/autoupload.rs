use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::types::Config;

/// Recurring config-upload timer.
///
/// Parks while `auto_sync_enabled` is off, re-arms whenever the gate or the
/// interval changes, and skips a tick entirely while an upload from a
/// previous tick is still in flight. The upload callback owns its own error
/// reporting; nothing it does can kill the timer loop.
pub struct AutoUploadScheduler {
    handle: JoinHandle<()>,
}

impl AutoUploadScheduler {
    pub fn spawn<F, Fut>(config: watch::Receiver<Config>, upload: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(run(config, upload)),
        }
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for AutoUploadScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn schedule_of(config: &Config) -> (bool, u64) {
    let settings = &config.settings;
    (settings.auto_sync_enabled, settings.auto_sync_interval.max(1))
}

/// Local changes newer than the last upload. A missing `last_uploaded`
/// counts as never uploaded.
fn is_dirty(config: &Config) -> bool {
    let last_uploaded = config.last_uploaded.unwrap_or(DateTime::UNIX_EPOCH);
    config.last_updated > last_uploaded
}

struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn run<F, Fut>(mut config: watch::Receiver<Config>, upload: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let upload = Arc::new(upload);
    let in_flight = Arc::new(AtomicBool::new(false));

    loop {
        let (enabled, interval_secs) = schedule_of(&config.borrow_and_update());
        if !enabled {
            log::info!("auto upload disabled, waiting");
            if config.changed().await.is_err() {
                return;
            }
            continue;
        }

        log::info!("auto upload armed, interval {interval_secs}s");
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval's first tick completes immediately; the schedule starts
        // one full period from now
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = config.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    // the old ticker is dropped before a new one is armed
                    if schedule_of(&config.borrow_and_update()) != (enabled, interval_secs) {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if in_flight.load(Ordering::SeqCst) {
                        log::debug!("auto upload still running, skipping tick");
                        continue;
                    }
                    // judge the snapshot as of this tick, not as of arming
                    if !is_dirty(&config.borrow()) {
                        continue;
                    }
                    in_flight.store(true, Ordering::SeqCst);
                    let guard = InFlight(in_flight.clone());
                    let upload = upload.clone();
                    tokio::spawn(async move {
                        let _guard = guard;
                        upload().await;
                    });
                }
            }
        }
    }
}
