use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::types::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
    /// Persistent, requires acknowledgment; never auto-dismissed.
    Critical,
}

/// One user-facing notification. The id lets a view update a notice in
/// place (loading -> done).
#[derive(Debug, Clone)]
pub struct Notice {
    pub id: Uuid,
    pub severity: Severity,
    pub message: String,
    /// Snapshot to restore when the user invokes undo. Single-shot: the
    /// snapshot travels with this one notice and nowhere else.
    pub undo: Option<Config>,
}

impl Notice {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            message: message.into(),
            undo: None,
        }
    }
}

/// Sender half of the notification stream. Async actions report failures
/// here instead of returning them; the embedding UI drains the receiver.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(Notice::new(Severity::Info, message));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(Notice::new(Severity::Success, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(Notice::new(Severity::Error, message));
    }

    pub fn critical(&self, message: impl Into<String>) {
        self.push(Notice::new(Severity::Critical, message));
    }

    /// Invariant violations: a UI/state desync rather than a user-caused
    /// failure.
    pub fn internal(&self, message: impl Into<String>) {
        self.push(Notice::new(
            Severity::Error,
            format!("Internal error: {}", message.into()),
        ));
    }

    pub fn success_with_undo(&self, message: impl Into<String>, previous: Config) {
        let mut notice = Notice::new(Severity::Success, message);
        notice.undo = Some(previous);
        self.push(notice);
    }

    fn push(&self, notice: Notice) {
        // a dropped receiver just means nobody is rendering notices
        let _ = self.tx.send(notice);
    }
}
