use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type. Cloneable so a single failed attempt can be
/// handed to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A backend call rejected. Transient: surfaced to the user, never
    /// rolls back in-memory state on its own.
    #[error("backend call failed: {0}")]
    Backend(String),

    #[error("storage provider is not configured")]
    ProviderNotConfigured,

    /// The remote store has never held a config. Distinct from "remote is
    /// older" so the user is not told something was applied when nothing
    /// was.
    #[error("no config found on remote storage")]
    RemoteConfigMissing,

    /// Rejected before any backend call is made.
    #[error("{0}")]
    Conflict(String),

    /// A UI/state desync, not a user-caused failure.
    #[error("internal state error: {0}")]
    Internal(String),
}
