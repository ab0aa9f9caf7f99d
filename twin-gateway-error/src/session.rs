use thiserror::Error;

/// Failures surfaced by the session/notification subsystem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// An operation was attempted on a session whose TTL has elapsed.
    #[error("session {0} expired")]
    Expired(String),
    /// No session registered under the given id.
    #[error("session {0} not found")]
    NotFound(String),
    /// `extend` was called with a zero or negative duration.
    #[error("extension duration must be positive (got {0} ms)")]
    InvalidExtension(i64),
    /// No subscription registered under the given id.
    #[error("subscription {0} not found")]
    SubscriptionNotFound(String),
}
