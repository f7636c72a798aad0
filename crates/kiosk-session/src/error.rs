use thiserror::Error;

/// Errors from the avatar session path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The session token request failed (network or non-success status).
    #[error("session token request failed: {0}")]
    Auth(String),
    /// A token was issued but the streaming session could not be bound.
    #[error("avatar session failed to start: {0}")]
    SessionStart(String),
    /// A message was sent before the assistant was ready.
    #[error("assistant is not ready")]
    NotReady,
    /// A call on a live session (speak, stop) failed.
    #[error("avatar session call failed: {0}")]
    Call(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
