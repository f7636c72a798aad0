//! Remote avatar session seam.
//!
//! The avatar vendor's streaming and rendering live outside this crate. A
//! connector turns a session token into a live session bound to a named
//! video surface; the session can speak and stop streaming.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::SessionToken;
use crate::error::SessionResult;

/// A live avatar session.
#[async_trait]
pub trait AvatarSession: Send + Sync {
    /// Have the avatar say `text`.
    async fn speak(&self, text: &str) -> SessionResult<()>;

    /// Stop streaming and release the remote session.
    async fn stop_streaming(&self) -> SessionResult<()>;
}

/// Shared handle to the one live session.
pub type SessionHandle = Arc<dyn AvatarSession>;

/// Creates sessions from tokens.
#[async_trait]
pub trait AvatarConnector: Send + Sync {
    /// Create a client from `token` and bind its stream to `target`.
    /// Failures are reported as [`SessionError::SessionStart`](crate::SessionError::SessionStart).
    async fn connect(&self, token: SessionToken, target: &str) -> SessionResult<SessionHandle>;
}
