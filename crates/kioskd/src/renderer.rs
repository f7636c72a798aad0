//! Avatar sessions hosted by the renderer process.
//!
//! The renderer owns the vendor streaming client and the video surface. The
//! daemon drives it over the session bus.

use std::sync::Arc;

use async_trait::async_trait;
use kiosk_session::{
    AvatarConnector, AvatarSession, SessionError, SessionHandle, SessionResult, SessionToken,
};

#[zbus::proxy(
    interface = "org.smartspecs.KioskRenderer1",
    default_service = "org.smartspecs.KioskRenderer1",
    default_path = "/org/smartspecs/KioskRenderer1"
)]
trait KioskRenderer {
    /// Create a streaming client from `token` and bind it to `target`.
    async fn stream_to_target(&self, token: &str, target: &str) -> zbus::Result<()>;

    async fn talk(&self, text: &str) -> zbus::Result<()>;

    async fn stop_streaming(&self) -> zbus::Result<()>;
}

/// Connects avatar sessions through the renderer's D-Bus interface.
pub struct RendererConnector {
    conn: zbus::Connection,
}

impl RendererConnector {
    pub fn new(conn: zbus::Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl AvatarConnector for RendererConnector {
    async fn connect(&self, token: SessionToken, target: &str) -> SessionResult<SessionHandle> {
        let proxy = KioskRendererProxy::new(&self.conn)
            .await
            .map_err(|e| SessionError::SessionStart(format!("renderer unavailable: {e}")))?;
        proxy
            .stream_to_target(token.as_str(), target)
            .await
            .map_err(|e| SessionError::SessionStart(e.to_string()))?;
        tracing::debug!(target, "renderer streaming");
        Ok(Arc::new(RendererSession { proxy }))
    }
}

struct RendererSession {
    proxy: KioskRendererProxy<'static>,
}

#[async_trait]
impl AvatarSession for RendererSession {
    async fn speak(&self, text: &str) -> SessionResult<()> {
        self.proxy
            .talk(text)
            .await
            .map_err(|e| SessionError::Call(format!("talk: {e}")))
    }

    async fn stop_streaming(&self) -> SessionResult<()> {
        self.proxy
            .stop_streaming()
            .await
            .map_err(|e| SessionError::Call(format!("stop streaming: {e}")))
    }
}
