use kiosk_session::{KioskStatus, SessionCoordinator, SessionError, StatusBoard};
use zbus::interface;

pub const BUS_NAME: &str = "org.smartspecs.Kiosk1";
pub const OBJECT_PATH: &str = "/org/smartspecs/Kiosk1";

/// D-Bus interface for the kiosk daemon.
///
/// Bus name: org.smartspecs.Kiosk1
/// Object path: /org/smartspecs/Kiosk1
pub struct KioskService {
    coordinator: SessionCoordinator,
    status: StatusBoard,
}

impl KioskService {
    pub fn new(coordinator: SessionCoordinator, status: StatusBoard) -> Self {
        Self {
            coordinator,
            status,
        }
    }
}

#[interface(name = "org.smartspecs.Kiosk1")]
impl KioskService {
    /// Have the assistant say `text`. Returns false for blank text.
    async fn send_message(&self, text: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(chars = text.len(), "send_message requested");
        self.coordinator.send_message(text).await.map_err(to_fdo)
    }

    /// Return daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        status_json(&self.status.snapshot())
            .map_err(|e| zbus::fdo::Error::Failed(format!("status encoding failed: {e}")))
    }
}

fn to_fdo(err: SessionError) -> zbus::fdo::Error {
    match err {
        SessionError::NotReady => zbus::fdo::Error::Failed("assistant is not ready yet".into()),
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

fn status_json(status: &KioskStatus) -> serde_json::Result<String> {
    let mut value = serde_json::to_value(status)?;
    if let Some(map) = value.as_object_mut() {
        map.insert("version".into(), env!("CARGO_PKG_VERSION").into());
    }
    serde_json::to_string(&value)
}
