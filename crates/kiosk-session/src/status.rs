//! Kiosk status board: the state the front-end renders.

use std::sync::Arc;

use kiosk_core::DistanceBucket;
use serde::Serialize;
use tokio::sync::watch;

use crate::coordinator::SessionState;

pub const MSG_INITIALIZING: &str = "Initializing kiosk...";
pub const MSG_CAMERA_STARTING: &str = "Initializing camera and face detection...";
pub const MSG_WAITING: &str = "Waiting for customer...";
pub const MSG_CAMERA_READY: &str = "Camera access granted. Waiting for customer...";
pub const MSG_CAMERA_FAILED: &str =
    "Camera or face detection failed. Please check permissions and restart.";
pub const MSG_COME_CLOSER: &str = "Customer detected, please come a bit closer.";
pub const MSG_STARTING: &str = "Customer in front of kiosk. Starting assistant...";
pub const MSG_CONNECTING: &str = "Connecting to AI assistant...";
pub const MSG_READY: &str = "Assistant ready. Speak and ask about the product on display.";
pub const MSG_CONNECT_FAILED: &str =
    "Error connecting to assistant. Check internet connection or API key.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KioskStatus {
    /// Human-readable status line.
    pub message: String,
    pub camera_ready: bool,
    pub customer_present: bool,
    pub distance: Option<DistanceBucket>,
    pub session: SessionState,
    /// Most recent camera or session error; a successful session start clears it.
    pub last_error: Option<String>,
}

impl Default for KioskStatus {
    fn default() -> Self {
        Self {
            message: MSG_INITIALIZING.to_string(),
            camera_ready: false,
            customer_present: false,
            distance: None,
            session: SessionState::Idle,
            last_error: None,
        }
    }
}

/// Clone-safe writer for the kiosk status. Readers subscribe to a `watch`.
#[derive(Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<KioskStatus>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(KioskStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<KioskStatus> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> KioskStatus {
        self.tx.borrow().clone()
    }

    pub fn update(&self, f: impl FnOnce(&mut KioskStatus)) {
        self.tx.send_modify(f);
    }

    pub fn set_message(&self, message: &str) {
        self.tx.send_if_modified(|s| {
            if s.message == message {
                return false;
            }
            tracing::info!(status = message, "kiosk status");
            s.message = message.to_string();
            true
        });
    }
}
