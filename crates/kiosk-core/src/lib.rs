//! kiosk-core — Presence detection for the kiosk.
//!
//! SCRFD face detection via ONNX Runtime, mapping of face size to distance
//! buckets, and the debouncer that turns per-frame detections into
//! arrival/departure events.

pub mod debounce;
pub mod detector;
pub mod presence;
pub mod types;

use std::path::PathBuf;

pub use debounce::{PresenceDebouncer, PresenceEvent, PresenceState};
pub use detector::{DetectorError, ScrfdDetector};
pub use presence::{DetectionError, FaceLocator, PresenceDetector};
pub use types::{BoundingBox, Detection, DistanceBucket};

/// Default directory holding the ONNX models.
///
/// `$XDG_DATA_HOME/presence-kiosk/models`, falling back to
/// `~/.local/share/presence-kiosk/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("presence-kiosk/models")
}
