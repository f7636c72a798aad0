//! kiosk-hw — Camera capture for the kiosk.
//!
//! V4L2 camera access, grayscale frame conversion, and the restartable
//! frame source that owns the device on a capture thread.

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::Frame;
pub use source::{CaptureDevice, FrameSource};
