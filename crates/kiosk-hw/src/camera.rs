//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame};
use crate::source::CaptureDevice;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::FourCC;

const CAPTURE_WIDTH: u32 = 640;
const CAPTURE_HEIGHT: u32 = 480;
const STREAM_BUFFERS: u32 = 4;
const EBUSY: i32 = 16;

#[derive(Error, Debug)]
pub enum CameraError {
    /// No device at the path, or access was denied.
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("device busy: {0}")]
    DeviceBusy(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, Y channel extracted).
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
}

impl PixelFormat {
    pub fn fourcc(self) -> FourCC {
        FourCC::new(match self {
            PixelFormat::Yuyv => b"YUYV",
            PixelFormat::Grey => b"GREY",
            PixelFormat::Y16 => b"Y16 ",
        })
    }

    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(PixelFormat::Yuyv),
            b"GREY" => Some(PixelFormat::Grey),
            b"Y16 " => Some(PixelFormat::Y16),
            _ => None,
        }
    }
}

fn classify_open_error(device_path: &str, err: std::io::Error) -> CameraError {
    if err.kind() == ErrorKind::PermissionDenied {
        return CameraError::Unavailable(format!("{device_path}: permission denied"));
    }
    if err.raw_os_error() == Some(EBUSY) || err.to_string().contains("busy") {
        return CameraError::DeviceBusy(device_path.to_string());
    }
    CameraError::Unavailable(format!("{device_path}: {err}"))
}

/// V4L2 camera device handle. Dropping it closes the device.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open `device_path` for 640x480 capture at `fps` frames per second.
    ///
    /// The frame rate is only a request; drivers round it to what the sensor
    /// supports. A missing node or denied access is [`CameraError::Unavailable`].
    pub fn open(device_path: &str, fps: u32) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::Unavailable(format!("{device_path}: no such device")));
        }
        let device = Device::with_path(device_path).map_err(|e| classify_open_error(device_path, e))?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::Unavailable(format!("{device_path}: capability query: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        let mut requested = device
            .format()
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("get format: {e}")))?;
        requested.fourcc = PixelFormat::Yuyv.fourcc();
        requested.width = CAPTURE_WIDTH;
        requested.height = CAPTURE_HEIGHT;
        let format = device
            .set_format(&requested)
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("set format: {e}")))?;
        let pixel_format = PixelFormat::from_fourcc(format.fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "driver chose {:?}, expected YUYV, GREY or Y16",
                format.fourcc
            ))
        })?;

        if let Err(e) = device.set_params(&Parameters::with_fps(fps)) {
            tracing::warn!(device = device_path, fps, error = %e, "frame rate request rejected");
        }

        tracing::info!(
            device = device_path,
            card = %caps.card,
            width = format.width,
            height = format.height,
            ?pixel_format,
            fps,
            "camera opened"
        );

        Ok(Self {
            device,
            width: format.width,
            height: format.height,
            device_path: device_path.to_string(),
            fourcc: format.fourcc,
            pixel_format,
        })
    }

    /// Capture `count` consecutive frames. Used by diagnostics.
    pub fn capture_frames(&self, count: usize) -> Result<Vec<Frame>, CameraError> {
        let mut stream = self.stream()?;
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(self.next_frame(&mut stream)?);
        }
        Ok(frames)
    }

    fn stream(&self) -> Result<MmapStream<'_>, CameraError> {
        MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CameraError::CaptureFailed(format!("failed to create mmap stream: {e}")))
    }

    fn next_frame(&self, stream: &mut MmapStream<'_>) -> Result<Frame, CameraError> {
        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
        let gray = self.to_grayscale(buf)?;
        Ok(Frame::new(gray, self.width, self.height, meta.sequence))
    }

    fn to_grayscale(&self, buf: &[u8]) -> Result<Vec<u8>, CameraError> {
        let converted = match self.pixel_format {
            PixelFormat::Grey => {
                let pixels = (self.width * self.height) as usize;
                if buf.len() < pixels {
                    return Err(CameraError::CaptureFailed(format!(
                        "GREY buffer too short: expected {pixels}, got {}",
                        buf.len()
                    )));
                }
                Ok(buf[..pixels].to_vec())
            }
            PixelFormat::Y16 => frame::y16_to_grayscale(buf, self.width, self.height),
            PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, self.width, self.height),
        };
        converted.map_err(|e| CameraError::CaptureFailed(format!("{:?} conversion: {e}", self.pixel_format)))
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..16)
            .filter_map(|i| {
                let path = format!("/dev/video{i}");
                if !Path::new(&path).exists() {
                    return None;
                }
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        path,
                        name: caps.card.clone(),
                        driver: caps.driver.clone(),
                        bus: caps.bus.clone(),
                    })
            })
            .collect()
    }
}

impl CaptureDevice for Camera {
    fn run(&mut self, stop: &AtomicBool, sink: &mut dyn FnMut(Frame)) -> Result<(), CameraError> {
        let mut stream = self.stream()?;
        while !stop.load(Ordering::Acquire) {
            let frame = self.next_frame(&mut stream)?;
            sink(frame);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} ({}x{} {:?})", self.device_path, self.width, self.height, self.pixel_format)
    }
}
