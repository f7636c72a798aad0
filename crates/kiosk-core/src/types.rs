use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Bounding box for a detected face.
///
/// Coordinates are in whatever space produced them: pixels for raw detector
/// output, `0.0..=1.0` after [`normalized`](Self::normalized).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl BoundingBox {
    /// Rescale a pixel-space box into frame-relative coordinates.
    ///
    /// Width is divided by the frame width and height by the frame height,
    /// so a face filling the whole frame has a normalized diagonal of √2.
    pub fn normalized(&self, frame_width: u32, frame_height: u32) -> BoundingBox {
        let fw = frame_width.max(1) as f32;
        let fh = frame_height.max(1) as f32;
        BoundingBox {
            x: self.x / fw,
            y: self.y / fh,
            width: self.width / fw,
            height: self.height / fh,
            confidence: self.confidence,
        }
    }

    /// Length of the box diagonal, `sqrt(width² + height²)`.
    pub fn diagonal(&self) -> f32 {
        (self.width * self.width + self.height * self.height).sqrt()
    }
}

// Lower bounds (exclusive) of each bucket, nearest first.
const VERY_CLOSE_ABOVE: f32 = 0.4;
const CLOSE_ABOVE: f32 = 0.3;
const MEDIUM_ABOVE: f32 = 0.2;

/// Approximate customer distance, derived from normalized face size.
///
/// A larger face means the customer is closer to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBucket {
    /// Face diagonal above 0.4 (roughly under half a metre).
    VeryClose,
    /// 0.3 < diagonal <= 0.4 (roughly within a metre).
    Close,
    /// 0.2 < diagonal <= 0.3.
    Medium,
    /// Diagonal of 0.2 or less.
    Far,
}

impl DistanceBucket {
    /// Map a normalized face diagonal to a bucket using strict `>` thresholds.
    pub fn from_face_size(face_size: f32) -> Self {
        if face_size > VERY_CLOSE_ABOVE {
            DistanceBucket::VeryClose
        } else if face_size > CLOSE_ABOVE {
            DistanceBucket::Close
        } else if face_size > MEDIUM_ABOVE {
            DistanceBucket::Medium
        } else {
            DistanceBucket::Far
        }
    }

    /// Whether a customer at this distance is close enough to interact.
    pub fn is_in_range(self) -> bool {
        matches!(self, DistanceBucket::VeryClose | DistanceBucket::Close)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DistanceBucket::VeryClose => "very_close",
            DistanceBucket::Close => "close",
            DistanceBucket::Medium => "medium",
            DistanceBucket::Far => "far",
        }
    }
}

impl std::fmt::Display for DistanceBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of running presence detection on one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub present: bool,
    /// Normalized face diagonal; `0.0` when no face was found.
    pub face_size: f32,
    /// Capture time of the frame this detection came from.
    pub timestamp: Instant,
}

impl Detection {
    pub fn present(face_size: f32, timestamp: Instant) -> Self {
        Self {
            present: true,
            face_size,
            timestamp,
        }
    }

    pub fn absent(timestamp: Instant) -> Self {
        Self {
            present: false,
            face_size: 0.0,
            timestamp,
        }
    }

    /// Distance bucket, or `None` when no face is present.
    pub fn bucket(&self) -> Option<DistanceBucket> {
        self.present
            .then(|| DistanceBucket::from_face_size(self.face_size))
    }

    pub fn is_in_range(&self) -> bool {
        self.bucket().is_some_and(DistanceBucket::is_in_range)
    }
}
