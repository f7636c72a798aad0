//! Per-frame presence detection.
//!
//! Wraps a face model and reduces its output to a [`Detection`]: is there a
//! face, and how large is it relative to the frame. No state is carried
//! between calls; smoothing over time is the debouncer's job.

use crate::detector::DetectorError;
use crate::types::{BoundingBox, Detection};
use std::time::Instant;
use thiserror::Error;

/// Minimum model confidence for a face to count as present.
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("face model failed: {0}")]
    Model(#[from] DetectorError),
}

/// A face model: one grayscale frame in, zero or more pixel-space boxes out,
/// best candidate first.
pub trait FaceLocator: Send {
    fn locate(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<BoundingBox>, DetectorError>;
}

/// Single-face presence detector.
///
/// Only the first face reported by the model is considered; scenes with
/// several people are treated the same as scenes with one.
pub struct PresenceDetector<M> {
    model: M,
    min_confidence: f32,
}

impl<M: FaceLocator> PresenceDetector<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Run the model on one frame.
    pub fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        captured_at: Instant,
    ) -> Result<Detection, DetectionError> {
        let expected = width as usize * height as usize;
        if expected == 0 || frame.len() < expected {
            return Err(DetectionError::InvalidFrame(format!(
                "{width}x{height} frame needs {expected} bytes, got {}",
                frame.len()
            )));
        }

        let faces = self.model.locate(frame, width, height)?;
        let Some(face) = faces
            .first()
            .filter(|f| f.confidence >= self.min_confidence)
        else {
            return Ok(Detection::absent(captured_at));
        };

        let face_size = face.normalized(width, height).diagonal();
        tracing::trace!(
            confidence = face.confidence,
            face_size,
            "face located"
        );
        Ok(Detection::present(face_size, captured_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DistanceBucket;

    /// Replays a fixed answer for every frame.
    struct FixedModel(Result<Vec<BoundingBox>, &'static str>);

    impl FaceLocator for FixedModel {
        fn locate(&mut self, _: &[u8], _: u32, _: u32) -> Result<Vec<BoundingBox>, DetectorError> {
            self.0
                .clone()
                .map_err(|e| DetectorError::InferenceFailed(e.to_string()))
        }
    }

    fn face(width: f32, height: f32, confidence: f32) -> BoundingBox {
        BoundingBox {
            x: 10.0,
            y: 10.0,
            width,
            height,
            confidence,
        }
    }

    const W: u32 = 100;
    const H: u32 = 100;

    fn frame() -> Vec<u8> {
        vec![128u8; (W * H) as usize]
    }

    #[test]
    fn test_no_face_is_absent() {
        let mut detector = PresenceDetector::new(FixedModel(Ok(vec![])));
        let det = detector.detect(&frame(), W, H, Instant::now()).unwrap();
        assert!(!det.present);
        assert_eq!(det.bucket(), None);
    }

    #[test]
    fn test_face_size_is_normalized_diagonal() {
        let mut detector = PresenceDetector::new(FixedModel(Ok(vec![face(30.0, 40.0, 0.9)])));
        let det = detector.detect(&frame(), W, H, Instant::now()).unwrap();
        assert!(det.present);
        assert!((det.face_size - 0.5).abs() < 1e-6);
        assert_eq!(det.bucket(), Some(DistanceBucket::VeryClose));
    }

    #[test]
    fn test_only_first_face_is_used() {
        let mut detector = PresenceDetector::new(FixedModel(Ok(vec![
            face(10.0, 10.0, 0.9),
            face(60.0, 60.0, 0.8),
        ])));
        let det = detector.detect(&frame(), W, H, Instant::now()).unwrap();
        assert_eq!(det.bucket(), Some(DistanceBucket::Far));
    }

    #[test]
    fn test_low_confidence_face_is_absent() {
        let mut detector = PresenceDetector::new(FixedModel(Ok(vec![face(50.0, 50.0, 0.3)])));
        let det = detector.detect(&frame(), W, H, Instant::now()).unwrap();
        assert!(!det.present);
    }

    #[test]
    fn test_model_error_surfaces_as_detection_error() {
        let mut detector = PresenceDetector::new(FixedModel(Err("session poisoned")));
        let err = detector.detect(&frame(), W, H, Instant::now()).unwrap_err();
        assert!(matches!(err, DetectionError::Model(_)));
        // The detector stays usable after a failure.
        assert!(detector.detect(&frame(), W, H, Instant::now()).is_err());
    }

    #[test]
    fn test_short_buffer_is_invalid_frame() {
        let mut detector = PresenceDetector::new(FixedModel(Ok(vec![])));
        let err = detector.detect(&[0u8; 10], W, H, Instant::now()).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidFrame(_)));
    }
}
