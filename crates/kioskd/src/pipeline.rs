//! Frame → detection → controller plumbing.
//!
//! Detection runs on the capture thread next to the blocking V4L2 reads.
//! Outcomes cross into the runtime over a bounded channel and are consumed,
//! in order, by a single controller task.

use kiosk_core::{Detection, DetectionError, FaceLocator, PresenceDetector};
use kiosk_hw::Frame;
use kiosk_session::KioskController;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Detection outcomes buffered between the capture thread and the controller.
pub const DETECTION_QUEUE: usize = 8;

pub type DetectionOutcome = Result<Detection, DetectionError>;

/// Runs presence detection on captured frames.
///
/// Dark frames (lens covered, lights off) are reported absent without
/// running the model.
pub struct FrameAnalyzer<M> {
    detector: PresenceDetector<M>,
}

impl<M: FaceLocator> FrameAnalyzer<M> {
    pub fn new(detector: PresenceDetector<M>) -> Self {
        Self { detector }
    }

    pub fn analyze(&mut self, frame: &Frame) -> DetectionOutcome {
        if frame.is_dark {
            tracing::trace!(seq = frame.sequence, "dark frame, skipping inference");
            return Ok(Detection::absent(frame.timestamp));
        }
        let detection =
            self.detector
                .detect(&frame.data, frame.width, frame.height, frame.timestamp)?;
        tracing::trace!(
            seq = frame.sequence,
            present = detection.present,
            face_size = detection.face_size,
            "frame analyzed"
        );
        Ok(detection)
    }
}

/// Build the capture-thread callback: analyze each frame and hand the outcome
/// to the controller, blocking while the queue is full.
pub fn frame_sink<M>(
    mut analyzer: FrameAnalyzer<M>,
    tx: mpsc::Sender<DetectionOutcome>,
) -> impl FnMut(Frame) + Send + 'static
where
    M: FaceLocator + 'static,
{
    let mut closed = false;
    move |frame| {
        if closed {
            return;
        }
        let outcome = analyzer.analyze(&frame);
        if tx.blocking_send(outcome).is_err() {
            tracing::debug!("controller gone, dropping frames");
            closed = true;
        }
    }
}

/// Spawn the controller task. It ends when every sender is dropped.
pub fn spawn_controller(
    mut controller: KioskController,
    mut rx: mpsc::Receiver<DetectionOutcome>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("controller task started");
        while let Some(outcome) = rx.recv().await {
            controller.on_frame(outcome);
        }
        tracing::info!("controller task exiting");
    })
}
