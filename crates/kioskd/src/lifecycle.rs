//! Start and teardown ordering for the kiosk pipeline.
//!
//! Teardown stops frame acquisition first (the capture thread is joined and
//! the camera released), then stops the avatar session. Both steps are
//! idempotent; the second and later calls return immediately.
//!
//! Stopping the frame source joins the capture thread, so every stop runs
//! on the blocking pool rather than a runtime worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use kiosk_core::{FaceLocator, PresenceDebouncer, PresenceDetector};
use kiosk_hw::{CameraError, CaptureDevice, FrameSource};
use kiosk_session::status::{MSG_CAMERA_FAILED, MSG_CAMERA_READY, MSG_CAMERA_STARTING, MSG_STARTING};
use kiosk_session::{KioskController, SessionCoordinator, StatusBoard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::pipeline::{frame_sink, spawn_controller, FrameAnalyzer, DETECTION_QUEUE};

#[derive(Default)]
struct Tasks {
    controller: Option<JoinHandle<()>>,
    fallback: Option<JoinHandle<()>>,
}

pub struct Lifecycle {
    frames: Arc<Mutex<FrameSource>>,
    coordinator: SessionCoordinator,
    status: StatusBoard,
    tasks: Mutex<Tasks>,
    torn_down: AtomicBool,
    stream_failed: Arc<AtomicBool>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn report_camera_failure(status: &StatusBoard, error: &CameraError) {
    status.update(|s| {
        s.camera_ready = false;
        s.message = MSG_CAMERA_FAILED.to_string();
        s.last_error = Some(error.to_string());
    });
}

impl Lifecycle {
    pub fn new(mut frames: FrameSource, coordinator: SessionCoordinator, status: StatusBoard) -> Self {
        let stream_failed = Arc::new(AtomicBool::new(false));
        let failed = Arc::clone(&stream_failed);
        let board = status.clone();
        frames.on_failure(move |e| {
            failed.store(true, Ordering::Release);
            report_camera_failure(&board, e);
        });

        Self {
            frames: Arc::new(Mutex::new(frames)),
            coordinator,
            status,
            tasks: Mutex::new(Tasks::default()),
            torn_down: AtomicBool::new(false),
            stream_failed,
        }
    }

    async fn stop_frames(&self) {
        let frames = Arc::clone(&self.frames);
        if let Err(e) = tokio::task::spawn_blocking(move || lock(&frames).stop()).await {
            tracing::error!(error = %e, "frame source stop task failed");
        }
    }

    /// Acquire the camera through `open` and start detection and the
    /// controller task.
    ///
    /// A running pipeline is stopped first. A camera failure, at open or
    /// later while streaming, is surfaced in the status; open failures are
    /// also returned. There is no retry. Ignored after teardown.
    pub async fn start<D, O, M>(
        &self,
        open: O,
        detector: PresenceDetector<M>,
        absence_threshold: u32,
    ) -> Result<(), CameraError>
    where
        D: CaptureDevice,
        O: FnOnce() -> Result<D, CameraError>,
        M: FaceLocator + 'static,
    {
        if self.torn_down.load(Ordering::Acquire) {
            tracing::warn!("start requested after teardown, ignoring");
            return Ok(());
        }
        self.stop_frames().await;
        self.status.set_message(MSG_CAMERA_STARTING);

        let (tx, rx) = mpsc::channel(DETECTION_QUEUE);
        let sink = frame_sink(FrameAnalyzer::new(detector), tx);
        self.stream_failed.store(false, Ordering::Release);
        if let Err(e) = lock(&self.frames).start(open, sink) {
            tracing::error!(error = %e, "camera unavailable");
            report_camera_failure(&self.status, &e);
            return Err(e);
        }

        // The stream may already have died; its failure report wins.
        let failed = &self.stream_failed;
        self.status.update(|s| {
            if !failed.load(Ordering::Acquire) {
                s.camera_ready = true;
                s.message = MSG_CAMERA_READY.to_string();
            }
        });

        let controller = KioskController::new(
            PresenceDebouncer::new(absence_threshold),
            self.coordinator.clone(),
            self.status.clone(),
        );
        let task = spawn_controller(controller, rx);
        if let Some(previous) = lock(&self.tasks).controller.replace(task) {
            previous.abort();
        }
        Ok(())
    }

    /// Start the session once after `delay`, without presence detection.
    pub fn start_fallback(&self, delay: Duration) {
        if self.torn_down.load(Ordering::Acquire) {
            return;
        }
        tracing::warn!(delay_secs = delay.as_secs_f32(), "presence detection unavailable, auto-start scheduled");

        let coordinator = self.coordinator.clone();
        let status = self.status.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!("fallback auto-start");
            status.set_message(MSG_STARTING);
            if coordinator.on_arrival_in_range().is_none() {
                tracing::debug!("session already started");
            }
        });
        if let Some(previous) = lock(&self.tasks).fallback.replace(task) {
            previous.abort();
        }
    }

    /// Stop frames, then the session. Never fails.
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            tracing::debug!("teardown already done");
            return;
        }
        tracing::info!("tearing down");

        let (controller, fallback) = {
            let mut tasks = lock(&self.tasks);
            (tasks.controller.take(), tasks.fallback.take())
        };
        if let Some(fallback) = fallback {
            fallback.abort();
        }

        self.stop_frames().await;
        if let Some(controller) = controller {
            controller.abort();
        }
        self.status.update(|s| s.camera_ready = false);

        self.coordinator.teardown().await;
        tracing::info!("teardown complete");
    }
}
