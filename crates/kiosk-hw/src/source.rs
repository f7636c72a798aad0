//! Frame source: owns the camera and pushes frames to a subscriber.
//!
//! Capture runs on a dedicated OS thread that owns the device. Stopping
//! signals the thread and joins it, so the device is closed by the time
//! `stop` returns. `start` always stops first; two acquisitions of the
//! camera never overlap.

use crate::camera::CameraError;
use crate::frame::Frame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Something that can stream frames until asked to stop.
///
/// `run` blocks the calling thread, handing each frame to `sink`, and returns
/// once `stop` is observed or capture fails.
pub trait CaptureDevice: Send + 'static {
    fn run(&mut self, stop: &AtomicBool, sink: &mut dyn FnMut(Frame)) -> Result<(), CameraError>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Called on the capture thread when streaming ends with an error.
type FailureHook = Arc<dyn Fn(&CameraError) + Send + Sync>;

struct CaptureWorker {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Exclusive, restartable frame source bound to a camera preview target.
pub struct FrameSource {
    preview_target: String,
    worker: Option<CaptureWorker>,
    on_failure: Option<FailureHook>,
}

impl FrameSource {
    /// `preview_target` names the camera preview surface; it is carried for
    /// logging and never interpreted.
    pub fn new(preview_target: impl Into<String>) -> Self {
        Self {
            preview_target: preview_target.into(),
            worker: None,
            on_failure: None,
        }
    }

    /// Register `hook` to hear about capture failures after a successful
    /// start (device unplugged, dequeue errors). A requested stop is not a
    /// failure.
    pub fn on_failure(&mut self, hook: impl Fn(&CameraError) + Send + Sync + 'static) {
        self.on_failure = Some(Arc::new(hook));
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.thread.is_finished())
    }

    /// Acquire a device through `open` and start streaming frames to `on_frame`.
    ///
    /// Any previous capture is fully stopped before `open` is called. Errors
    /// from `open` are returned; errors during streaming end the capture
    /// thread and are passed to the failure hook.
    pub fn start<D, O, F>(&mut self, open: O, mut on_frame: F) -> Result<(), CameraError>
    where
        D: CaptureDevice,
        O: FnOnce() -> Result<D, CameraError>,
        F: FnMut(Frame) + Send + 'static,
    {
        self.stop();

        let mut device = open()?;
        let description = device.describe();
        tracing::info!(
            device = %description,
            preview = %self.preview_target,
            "frame source starting"
        );

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let on_failure = self.on_failure.clone();
        let thread = std::thread::Builder::new()
            .name("kiosk-capture".into())
            .spawn(move || {
                match device.run(&thread_stop, &mut on_frame) {
                    Ok(()) => tracing::debug!(device = %description, "capture loop finished"),
                    Err(e) => {
                        tracing::error!(device = %description, error = %e, "capture loop failed");
                        if let Some(hook) = on_failure {
                            hook(&e);
                        }
                    }
                }
                // `device` drops here, releasing the camera.
            })
            .map_err(|e| CameraError::CaptureFailed(format!("failed to spawn capture thread: {e}")))?;

        self.worker = Some(CaptureWorker { stop, thread });
        Ok(())
    }

    /// Stop capture and wait for the device to be released. No-op when idle.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.stop.store(true, Ordering::Release);
        if worker.thread.join().is_err() {
            tracing::error!("capture thread panicked");
        }
        tracing::info!(preview = %self.preview_target, "frame source stopped");
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    /// Synthetic device that counts live instances so tests can check
    /// exclusivity.
    struct FakeCamera {
        live: Arc<AtomicUsize>,
        frames: Option<usize>,
    }

    impl FakeCamera {
        fn open(
            live: &Arc<AtomicUsize>,
            max_live: &Arc<AtomicUsize>,
            frames: Option<usize>,
        ) -> Result<Self, CameraError> {
            let now = live.fetch_add(1, Ordering::SeqCst) + 1;
            max_live.fetch_max(now, Ordering::SeqCst);
            Ok(Self {
                live: Arc::clone(live),
                frames,
            })
        }
    }

    impl Drop for FakeCamera {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl CaptureDevice for FakeCamera {
        fn run(&mut self, stop: &AtomicBool, sink: &mut dyn FnMut(Frame)) -> Result<(), CameraError> {
            let mut seq = 0;
            while !stop.load(Ordering::Acquire) {
                if self.frames.is_some_and(|n| seq as usize >= n) {
                    return Ok(());
                }
                sink(Frame::new(vec![128; 4], 2, 2, seq));
                seq += 1;
                std::thread::sleep(Duration::from_millis(1));
            }
            Ok(())
        }

        fn describe(&self) -> String {
            "fake".into()
        }
    }

    #[test]
    fn test_frames_reach_subscriber() {
        let live = Arc::new(AtomicUsize::new(0));
        let max_live = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        let mut source = FrameSource::new("camera-preview");
        source
            .start(|| FakeCamera::open(&live, &max_live, Some(3)), move |f| {
                let _ = tx.send(f.sequence);
            })
            .unwrap();

        let seqs: Vec<u32> = rx.iter().take(3).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        source.stop();
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_restart_releases_previous_device_first() {
        let live = Arc::new(AtomicUsize::new(0));
        let max_live = Arc::new(AtomicUsize::new(0));

        let mut source = FrameSource::new("camera-preview");
        source.start(|| FakeCamera::open(&live, &max_live, None), |_| {}).unwrap();
        assert!(source.is_running());
        source.start(|| FakeCamera::open(&live, &max_live, None), |_| {}).unwrap();

        assert_eq!(max_live.load(Ordering::SeqCst), 1);
        source.stop();
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_open_failure_is_returned() {
        let mut source = FrameSource::new("camera-preview");
        let err = source
            .start(
                || -> Result<FakeCamera, CameraError> {
                    Err(CameraError::Unavailable("/dev/video9: no such device".into()))
                },
                |_| {},
            )
            .unwrap_err();
        assert!(matches!(err, CameraError::Unavailable(_)));
        assert!(!source.is_running());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut source = FrameSource::new("camera-preview");
        source.stop();
        source.stop();
        assert!(!source.is_running());
    }

    struct FailingCamera;

    impl CaptureDevice for FailingCamera {
        fn run(&mut self, _: &AtomicBool, sink: &mut dyn FnMut(Frame)) -> Result<(), CameraError> {
            sink(Frame::new(vec![128; 4], 2, 2, 0));
            Err(CameraError::CaptureFailed("device unplugged".into()))
        }

        fn describe(&self) -> String {
            "failing".into()
        }
    }

    #[test]
    fn test_streaming_failure_reaches_hook() {
        let (tx, rx) = mpsc::channel();
        let mut source = FrameSource::new("camera-preview");
        source.on_failure(move |e| {
            let _ = tx.send(e.to_string());
        });
        source.start(|| Ok(FailingCamera), |_| {}).unwrap();

        let reported = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(reported.contains("device unplugged"));
        source.stop();
    }

    #[test]
    fn test_requested_stop_is_not_a_failure() {
        let live = Arc::new(AtomicUsize::new(0));
        let max_live = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&failures);

        let mut source = FrameSource::new("camera-preview");
        source.on_failure(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
        });
        source.start(|| FakeCamera::open(&live, &max_live, None), |_| {}).unwrap();
        source.stop();
        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }
}
