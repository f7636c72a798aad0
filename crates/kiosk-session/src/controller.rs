//! Per-frame reaction: detection in, presence events and session start out.

use kiosk_core::{
    Detection, DetectionError, DistanceBucket, PresenceDebouncer, PresenceEvent, PresenceState,
};
use tokio::task::JoinHandle;

use crate::coordinator::SessionCoordinator;
use crate::status::{self, StatusBoard};

/// Drives the debouncer and the coordinator from the detection stream.
///
/// All presence state lives here; the controller is fed sequentially, one
/// detection outcome per frame.
pub struct KioskController {
    debouncer: PresenceDebouncer,
    coordinator: SessionCoordinator,
    status: StatusBoard,
    bootstrap: Option<JoinHandle<()>>,
}

impl KioskController {
    pub fn new(
        debouncer: PresenceDebouncer,
        coordinator: SessionCoordinator,
        status: StatusBoard,
    ) -> Self {
        Self {
            debouncer,
            coordinator,
            status,
            bootstrap: None,
        }
    }

    pub fn presence(&self) -> PresenceState {
        self.debouncer.state()
    }

    pub fn coordinator(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    /// Take the most recently started bootstrap task, if any.
    pub fn take_bootstrap(&mut self) -> Option<JoinHandle<()>> {
        self.bootstrap.take()
    }

    /// React to one frame. Detection errors skip the frame.
    pub fn on_frame(&mut self, outcome: Result<Detection, DetectionError>) {
        let detection = match outcome {
            Ok(detection) => detection,
            Err(e) => {
                tracing::warn!(error = %e, "detection failed, frame skipped");
                return;
            }
        };

        for event in self.debouncer.update(&detection) {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: PresenceEvent) {
        match event {
            PresenceEvent::Arrived { bucket } => {
                tracing::info!(%bucket, in_range = bucket.is_in_range(), "customer arrived");
                self.status.update(|s| {
                    s.customer_present = true;
                    s.distance = Some(bucket);
                });
                self.react_to_distance(bucket);
            }
            PresenceEvent::DistanceChanged { bucket, face_size } => {
                tracing::debug!(%bucket, face_size, "customer distance changed");
                self.status.update(|s| s.distance = Some(bucket));
                self.react_to_distance(bucket);
            }
            PresenceEvent::Departed => {
                tracing::info!("customer left");
                self.status.update(|s| {
                    s.customer_present = false;
                    s.distance = None;
                });
                if !self.coordinator.state().is_started() {
                    self.status.set_message(status::MSG_WAITING);
                }
            }
        }
    }

    /// Start the session once the customer is in range; otherwise ask them
    /// to come closer. Nothing changes once a session is under way.
    fn react_to_distance(&mut self, bucket: DistanceBucket) {
        if self.coordinator.state().is_started() {
            return;
        }
        if !bucket.is_in_range() {
            self.status.set_message(status::MSG_COME_CLOSER);
            return;
        }
        self.status.set_message(status::MSG_STARTING);
        if let Some(task) = self.coordinator.on_arrival_in_range() {
            self.bootstrap = Some(task);
        }
    }
}
