//! Presence debouncing.
//!
//! Turns the flickery per-frame [`Detection`] stream into presence events.
//! Arrival is immediate on the first positive frame; departure is declared
//! only after a run of absent frames longer than the threshold, so a single
//! missed detection does not end the customer's visit.

use crate::types::{Detection, DistanceBucket};

/// Absent frames tolerated before departure (about one second at 30 Hz).
pub const DEFAULT_ABSENCE_THRESHOLD: u32 = 30;

/// Debounced presence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceState {
    pub is_present: bool,
    /// Last distance bucket while present; `None` while absent.
    pub bucket: Option<DistanceBucket>,
    pub consecutive_absent_frames: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PresenceEvent {
    /// A customer appeared in front of the kiosk.
    Arrived { bucket: DistanceBucket },
    /// The customer has been gone for longer than the absence threshold.
    Departed,
    /// The distance bucket changed while present.
    DistanceChanged {
        bucket: DistanceBucket,
        face_size: f32,
    },
}

pub struct PresenceDebouncer {
    state: PresenceState,
    absence_threshold: u32,
}

impl Default for PresenceDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_ABSENCE_THRESHOLD)
    }
}

impl PresenceDebouncer {
    pub fn new(absence_threshold: u32) -> Self {
        Self {
            state: PresenceState::default(),
            absence_threshold,
        }
    }

    pub fn state(&self) -> PresenceState {
        self.state
    }

    /// Feed one detection, returning the events it produced in order.
    ///
    /// An arrival frame yields `Arrived` followed by `DistanceChanged`, since
    /// the bucket moves from `None` to the arrival bucket.
    pub fn update(&mut self, detection: &Detection) -> Vec<PresenceEvent> {
        let mut events = Vec::new();

        let Some(bucket) = detection.bucket() else {
            self.state.consecutive_absent_frames =
                self.state.consecutive_absent_frames.saturating_add(1);
            if self.state.is_present
                && self.state.consecutive_absent_frames > self.absence_threshold
            {
                self.state.is_present = false;
                self.state.bucket = None;
                tracing::debug!(
                    absent_frames = self.state.consecutive_absent_frames,
                    "presence: departed"
                );
                events.push(PresenceEvent::Departed);
            }
            return events;
        };

        self.state.consecutive_absent_frames = 0;

        if !self.state.is_present {
            self.state.is_present = true;
            tracing::debug!(%bucket, "presence: arrived");
            events.push(PresenceEvent::Arrived { bucket });
        }

        if self.state.bucket != Some(bucket) {
            self.state.bucket = Some(bucket);
            events.push(PresenceEvent::DistanceChanged {
                bucket,
                face_size: detection.face_size,
            });
        }

        events
    }

    /// Forget everything, as if no frame had been seen.
    pub fn reset(&mut self) {
        self.state = PresenceState::default();
    }
}
