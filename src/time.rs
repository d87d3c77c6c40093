//! Wall-clock timestamps and the time-jump signal forwarded from the host
//! process to the [`crate::update_manager::UpdateManager`] (spec §4.D/§4.E).

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch. Stored rather than `SystemTime` directly
/// so it serializes cheaply onto the wire and into the backend blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeStamp(pub i64);

impl TimeStamp {
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self(secs)
    }

    pub const ZERO: TimeStamp = TimeStamp(0);
}

impl Default for TimeStamp {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Tracks the last timestamp observed, so a caller can detect a backwards
/// or forwards system clock jump and forward it as
/// [`crate::update_manager::UpdateManager::on_time_jump`].
#[derive(Debug, Default)]
pub struct JumpDetector {
    last_seen: Option<TimeStamp>,
}

impl JumpDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observes the current time and returns `Some(backwards)` if it moved
    /// by more than `tolerance_secs` since the last observation.
    pub fn observe(&mut self, now: TimeStamp, tolerance_secs: i64) -> Option<bool> {
        let jumped = self
            .last_seen
            .map(|last| (now.0 - last.0).abs() > tolerance_secs)
            .unwrap_or(false);
        let backwards = self.last_seen.map(|last| now.0 < last.0).unwrap_or(false);
        self.last_seen = Some(now);
        jumped.then_some(backwards)
    }
}
