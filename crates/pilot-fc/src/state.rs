use pilot_proto::TelemetrySnapshot;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Shared view of the link, written by the reader loop.
#[derive(Debug, Clone, Default)]
pub struct LinkStatus {
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub last_heartbeat: Option<Instant>,
    pub messages: u64,
    pub snapshot: TelemetrySnapshot,
}

impl LinkStatus {
    pub fn hb_age(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }

    /// Snapshot to evaluate, or an empty one once the autopilot has gone quiet
    /// for longer than `max_age`. Stale values must not keep a dead link
    /// looking connected.
    pub fn fresh_snapshot(&self, max_age: Duration) -> TelemetrySnapshot {
        match self.hb_age() {
            Some(age) if age <= max_age => self.snapshot.clone(),
            _ => TelemetrySnapshot::default(),
        }
    }
}

/// A panicked writer leaves the last complete update behind; keep using it.
pub fn lock_status(st: &Mutex<LinkStatus>) -> MutexGuard<'_, LinkStatus> {
    st.lock().unwrap_or_else(PoisonError::into_inner)
}
