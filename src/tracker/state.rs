use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::{
    activity::ActivityKey,
    aggregator::DurationAggregator,
    session::{Session, SessionError, SessionManager},
};

/// Everything the tracking loop knows, owned by the loop for the lifetime of the process.
#[derive(Debug)]
pub struct TrackerState {
    pub started_at: DateTime<Utc>,
    pub started_instant: Instant,
    /// Anchor for the next delta. Moves on every successful sample and on session start.
    pub last_sample: Instant,
    pub sessions: SessionManager,
    pub aggregate: DurationAggregator,
}

impl TrackerState {
    pub fn new(started_at: DateTime<Utc>, started_instant: Instant) -> Self {
        Self {
            started_at,
            started_instant,
            last_sample: started_instant,
            sessions: SessionManager::new(),
            aggregate: DurationAggregator::new(),
        }
    }

    /// Attributes the time since the previous sample to `key`.
    pub fn record(&mut self, key: ActivityKey, now: Instant) {
        let delta = now.saturating_duration_since(self.last_sample);
        self.aggregate.record(key, delta);
        self.last_sample = now;
    }

    /// Starts a session and begins a fresh aggregate. Time before `now` isn't attributed to it.
    pub fn start_session(
        &mut self,
        label: &str,
        started_at: DateTime<Utc>,
        now: Instant,
    ) -> Result<&Session, SessionError> {
        let session = self.sessions.start(label, started_at, now)?;
        self.aggregate.clear();
        self.last_sample = now;
        Ok(session)
    }

    /// The aggregate is left untouched, so time keeps accumulating until the next start.
    pub fn stop_session(&mut self) -> Option<Session> {
        self.sessions.stop()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_instant)
    }
}
