use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of wall-clock time, monotonic instants and sleeping for the tracker. Deltas between
/// samples are always measured with [Clock::instant] so that wall-clock jumps can't produce
/// negative durations.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, instant: Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}

/// Clock whose wall time moves together with tokio's (possibly paused) time. Used by tests.
#[cfg(test)]
#[derive(Clone)]
pub struct TestClock {
    start_time: DateTime<Utc>,
    reference: Instant,
}

#[cfg(test)]
impl TestClock {
    pub fn starting_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            reference: Instant::now(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Clock for TestClock {
    fn time(&self) -> DateTime<Utc> {
        self.start_time + self.reference.elapsed()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, instant: Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
