use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session name can't be empty.")]
    EmptyLabel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub label: Arc<str>,
    pub started_at: DateTime<Utc>,
    /// Monotonic counterpart of `started_at`, used for elapsed time.
    pub started_instant: Instant,
}

impl Session {
    pub fn elapsed(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.started_instant)
    }
}

/// Two-state machine: idle (no session) or active. Sessions only end through [SessionManager::stop]
/// and are never persisted.
#[derive(Debug, Default)]
pub struct SessionManager {
    current: Option<Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session named `label`, replacing the current one if any. Leading and trailing
    /// whitespace is not part of the label.
    pub fn start(
        &mut self,
        label: &str,
        started_at: DateTime<Utc>,
        started_instant: Instant,
    ) -> Result<&Session, SessionError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(SessionError::EmptyLabel);
        }
        Ok(self.current.insert(Session {
            label: label.into(),
            started_at,
            started_instant,
        }))
    }

    /// Ends the current session and returns it. `None` when there was nothing to stop.
    pub fn stop(&mut self) -> Option<Session> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn label(&self) -> Option<Arc<str>> {
        self.current.as_ref().map(|s| s.label.clone())
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }
}
