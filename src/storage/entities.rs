use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::probe::FocusSnapshot;

/// One observation of the focused application. Created once per tick that produced a usable
/// snapshot and never modified afterwards.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Sample {
    /// Local wall-clock time, second precision.
    pub timestamp: NaiveDateTime,
    pub app_name: Arc<str>,
    pub window_title: Arc<str>,
    pub url: Option<Arc<str>>,
    /// Label of the session active when the sample was taken.
    pub session: Option<Arc<str>>,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, snapshot: FocusSnapshot, session: Option<Arc<str>>) -> Self {
        let FocusSnapshot {
            app_name,
            window_title,
            url,
        } = snapshot;
        Self {
            timestamp,
            app_name,
            window_title,
            url,
            session,
        }
    }
}
