//! Durable, append-only log of [entities::Sample]s.
//!
//! The tracker only ever appends; reading is provided for inspection and tests. The log is
//! independent of the in-memory aggregate, so losing one never affects the other.

pub mod entities;
pub mod sqlite;

use entities::Sample;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare storage directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid timestamp {value:?} in activity log")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("activity log is already closed")]
    Closed,
}

/// Interface of the activity log used by the tracking loop.
#[cfg_attr(test, automock)]
pub trait ActivityStore {
    /// Persists a sample. The sample is durable once this returns `Ok`.
    fn append(&mut self, sample: &Sample) -> Result<(), StoreError>;

    /// Releases the underlying storage. Later appends fail with [StoreError::Closed].
    fn close(&mut self) -> Result<(), StoreError>;
}
