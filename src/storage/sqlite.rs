use std::{path::Path, sync::Arc};

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use tracing::{debug, info, instrument};

use crate::utils::time::SAMPLE_TIMESTAMP_FORMAT;

use super::{entities::Sample, ActivityStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS activities (
    timestamp TEXT NOT NULL,
    app_name TEXT NOT NULL,
    window_title TEXT NOT NULL,
    url TEXT,
    session TEXT
);
CREATE INDEX IF NOT EXISTS idx_activities_session ON activities(session);
";

/// [ActivityStore] backed by a single SQLite table. Every append is its own autocommitted
/// statement, so a crash loses at most the sample being written.
pub struct SqliteActivityStore {
    conn: Option<Connection>,
}

impl SqliteActivityStore {
    /// Opens the database at `path`, creating the file, its directory and the table if needed.
    #[instrument]
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!("Opened activity log");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Some(conn) })
    }

    fn connection(&self) -> Result<&Connection, StoreError> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    /// All samples in insertion order.
    pub fn samples(&self) -> Result<Vec<Sample>, StoreError> {
        let conn = self.connection()?;
        let mut statement = conn.prepare(
            "SELECT timestamp, app_name, window_title, url, session FROM activities ORDER BY rowid",
        )?;
        let rows = statement.query_map([], RawSample::from_row)?;
        rows.map(|row| row?.into_sample()).collect()
    }

    /// Samples recorded while the session named `label` was active, in insertion order.
    pub fn samples_for_session(&self, label: &str) -> Result<Vec<Sample>, StoreError> {
        let conn = self.connection()?;
        let mut statement = conn.prepare(
            "SELECT timestamp, app_name, window_title, url, session FROM activities
             WHERE session = ?1 ORDER BY rowid",
        )?;
        let rows = statement.query_map([label], RawSample::from_row)?;
        rows.map(|row| row?.into_sample()).collect()
    }
}

impl ActivityStore for SqliteActivityStore {
    fn append(&mut self, sample: &Sample) -> Result<(), StoreError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO activities (timestamp, app_name, window_title, url, session)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sample.timestamp.format(SAMPLE_TIMESTAMP_FORMAT).to_string(),
                sample.app_name.as_ref(),
                sample.window_title.as_ref(),
                sample.url.as_deref(),
                sample.session.as_deref(),
            ],
        )?;
        debug!("Stored sample {:?}", sample);
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        info!("Closed activity log");
        Ok(())
    }
}

/// Row as read from sqlite, before the timestamp is parsed.
struct RawSample {
    timestamp: String,
    app_name: String,
    window_title: String,
    url: Option<String>,
    session: Option<String>,
}

impl RawSample {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            timestamp: row.get(0)?,
            app_name: row.get(1)?,
            window_title: row.get(2)?,
            url: row.get(3)?,
            session: row.get(4)?,
        })
    }

    fn into_sample(self) -> Result<Sample, StoreError> {
        let timestamp = NaiveDateTime::parse_from_str(&self.timestamp, SAMPLE_TIMESTAMP_FORMAT)
            .map_err(|source| StoreError::InvalidTimestamp {
                value: self.timestamp.clone(),
                source,
            })?;
        Ok(Sample {
            timestamp,
            app_name: self.app_name.into(),
            window_title: self.window_title.into(),
            url: self.url.map(Arc::from),
            session: self.session.map(Arc::from),
        })
    }
}
