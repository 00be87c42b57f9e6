//! SQLite-backed LeaseStore implementation.
//! Keeps lease records across process restarts.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! benchlease-core = { path = "../benchlease-core", features = ["sqlite"] }
//! ```

use rusqlite::{params, Connection};
use std::time::Duration;

use crate::error::StoreError;
use crate::infrastructure::LeaseStore;
use crate::types::{Lease, LeaseState};

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(Box::new(e))
    }
}

/// A persistent lease store backed by SQLite.
///
/// Uses WAL mode for concurrent read performance.
pub struct SqliteLeaseStore {
    conn: Connection,
    path: String,
}

impl SqliteLeaseStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        // `seq` keeps insertion order stable across upserts
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS leases (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT NOT NULL UNIQUE,
                name        TEXT,
                selector    TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                state       TEXT NOT NULL,
                created_at  INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                expires_at  INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_leases_state ON leases(state);
            CREATE INDEX IF NOT EXISTS idx_leases_resource ON leases(resource_id);",
        )?;

        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    fn row_to_lease(row: &rusqlite::Row) -> rusqlite::Result<(Lease, String)> {
        let state_str: String = row.get(4)?;
        let lease = Lease {
            id: row.get(0)?,
            name: row.get(1)?,
            selector: row.get(2)?,
            resource_id: row.get(3)?,
            // Placeholder until the state column is validated by the caller
            state: LeaseState::Expired,
            created_at: row.get(5)?,
            duration_ms: row.get(6)?,
            expires_at: row.get(7)?,
        };
        Ok((lease, state_str))
    }
}

impl LeaseStore for SqliteLeaseStore {
    fn load_all(&mut self) -> Result<Vec<Lease>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, selector, resource_id, state, created_at, duration_ms, expires_at
             FROM leases ORDER BY seq",
        )?;

        let rows = stmt.query_map([], Self::row_to_lease)?;
        let mut leases = Vec::new();
        for row in rows {
            let (mut lease, state_str) = row?;
            lease.state = LeaseState::parse(&state_str).ok_or_else(|| StoreError::Corrupt {
                id: lease.id.clone(),
                reason: format!("unknown state '{}'", state_str),
            })?;
            leases.push(lease);
        }
        Ok(leases)
    }

    fn save(&mut self, lease: &Lease) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO leases (id, name, selector, resource_id, state, created_at, duration_ms, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                state = excluded.state,
                expires_at = excluded.expires_at",
            params![
                lease.id,
                lease.name,
                lease.selector,
                lease.resource_id,
                lease.state.as_str(),
                lease.created_at,
                lease.duration_ms,
                lease.expires_at,
            ],
        )?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}
