//! Persisted registry of already-processed files.
//!
//! The registry is the idempotence guarantee: a fingerprint present here
//! means the catalog artifact for that file exists and must not be created
//! again. Rows are inserted only after a successful catalog create and
//! removed only after a confirmed catalog delete. Losing this database
//! causes mass duplicate creation on the next pass, so opening it runs an
//! integrity check and any failure is fatal for the pass.
//!
//! All timestamps are stored as INTEGER milliseconds since the Unix epoch.

use crate::error::RegistryError;
use crate::fingerprint::Fingerprint;
use crate::types::{ArtifactId, RegistryEntry, Trigger};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS registry (
    fingerprint TEXT PRIMARY KEY,
    owner_folder TEXT NOT NULL,
    relative_path TEXT NOT NULL,
    artifact_id TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    triggered_by TEXT NOT NULL CHECK (triggered_by IN ('scheduled', 'manual'))
);

CREATE INDEX IF NOT EXISTS idx_registry_owner ON registry(owner_folder);
"#;

/// Durable fingerprint → [`RegistryEntry`] map.
///
/// The connection is mutex-wrapped so concurrent readers during a scan are
/// safe; the orchestrator is the single writer by construction (registry
/// mutation only happens inside the scan lock's critical section).
pub struct Registry {
    conn: Mutex<Connection>,
}

impl Registry {
    /// Open (creating if absent) the registry at `path`.
    pub fn open(path: &Path) -> Result<Self, RegistryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory registry, for tests.
    pub fn open_in_memory() -> Result<Self, RegistryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, RegistryError> {
        let check: String = conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))
            .map_err(|e| RegistryError::Corrupt(e.to_string()))?;
        if check != "ok" {
            return Err(RegistryError::Corrupt(check));
        }
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Whether a fingerprint has already been processed.
    pub fn has(&self, fingerprint: &Fingerprint) -> Result<bool, RegistryError> {
        let conn = self.conn.lock().expect("registry mutex poisoned");
        let mut stmt = conn.prepare("SELECT 1 FROM registry WHERE fingerprint = ?1")?;
        Ok(stmt.exists(params![fingerprint.as_str()])?)
    }

    /// Record a successfully created artifact. The write is durable before
    /// this returns; passes interrupted afterwards resume correctly.
    pub fn put(&self, entry: &RegistryEntry) -> Result<(), RegistryError> {
        let conn = self.conn.lock().expect("registry mutex poisoned");
        conn.execute(
            "INSERT INTO registry
                (fingerprint, owner_folder, relative_path, artifact_id, created_at, triggered_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.fingerprint.as_str(),
                entry.owner_folder,
                entry.relative_path,
                entry.artifact_id.0,
                entry.created_at.timestamp_millis(),
                entry.triggered_by.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Remove an entry after its artifact was confirmed deleted.
    pub fn remove(&self, fingerprint: &Fingerprint) -> Result<(), RegistryError> {
        let conn = self.conn.lock().expect("registry mutex poisoned");
        conn.execute(
            "DELETE FROM registry WHERE fingerprint = ?1",
            params![fingerprint.as_str()],
        )?;
        Ok(())
    }

    /// Every entry, for reconciliation.
    pub fn all(&self) -> Result<Vec<RegistryEntry>, RegistryError> {
        let conn = self.conn.lock().expect("registry mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT fingerprint, owner_folder, relative_path, artifact_id, created_at, triggered_by
             FROM registry ORDER BY owner_folder, relative_path",
        )?;
        let rows = stmt.query_map([], row_to_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn len(&self) -> Result<u64, RegistryError> {
        let conn = self.conn.lock().expect("registry mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM registry", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len()? == 0)
    }

    /// Operator bulk reset: forget everything, forcing full re-ingestion on
    /// the next pass. Returns the number of entries dropped.
    pub fn clear(&self) -> Result<u64, RegistryError> {
        let conn = self.conn.lock().expect("registry mutex poisoned");
        let dropped = conn.execute("DELETE FROM registry", [])?;
        info!(dropped, "registry cleared");
        Ok(dropped as u64)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<RegistryEntry> {
    let fingerprint: String = row.get(0)?;
    let owner_folder: String = row.get(1)?;
    let relative_path: String = row.get(2)?;
    let artifact_id: String = row.get(3)?;
    let created_millis: i64 = row.get(4)?;
    let triggered_by: String = row.get(5)?;

    Ok(RegistryEntry {
        fingerprint: Fingerprint(fingerprint),
        owner_folder,
        relative_path,
        artifact_id: ArtifactId(artifact_id),
        created_at: DateTime::from_timestamp_millis(created_millis).unwrap_or(DateTime::UNIX_EPOCH),
        triggered_by: Trigger::parse(&triggered_by).unwrap_or(Trigger::Scheduled),
    })
}
