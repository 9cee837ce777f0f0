use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::debug;

use super::{record_id, RecordKind, SaveMode, Store};
use crate::error::StoreError;

/// One JSON body per row, keyed by `(kind, id)`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        init_schema(&conn)?;
        debug!("Opened store at {}", path.display());
        Ok(Self { conn: Mutex::new(conn) })
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            seq        INTEGER PRIMARY KEY AUTOINCREMENT,
            kind       TEXT NOT NULL,
            id         TEXT NOT NULL,
            body       TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(kind, id)
        );
        CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind);
        ",
    )?;
    Ok(())
}

impl Store for SqliteStore {
    fn get_all(&self, kind: RecordKind) -> Result<Vec<Value>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT body FROM records WHERE kind = ?1 ORDER BY seq")?;
        let bodies = stmt
            .query_map(params![kind.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StoreError::from))
            .collect()
    }

    fn save_all(&self, kind: RecordKind, records: &[Value], mode: SaveMode) -> Result<usize, StoreError> {
        let rows = records
            .iter()
            .map(|r| Ok((record_id(kind, r)?, serde_json::to_string(r)?)))
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction()?;
        if mode == SaveMode::Replace {
            tx.execute("DELETE FROM records WHERE kind = ?1", params![kind.as_str()])?;
        }
        {
            let mut upsert = tx.prepare(
                "INSERT INTO records (kind, id, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT(kind, id) DO UPDATE SET body = excluded.body, updated_at = datetime('now')",
            )?;
            for (id, body) in &rows {
                upsert.execute(params![kind.as_str(), id, body])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }
}
