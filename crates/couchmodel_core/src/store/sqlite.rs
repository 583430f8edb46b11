//! SQLite-backed document store.
//!
//! # Invariants
//! - Design documents are stored as their full JSON body; `signature` and
//!   `timestamp` columns mirror the body for inspection.
//! - Reads reject bodies that no longer parse instead of masking them.

use super::{DocumentStore, StoreError, StoreResult};
use crate::db::{open_db, open_db_in_memory};
use crate::design::DesignDocument;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Document store persisted in a local SQLite file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (and migrates) the store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps a connection that already went through `open_db`.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for SqliteStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM documents WHERE key = ?1;",
                [key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.conn().execute(
            "INSERT INTO documents (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }

    fn add(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let inserted = self.conn().execute(
            "INSERT INTO documents (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO NOTHING;",
            params![key, value],
        )?;
        if inserted == 0 {
            return Err(StoreError::KeyExists(key.to_string()));
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        let changed = self
            .conn()
            .execute("DELETE FROM documents WHERE key = ?1;", [key])?;
        if changed == 0 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(())
    }

    fn design_document(&self, id: &str) -> StoreResult<Option<DesignDocument>> {
        let body = self
            .conn()
            .query_row(
                "SELECT body FROM design_documents WHERE id = ?1;",
                [id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match body {
            Some(body) => serde_json::from_str(&body).map(Some).map_err(|err| {
                StoreError::InvalidData(format!(
                    "design document `{id}` has an unreadable body: {err}"
                ))
            }),
            None => Ok(None),
        }
    }

    fn save_design_document(&self, doc: &DesignDocument) -> StoreResult<()> {
        let body = serde_json::to_string(doc).map_err(|err| {
            StoreError::InvalidData(format!(
                "design document `{}` cannot be encoded: {err}",
                doc.id
            ))
        })?;
        self.conn().execute(
            "INSERT INTO design_documents (id, body, signature, timestamp)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                body = excluded.body,
                signature = excluded.signature,
                timestamp = excluded.timestamp,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![doc.id, body, doc.signature, doc.timestamp],
        )?;
        Ok(())
    }
}
