//! Document store boundary.
//!
//! # Responsibility
//! - Define the key/blob and design-document operations the core consumes.
//! - Host in-memory and SQLite-backed implementations.
//!
//! # Invariants
//! - Store errors are surfaced unchanged; nothing here retries.
//! - `save_design_document` is a full replace of the stored copy.

use crate::db::DbError;
use crate::design::DesignDocument;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store transport and semantic errors.
#[derive(Debug)]
pub enum StoreError {
    /// Backend cannot be reached.
    Unavailable(String),
    /// Backend did not answer in time.
    Timeout(String),
    /// Key does not exist.
    NotFound(String),
    /// Insert-only write hit an existing key.
    KeyExists(String),
    Db(DbError),
    InvalidData(String),
}

impl StoreError {
    /// Returns whether this error is infrastructure trouble rather than a
    /// logical failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
            Self::Timeout(message) => write!(f, "store timeout: {message}"),
            Self::NotFound(key) => write!(f, "key not found: {key}"),
            Self::KeyExists(key) => write!(f, "key already exists: {key}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Abstract document store consumed by records and the design synchronizer.
pub trait DocumentStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
    /// Unconditional upsert.
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;
    /// Insert-only write; fails with `KeyExists` when `key` is present.
    fn add(&self, key: &str, value: &[u8]) -> StoreResult<()>;
    /// Removes `key`; fails with `NotFound` when absent.
    fn delete(&self, key: &str) -> StoreResult<()>;
    fn design_document(&self, id: &str) -> StoreResult<Option<DesignDocument>>;
    fn save_design_document(&self, doc: &DesignDocument) -> StoreResult<()>;
}
