//! Store schema steps and the runner that brings a file up to date.
//!
//! # Invariants
//! - Step versions are contiguous from 1; `PRAGMA user_version` holds the
//!   last applied step.
//! - Each step commits on its own, so a failure leaves the file at the
//!   previous version.
//! - A file at the latest version must hold every table the store reads.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension};

struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "documents",
        sql: include_str!("0001_documents.sql"),
    },
    SchemaStep {
        version: 2,
        name: "design_documents",
        sql: include_str!("0002_design_documents.sql"),
    },
];

/// Tables `SqliteStore` reads and writes.
pub const STORE_TABLES: [&str; 2] = ["documents", "design_documents"];

/// Returns the store schema version this build writes.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |step| step.version)
}

/// Reads the store schema version recorded in the file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}

/// Applies pending steps, then checks the store tables are present.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the file was written by a newer build.
/// - `MissingTable` when the recorded version claims a table that is gone.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    for step in STEPS.iter().filter(|step| step.version > from) {
        let tx = conn.transaction()?;
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        tx.commit()?;
        debug!(
            "event=db_migrate module=db status=step version={} name={}",
            step.version, step.name
        );
    }
    if from < latest {
        info!("event=db_migrate module=db status=ok from_version={from} to_version={latest}");
    }

    verify_store_tables(conn)
}

fn verify_store_tables(conn: &Connection) -> DbResult<()> {
    for table in STORE_TABLES {
        let found = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1;",
                [table],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        if found.is_none() {
            return Err(DbError::MissingTable(table));
        }
    }
    Ok(())
}
