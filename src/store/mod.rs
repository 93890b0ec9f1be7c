// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Append-only SQLite store for node snapshots and job observations.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

/// Predicate construction for report queries.
pub mod filter;
/// Read-side queries and aggregation.
pub mod read;
/// Schema creation and migration of older databases.
pub mod schema;
/// Insertion, including the duplicate-suppression gate.
pub mod write;

pub use filter::{JobFilter, Period, Predicate};

/// Errors returned by the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("could not create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not encode attributes of {name}: {source}")]
    Encode {
        name: String,
        source: serde_json::Error,
    },
}

/// Per-(user, machine) job counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobAggregate {
    pub user: String,
    pub machine: String,
    pub count: u64,
    /// Latest parseable start time in the group
    pub last_run: Option<NaiveDateTime>,
}

/// SQLite-backed history of polls
pub struct Store {
    connection: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the database file, migrating older layouts.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let connection = Connection::open(path)?;
        connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )?;
        schema::apply_schema(&connection)?;
        tracing::debug!(path = %path.display(), "opened job database");

        Ok(Self {
            connection,
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory()?;
        schema::apply_schema(&connection)?;
        Ok(Self {
            connection,
            path: None,
        })
    }

    /// Backing file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("var/lib/pbs_monitor/pbs_stats.db");
        let store = Store::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(store.path(), Some(db_path.as_path()));
    }

    #[test]
    fn test_open_applies_wal() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("stats.db");
        let _store = Store::open(&db_path).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");
    }

    #[test]
    fn test_in_memory_has_no_path() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.path().is_none());
        assert_eq!(store.count_jobs().unwrap(), 0);
        assert_eq!(store.count_nodes().unwrap(), 0);
    }
}
