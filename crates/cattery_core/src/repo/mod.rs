//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for cats, toys and events.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Cat::validate()` before persistence.
//! - Repository APIs return semantic errors (`CatNotFound`) in addition to DB
//!   transport errors.
//! - Only the action store writes events.

use crate::db::migrations::latest_version;
use rusqlite::Connection;

pub mod action_store;
pub mod cat_repo;
pub mod event_repo;
pub mod toy_repo;

use cat_repo::{RepoError, RepoResult};

const REQUIRED_TABLES: &[&str] = &[
    "cats",
    "toys",
    "cat_favorite_toys",
    "cat_hated_toys",
    "events",
];

/// Rejects connections that did not go through `open_db*` bootstrap.
pub(crate) fn ensure_store_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
