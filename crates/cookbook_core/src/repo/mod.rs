//! Persistence for the recipe aggregate and its catalog.
//!
//! # Responsibility
//! - `catalog_repo`: resolve shared catalog entities by natural key.
//! - `recipe_repo`: write a recipe aggregate as one unit.
//! - `assembler`: rebuild aggregates from normalized rows.
//!
//! # Invariants
//! - Writes validate their input before the first SQL mutation.
//! - Reads surface dangling references instead of dropping rows.

pub mod assembler;
pub mod catalog_repo;
pub mod error;
pub mod recipe_repo;

use crate::db::migrations::{current_user_version, latest_version};
use error::{RepoError, RepoResult};
use rusqlite::Connection;

const REQUIRED_TABLES: [&str; 7] = [
    "users",
    "recipes",
    "instructions",
    "aisles",
    "ingredients",
    "units",
    "recipe_ingredients",
];

/// Rejects connections that did not go through `db::open_db*`.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
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

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

pub(crate) fn int_to_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::Integrity(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}
