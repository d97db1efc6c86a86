//! Embedded schema migrations.
//!
//! The SQL files under `migrations/` are compiled into the binary and applied
//! in order. Applied names are recorded in `_nb_migrations`; a migration that
//! is already recorded is skipped.

use rusqlite::Connection;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. New migrations are appended here.
const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "001_accounts",
        sql: include_str!("migrations/001_accounts.sql"),
    },
    Migration {
        name: "002_sources",
        sql: include_str!("migrations/002_sources.sql"),
    },
    Migration {
        name: "003_annotations",
        sql: include_str!("migrations/003_annotations.sql"),
    },
    Migration {
        name: "004_activity",
        sql: include_str!("migrations/004_activity.sql"),
    },
    Migration {
        name: "005_settings",
        sql: include_str!("migrations/005_settings.sql"),
    },
    Migration {
        name: "006_grading",
        sql: include_str!("migrations/006_grading.sql"),
    },
];

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A statement of the named migration failed; its changes were rolled back.
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    /// The tracking table could not be read.
    #[error("failed to check migration state: {0}")]
    StateQuery(rusqlite::Error),
}

/// Applies every pending migration and returns how many ran.
///
/// # Errors
///
/// Returns `MigrationError` if a migration fails or the tracking table cannot
/// be queried. Migrations applied before the failure stay applied.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply(conn, MIGRATIONS)
}

/// Names of the migrations recorded as applied, in application order.
pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>, MigrationError> {
    ensure_tracking_table(conn)?;
    let mut stmt = conn
        .prepare("SELECT name FROM _nb_migrations ORDER BY id")
        .map_err(MigrationError::StateQuery)?;
    let names = stmt
        .query_map([], |row| row.get(0))
        .map_err(MigrationError::StateQuery)?
        .collect::<Result<Vec<String>, _>>()
        .map_err(MigrationError::StateQuery)?;
    Ok(names)
}

fn ensure_tracking_table(conn: &Connection) -> Result<(), MigrationError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _nb_migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(|source| MigrationError::ExecutionFailed {
        name: "_nb_migrations".to_string(),
        source,
    })
}

fn apply(conn: &Connection, migrations: &[Migration]) -> Result<usize, MigrationError> {
    ensure_tracking_table(conn)?;

    let mut applied = 0;
    for migration in migrations {
        let done: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _nb_migrations WHERE name = ?1",
                [migration.name],
                |row| row.get(0),
            )
            .map_err(MigrationError::StateQuery)?;
        if done {
            tracing::debug!(migration = migration.name, "already applied");
            continue;
        }

        tracing::info!(migration = migration.name, "applying migration");
        let failed = |source: rusqlite::Error| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source,
        };

        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _nb_migrations (name) VALUES (?1)",
            [migration.name],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;

        applied += 1;
    }

    Ok(applied)
}
