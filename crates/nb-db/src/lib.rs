//! Database layer for the NB annotation platform.
//!
//! Provides the raw-SQL executor [`Db`], SQLite connection pooling (via
//! `r2d2`), the embedded schema migrations, and the typed [`Record`] mapping
//! the entity crate builds on.
//!
//! # Design decisions
//!
//! - **Explicit connection handle**: a [`Db`] owns one pooled connection for
//!   its lifetime and returns it when dropped. There is no process-wide
//!   ambient connection.
//! - **Thin executor**: every call is one driver round-trip. No retry,
//!   statement cache or batching. Driver errors are surfaced as
//!   [`DbError::Driver`] untouched.
//! - **Typed rows at the boundary**: dynamic rows are available for ad-hoc
//!   queries, but entities are read through [`Record::from_row`] and foreign
//!   keys are typed [`Id`] values resolved on request.
//!
//! # Usage
//!
//! ```rust,ignore
//! use nb_db::{create_pool, Db, DbRuntimeSettings, ExecutorSettings};
//!
//! let pool = create_pool("nb.db", DbRuntimeSettings::default())?;
//! let mut db = Db::new(pool, ExecutorSettings::default());
//! let names = db.get_indexed_rows(
//!     "SELECT ensemble_id, user_id FROM base_membership WHERE admin = ?",
//!     &[&true],
//! )?;
//! ```

pub mod dialect;
mod error;
mod executor;
mod migrations;
mod pool;
pub mod record;

pub use dialect::{render_query, rewrite_placeholders, PYFORMAT_ENGINE, SQLITE_ENGINE};
pub use error::DbError;
pub use executor::{
    index_rows, Cursor, Db, ExecutorSettings, IndexKey, IndexedRows, NamedRow, SqlRow,
    TransactionMode,
};
pub use migrations::{applied_migrations, run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError, IN_MEMORY};
pub use record::{now, Id, Record};

/// Re-exported so dependents name driver types through one path.
pub use rusqlite;
