//! Error types for query execution and record mapping.

use thiserror::Error;

/// Errors raised by [`Db`](crate::Db) and the record helpers.
///
/// Driver failures are carried unchanged. Queries that match nothing are not
/// errors: they come back as `None` or an empty collection.
#[derive(Debug, Error)]
pub enum DbError {
    /// The SQLite driver rejected or failed a statement.
    #[error("database driver error: {0}")]
    Driver(#[from] rusqlite::Error),

    /// No connection could be checked out of the pool.
    #[error("failed to acquire database connection: {0}")]
    Pool(#[from] r2d2::Error),

    /// A column name was not part of the result set or record layout.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// The record has not been inserted yet, so it has no primary key.
    #[error("{table} record has not been saved")]
    Unsaved {
        /// Table of the unsaved record.
        table: &'static str,
    },

    /// An update or delete addressed a row that does not exist.
    #[error("{table} row {id} not found")]
    NotFound {
        /// Table that was addressed.
        table: &'static str,
        /// Primary key that matched nothing.
        id: i64,
    },
}
