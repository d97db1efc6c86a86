//! The raw-SQL executor.
//!
//! [`Db`] wraps one pooled connection and exposes the fetch shapes the rest
//! of the data layer is written against: a cursor, the first row, the first
//! value, every row, rows grouped by their first column, and rows keyed by
//! column name. It adds no retry, caching or batching. Driver errors reach
//! the caller unchanged.

use std::collections::HashMap;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{ToSql, Value};
use rusqlite::Connection;
use serde::Deserialize;

use crate::dialect::{render_query, rewrite_placeholders, SQLITE_ENGINE};
use crate::error::DbError;
use crate::pool::DbPool;

/// One result row, column values in select order.
pub type SqlRow = Vec<Value>;

/// A result row keyed by caller-chosen names.
pub type NamedRow = HashMap<String, Value>;

/// Rows grouped by the value of their first column.
pub type IndexedRows = HashMap<IndexKey, Vec<SqlRow>>;

/// How the executor's connection handles transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionMode {
    /// Every statement commits on its own.
    #[default]
    Autocommit,
    /// Statements accumulate in an open transaction until committed.
    Managed,
}

/// Per-executor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Configured backend name; selects placeholder syntax.
    pub engine: String,
    /// Transaction handling for the executor's connection.
    pub transaction_mode: TransactionMode,
    /// Log every statement with its arguments before it runs.
    pub log_queries: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            engine: SQLITE_ENGINE.to_string(),
            transaction_mode: TransactionMode::Autocommit,
            log_queries: false,
        }
    }
}

/// Hashable form of a first-column value, used as the grouping key of
/// [`Db::get_indexed_rows`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Null,
    Integer(i64),
    /// Bit pattern of the float, so equal reals group together.
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<&Value> for IndexKey {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Integer(i) => Self::Integer(*i),
            Value::Real(r) => Self::Real(r.to_bits()),
            Value::Text(s) => Self::Text(s.clone()),
            Value::Blob(b) => Self::Blob(b.clone()),
        }
    }
}

impl From<i64> for IndexKey {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for IndexKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// The result of one executed statement.
///
/// Rows are read out of the driver when the statement runs; the cursor then
/// hands them out in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    columns: Vec<String>,
    rows: std::collections::VecDeque<SqlRow>,
    rows_affected: usize,
    last_insert_rowid: i64,
}

impl Cursor {
    /// Column names of the result set, empty for statements without one.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Takes the next row, or `None` when the cursor is exhausted.
    pub fn fetch_one(&mut self) -> Option<SqlRow> {
        self.rows.pop_front()
    }

    /// Takes every remaining row.
    pub fn fetch_all(&mut self) -> Vec<SqlRow> {
        self.rows.drain(..).collect()
    }

    /// Rows changed by an `INSERT`, `UPDATE` or `DELETE`.
    pub fn rows_affected(&self) -> usize {
        self.rows_affected
    }

    /// Rowid of the most recent successful insert on the connection.
    pub fn last_insert_rowid(&self) -> i64 {
        self.last_insert_rowid
    }

    /// Maps column names to their position in each row.
    pub fn column_index(&self) -> HashMap<String, usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect()
    }
}

/// Thin SQL executor bound to one pooled connection.
///
/// The connection is checked out on first use and held until the executor
/// is dropped. In [`TransactionMode::Managed`] an open transaction that was
/// never committed is rolled back on drop.
pub struct Db {
    pool: DbPool,
    settings: ExecutorSettings,
    conn: Option<PooledConnection<SqliteConnectionManager>>,
    /// A statement written through [`Db::execute`] since the last commit.
    pending_writes: bool,
}

impl Db {
    /// Creates an executor over `pool`. No connection is taken yet.
    pub fn new(pool: DbPool, settings: ExecutorSettings) -> Self {
        Self {
            pool,
            settings,
            conn: None,
            pending_writes: false,
        }
    }

    /// Whether the open managed transaction holds uncommitted writes.
    pub fn has_pending_writes(&self) -> bool {
        self.pending_writes
    }

    /// Settings this executor was built with.
    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Returns the executor's connection, checking one out if needed.
    ///
    /// In managed mode this also opens a transaction when none is active.
    ///
    /// # Errors
    ///
    /// `DbError::Pool` if no connection is available, `DbError::Driver` if
    /// the transaction cannot be started.
    pub fn connection(&mut self) -> Result<&Connection, DbError> {
        let managed = self.settings.transaction_mode == TransactionMode::Managed;
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let conn = self.pool.get()?;
                tracing::debug!("checked out database connection");
                conn
            }
        };
        let conn = self.conn.insert(conn);

        if managed && conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        Ok(&**conn)
    }

    /// Applies placeholder translation and logs the statement if enabled.
    pub(crate) fn prepare_sql<'q>(&self, query: &'q str, args: &[&dyn ToSql]) -> std::borrow::Cow<'q, str> {
        if self.settings.log_queries {
            tracing::info!(
                target: "nb_db::sql",
                sql = %render_query(query, args),
                "executing statement"
            );
        }
        rewrite_placeholders(query, &self.settings.engine)
    }

    /// Executes a parameterized statement and returns its cursor.
    ///
    /// # Errors
    ///
    /// Any failure from the driver (syntax, constraint, I/O) is returned as
    /// `DbError::Driver` without retry.
    pub fn execute(&mut self, query: &str, args: &[&dyn ToSql]) -> Result<Cursor, DbError> {
        let sql = self.prepare_sql(query, args);
        let managed = self.settings.transaction_mode == TransactionMode::Managed;
        let conn = self.connection()?;

        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let writes = !stmt.readonly();

        let mut cursor = Cursor {
            columns,
            ..Cursor::default()
        };

        if cursor.columns.is_empty() {
            cursor.rows_affected = stmt.execute(args)?;
        } else {
            let width = cursor.columns.len();
            let mut rows = stmt.query(args)?;
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(row.get::<_, Value>(i)?);
                }
                cursor.rows.push_back(values);
            }
            // RETURNING statements write and yield rows at the same time.
            if writes {
                cursor.rows_affected = usize::try_from(conn.changes()).unwrap_or(usize::MAX);
            }
        }
        cursor.last_insert_rowid = conn.last_insert_rowid();
        let in_transaction = !conn.is_autocommit();
        drop(stmt);

        if managed && writes && in_transaction {
            self.pending_writes = true;
        }
        Ok(cursor)
    }

    /// Returns the first row of the result, or `None` if there is none.
    pub fn get_row(&mut self, query: &str, args: &[&dyn ToSql]) -> Result<Option<SqlRow>, DbError> {
        Ok(self.execute(query, args)?.fetch_one())
    }

    /// Returns the first column of the first row, or `None` if there is no row.
    ///
    /// A row whose first column is SQL `NULL` yields `Some(Value::Null)`.
    pub fn get_val(&mut self, query: &str, args: &[&dyn ToSql]) -> Result<Option<Value>, DbError> {
        Ok(self
            .get_row(query, args)?
            .and_then(|row| row.into_iter().next()))
    }

    /// Returns every row of the result.
    pub fn get_rows(&mut self, query: &str, args: &[&dyn ToSql]) -> Result<Vec<SqlRow>, DbError> {
        Ok(self.execute(query, args)?.fetch_all())
    }

    /// Groups the result rows by their first column.
    ///
    /// Rows sharing a key keep the order in which the query returned them.
    /// A query with no rows yields an empty map.
    pub fn get_indexed_rows(
        &mut self,
        query: &str,
        args: &[&dyn ToSql],
    ) -> Result<IndexedRows, DbError> {
        Ok(index_rows(self.get_rows(query, args)?))
    }

    /// Converts the remaining rows of `cursor` into name-keyed maps.
    ///
    /// `names` pairs each output key with its source column; `None` means the
    /// column has the same name as the key. Converted rows are appended to
    /// `out`. The column index and the raw rows are returned for reuse.
    ///
    /// # Errors
    ///
    /// `DbError::UnknownColumn` if a source column is not in the result set.
    pub fn get_rows_by_name(
        cursor: &mut Cursor,
        names: &[(&str, Option<&str>)],
        out: &mut Vec<NamedRow>,
    ) -> Result<(HashMap<String, usize>, Vec<SqlRow>), DbError> {
        let index = cursor.column_index();

        let mut positions = Vec::with_capacity(names.len());
        for (key, column) in names {
            let column = column.unwrap_or(key);
            let pos = index
                .get(column)
                .copied()
                .ok_or_else(|| DbError::UnknownColumn(column.to_string()))?;
            positions.push((*key, pos));
        }

        let rows = cursor.fetch_all();
        out.reserve(rows.len());
        for row in &rows {
            out.push(
                positions
                    .iter()
                    .map(|(key, pos)| (key.to_string(), row[*pos].clone()))
                    .collect(),
            );
        }

        Ok((index, rows))
    }

    /// Executes a statement and commits it when the connection is managed.
    ///
    /// In autocommit mode the statement has already committed and nothing
    /// more happens. A failing statement returns before any commit.
    pub fn do_transaction(&mut self, query: &str, args: &[&dyn ToSql]) -> Result<Cursor, DbError> {
        let cursor = self.execute(query, args)?;
        self.commit()?;
        Ok(cursor)
    }

    /// Commits the open managed transaction, if any.
    pub fn commit(&mut self) -> Result<(), DbError> {
        self.finish_transaction("COMMIT")
    }

    /// Rolls back the open managed transaction, if any.
    pub fn rollback(&mut self) -> Result<(), DbError> {
        self.finish_transaction("ROLLBACK")
    }

    fn finish_transaction(&mut self, verb: &str) -> Result<(), DbError> {
        if self.settings.transaction_mode != TransactionMode::Managed {
            return Ok(());
        }
        if let Some(conn) = self.conn.as_ref() {
            if !conn.is_autocommit() {
                conn.execute_batch(verb)?;
                tracing::debug!(verb, "managed transaction finished");
            }
        }
        self.pending_writes = false;
        Ok(())
    }

    /// Runs `f` inside a savepoint.
    ///
    /// The savepoint is released when `f` succeeds and rolled back when it
    /// fails, so the statements of `f` apply together or not at all. Calls
    /// may nest.
    pub fn atomic<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.connection()?
            .execute_batch("SAVEPOINT nb_atomic")
            .map_err(DbError::from)?;

        match f(self) {
            Ok(value) => {
                self.connection()?
                    .execute_batch("RELEASE nb_atomic")
                    .map_err(DbError::from)?;
                Ok(value)
            }
            Err(err) => {
                let conn = self.connection()?;
                if let Err(rollback_err) =
                    conn.execute_batch("ROLLBACK TO nb_atomic; RELEASE nb_atomic")
                {
                    tracing::error!(error = %rollback_err, "failed to roll back savepoint");
                }
                Err(err)
            }
        }
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        let Some(conn) = self.conn.as_ref() else {
            return;
        };
        if !conn.is_autocommit() {
            if self.pending_writes {
                tracing::warn!("discarding uncommitted transaction");
            } else {
                tracing::debug!("closing read-only transaction");
            }
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %e, "rollback on release failed");
            }
        }
    }
}

/// Groups rows by first-column value, preserving row order within a group.
pub fn index_rows(rows: Vec<SqlRow>) -> IndexedRows {
    let mut indexed: IndexedRows = HashMap::new();
    for row in rows {
        let key = match row.first() {
            Some(value) => IndexKey::from(value),
            None => IndexKey::Null,
        };
        indexed.entry(key).or_default().push(row);
    }
    indexed
}
