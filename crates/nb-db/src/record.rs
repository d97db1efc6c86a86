//! Typed record mapping.
//!
//! Each table is described by a [`Record`] implementation: its name, its
//! non-key columns, and the conversions between a driver row and the Rust
//! struct. Foreign keys are [`Id<T>`] values that name the referenced record
//! type and are resolved explicitly with [`Id::load`]. Nothing is loaded
//! lazily behind the caller's back.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DbError;
use crate::executor::Db;

/// Timestamp format used for every `*time` / `*_at` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time in [`TIMESTAMP_FORMAT`].
pub fn now() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Primary key of a `T` row.
pub struct Id<T> {
    raw: i64,
    _record: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    /// Wraps a raw rowid.
    pub const fn new(raw: i64) -> Self {
        Self {
            raw,
            _record: PhantomData,
        }
    }

    /// The raw rowid.
    pub const fn get(self) -> i64 {
        self.raw
    }
}

impl<T: Record> Id<T> {
    /// Fetches the referenced row, `None` if it no longer exists.
    pub fn load(self, db: &mut Db) -> Result<Option<T>, DbError> {
        find(db, self)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.raw)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(f)
    }
}

impl<T> ToSql for Id<T> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(Value::Integer(self.raw)))
    }
}

impl<T> FromSql for Id<T> {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Self::new)
    }
}

impl<T> From<Id<T>> for Value {
    fn from(id: Id<T>) -> Self {
        Value::Integer(id.raw)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.raw)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Self::new)
    }
}

/// A struct stored as one row of one table.
///
/// Rows are always selected as `id` followed by [`Record::COLUMNS`], so
/// [`Record::from_row`] may read columns by name or by that position.
pub trait Record: Sized {
    /// Table name.
    const TABLE: &'static str;

    /// Non-key columns, in the order [`Record::values`] produces them.
    const COLUMNS: &'static [&'static str];

    /// Primary key, `None` until inserted.
    fn id(&self) -> Option<Id<Self>>;

    /// Records the primary key assigned on insert.
    fn set_id(&mut self, id: Id<Self>);

    /// Primary key of a record that must already be stored.
    fn saved_id(&self) -> Result<Id<Self>, DbError> {
        self.id().ok_or(DbError::Unsaved { table: Self::TABLE })
    }

    /// Builds the record from a row selected with [`Record::select_sql`].
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;

    /// Values for [`Record::COLUMNS`], in order.
    fn values(&self) -> Vec<Value>;

    /// `SELECT id, <columns> FROM <table>`
    fn select_sql() -> String {
        format!("SELECT id, {} FROM {}", Self::COLUMNS.join(", "), Self::TABLE)
    }
}

fn check_column<T: Record>(column: &str) -> Result<(), DbError> {
    if column == "id" || T::COLUMNS.contains(&column) {
        Ok(())
    } else {
        Err(DbError::UnknownColumn(format!("{}.{column}", T::TABLE)))
    }
}

impl Db {
    /// Selects `T` rows; `clause` follows the `FROM` (e.g. `WHERE ... ORDER BY ...`).
    pub fn query_records<T: Record>(
        &mut self,
        clause: &str,
        args: &[&dyn ToSql],
    ) -> Result<Vec<T>, DbError> {
        let query = format!("{} {clause}", T::select_sql());
        let sql = self.prepare_sql(&query, args).into_owned();
        let conn = self.connection()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(args, T::from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Like [`Db::query_records`], keeping only the first match.
    pub fn query_record<T: Record>(
        &mut self,
        clause: &str,
        args: &[&dyn ToSql],
    ) -> Result<Option<T>, DbError> {
        Ok(self.query_records(clause, args)?.into_iter().next())
    }
}

/// Fetches the `T` with primary key `id`.
pub fn find<T: Record>(db: &mut Db, id: Id<T>) -> Result<Option<T>, DbError> {
    db.query_record("WHERE id = ?", &[&id])
}

/// Fetches every `T` whose `column` equals `value`, in key order.
///
/// # Errors
///
/// `DbError::UnknownColumn` if `column` is not a column of `T`.
pub fn filter<T: Record>(db: &mut Db, column: &str, value: &dyn ToSql) -> Result<Vec<T>, DbError> {
    check_column::<T>(column)?;
    db.query_records(&format!("WHERE {column} = ? ORDER BY id"), &[value])
}

/// Fetches every `T`, in key order.
pub fn all<T: Record>(db: &mut Db) -> Result<Vec<T>, DbError> {
    db.query_records("ORDER BY id", &[])
}

/// Number of `T` rows.
pub fn count<T: Record>(db: &mut Db) -> Result<i64, DbError> {
    let val = db.get_val(&format!("SELECT COUNT(*) FROM {}", T::TABLE), &[])?;
    Ok(match val {
        Some(Value::Integer(n)) => n,
        _ => 0,
    })
}

fn as_args(values: &[Value]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

/// Inserts `record` and stores the new primary key on it.
pub fn insert<T: Record>(db: &mut Db, record: &mut T) -> Result<Id<T>, DbError> {
    let placeholders = vec!["?"; T::COLUMNS.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        T::TABLE,
        T::COLUMNS.join(", ")
    );
    let values = record.values();
    let cursor = db.execute(&sql, &as_args(&values))?;

    let id = Id::new(cursor.last_insert_rowid());
    record.set_id(id);
    tracing::debug!(table = T::TABLE, id = id.get(), "inserted record");
    Ok(id)
}

/// Writes every column of a saved `record` back to its row.
///
/// # Errors
///
/// `DbError::Unsaved` if the record was never inserted, `DbError::NotFound`
/// if its row is gone.
pub fn update<T: Record>(db: &mut Db, record: &T) -> Result<(), DbError> {
    let id = record.saved_id()?;
    let assignments = T::COLUMNS
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("UPDATE {} SET {assignments} WHERE id = ?", T::TABLE);

    let mut values = record.values();
    values.push(id.into());
    let cursor = db.execute(&sql, &as_args(&values))?;

    if cursor.rows_affected() == 0 {
        return Err(DbError::NotFound {
            table: T::TABLE,
            id: id.get(),
        });
    }
    Ok(())
}

/// Inserts an unsaved record or updates a saved one.
pub fn save<T: Record>(db: &mut Db, record: &mut T) -> Result<Id<T>, DbError> {
    match record.id() {
        Some(id) => update(db, record).map(|()| id),
        None => insert(db, record),
    }
}

/// Deletes the `T` row with primary key `id`.
///
/// Dependent rows follow the foreign key rules of the schema.
pub fn delete<T: Record>(db: &mut Db, id: Id<T>) -> Result<(), DbError> {
    let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
    let cursor = db.execute(&sql, &[&id])?;
    if cursor.rows_affected() == 0 {
        return Err(DbError::NotFound {
            table: T::TABLE,
            id: id.get(),
        });
    }
    tracing::debug!(table = T::TABLE, id = id.get(), "deleted record");
    Ok(())
}
