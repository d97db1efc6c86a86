//! Declarative helpers for records and integer choice columns.

/// Column name for a record field: the field name unless renamed with `as`.
macro_rules! column_name {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident, $column:literal) => {
        $column
    };
}

/// Declares a record struct and its [`nb_db::Record`] mapping.
///
/// Every record gets `id: Option<Id<Self>>` ahead of the listed fields.
/// A field written `kind as "type"` is stored in the `type` column.
macro_rules! record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident in $table:literal {
            $(
                $(#[$fmeta:meta])*
                $field:ident $(as $column:literal)? : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        pub struct $name {
            /// Primary key, `None` until inserted.
            pub id: Option<nb_db::Id<$name>>,
            $(
                $(#[$fmeta])*
                pub $field: $ty,
            )*
        }

        impl nb_db::Record for $name {
            const TABLE: &'static str = $table;
            const COLUMNS: &'static [&'static str] = &[$(column_name!($field $(, $column)?)),*];

            fn id(&self) -> Option<nb_db::Id<Self>> {
                self.id
            }

            fn set_id(&mut self, id: nb_db::Id<Self>) {
                self.id = Some(id);
            }

            fn from_row(row: &nb_db::rusqlite::Row<'_>) -> nb_db::rusqlite::Result<Self> {
                Ok(Self {
                    id: Some(row.get("id")?),
                    $($field: row.get(column_name!($field $(, $column)?))?,)*
                })
            }

            fn values(&self) -> Vec<nb_db::rusqlite::types::Value> {
                vec![$(nb_db::rusqlite::types::Value::from(self.$field.clone())),*]
            }
        }
    };
}

/// Declares an enum stored as an integer code with a human label.
macro_rules! choices {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $code:literal => $label:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[repr(i64)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant = $code,
            )+
        }

        impl $name {
            /// Every variant, in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Integer stored in the database.
            pub fn code(self) -> i64 {
                self as i64
            }

            /// Variant for a stored code, `None` for unknown codes.
            pub fn from_code(code: i64) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Human-readable label.
            pub fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl From<$name> for nb_db::rusqlite::types::Value {
            fn from(choice: $name) -> Self {
                nb_db::rusqlite::types::Value::Integer(choice.code())
            }
        }

        impl nb_db::rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> nb_db::rusqlite::Result<nb_db::rusqlite::types::ToSqlOutput<'_>> {
                Ok(nb_db::rusqlite::types::ToSqlOutput::from(self.code()))
            }
        }

        impl nb_db::rusqlite::types::FromSql for $name {
            fn column_result(
                value: nb_db::rusqlite::types::ValueRef<'_>,
            ) -> nb_db::rusqlite::types::FromSqlResult<Self> {
                let code = i64::column_result(value)?;
                Self::from_code(code).ok_or(nb_db::rusqlite::types::FromSqlError::OutOfRange(code))
            }
        }
    };
}
