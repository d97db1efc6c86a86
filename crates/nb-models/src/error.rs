//! Error types for entity operations.

use nb_db::DbError;

use crate::choices::RatingStatus;

/// Errors raised by the domain helpers on records.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A database operation failed.
    #[error(transparent)]
    Database(#[from] DbError),

    /// A reply rating was asked to move back to an earlier status.
    #[error("reply rating cannot go from {from} back to {to}")]
    StatusRegression {
        from: RatingStatus,
        to: RatingStatus,
    },

    /// A grade exceeded the point scale of its label category.
    #[error("grade {grade} is outside 0..={pointscale}")]
    GradeOutOfRange { grade: i64, pointscale: i64 },

    /// The ensemble does not accept sources added by URL.
    #[error("ensemble {ensemble} does not allow on-demand sources")]
    OnDemandDisabled { ensemble: i64 },

    /// A referenced row does not exist.
    #[error("{table} row {id} not found")]
    Missing { table: &'static str, id: i64 },
}
