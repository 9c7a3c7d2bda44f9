//! Per-row extraction strategies driven by the update pipeline.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, FromRow, Row};
use thiserror::Error;

pub mod characters;
pub mod credits;

pub use characters::{CharacterExtractor, CharacterRow};
pub use credits::{CreditExtractor, CreditRow};

/// What one successful extraction produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extracted {
    pub row_id: i64,
    pub entities: usize,
}

/// Failure while handling one row.
///
/// `Decode` and `Persist` are row-level and never stop a run. `Connection`
/// means the database itself went away; the pipeline stops on it.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("row {row_id:?} could not be decoded")]
    Decode {
        row_id: Option<i64>,
        #[source]
        source: sqlx::Error,
    },
    #[error("persisting entities for row {row_id} failed")]
    Persist {
        row_id: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("database unreachable while persisting row {row_id}")]
    Connection {
        row_id: i64,
        #[source]
        source: sqlx::Error,
    },
}

impl ExtractError {
    /// Classify a write failure for `row_id`.
    pub fn persisting(row_id: i64, source: sqlx::Error) -> Self {
        if is_connection_error(&source) {
            ExtractError::Connection { row_id, source }
        } else {
            ExtractError::Persist { row_id, source }
        }
    }

    /// Identifier of the failing row, when it could be read.
    pub fn row_id(&self) -> Option<i64> {
        match self {
            ExtractError::Decode { row_id, .. } => *row_id,
            ExtractError::Persist { row_id, .. } | ExtractError::Connection { row_id, .. } => {
                Some(*row_id)
            }
        }
    }
}

/// Parses one source row and persists what it finds.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Fixed column contract of the rows this extractor consumes.
    type Row: for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin;

    /// Label used in progress output ("story", ...).
    fn item_label(&self) -> &str;

    async fn extract_and_persist(&self, row: &Self::Row) -> Result<Extracted, ExtractError>;
}

/// Errors that mean the pool or the socket is gone, not that the row is bad.
pub fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

/// Integer column of any width (`int2`, `int4`, `int8`), widened to `i64`.
pub fn int_column(row: &PgRow, column: &str) -> Result<Option<i64>, sqlx::Error> {
    widen(row.try_get::<Option<i64>, _>(column), || {
        widen(
            row.try_get::<Option<i32>, _>(column).map(|v| v.map(i64::from)),
            || row.try_get::<Option<i16>, _>(column).map(|v| v.map(i64::from)),
        )
    })
}

/// The mandatory `id` column.
pub fn row_id(row: &PgRow) -> Result<i64, sqlx::Error> {
    int_column(row, "id")?.ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "id".into(),
        source: "row id is NULL".into(),
    })
}

/// Optional column: absent from the result set reads as `None`.
pub fn missing_as_none<T>(res: Result<Option<T>, sqlx::Error>) -> Result<Option<T>, sqlx::Error> {
    match res {
        Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
        other => other,
    }
}

/// Retry with a narrower type only when the wider one did not match.
fn widen(
    wide: Result<Option<i64>, sqlx::Error>,
    narrow: impl FnOnce() -> Result<Option<i64>, sqlx::Error>,
) -> Result<Option<i64>, sqlx::Error> {
    match wide {
        Err(sqlx::Error::ColumnDecode { .. }) => narrow(),
        other => other,
    }
}
