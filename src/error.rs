use thiserror::Error;

use crate::db::DbError;

/// Failures raised by the import pipeline.
///
/// Configuration and input errors happen before any connection is opened.
/// Every database-side variant is raised at the loader boundary after the
/// transaction has been rolled back.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("input error: {0}")]
    Input(String),

    #[error("headers '{first}' and '{second}' both normalize to column '{normalized}'")]
    DuplicateColumn {
        first: String,
        second: String,
        normalized: String,
    },

    #[error("header '{header}' (column {position}) normalizes to an empty identifier")]
    EmptyIdentifier { header: String, position: usize },

    #[error("creating table {table} failed: {source}")]
    SchemaCreation {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("deleting rows from {table} failed: {source}")]
    Delete {
        table: String,
        #[source]
        source: DbError,
    },

    #[error("row {row} could not be inserted: {source}")]
    RowLoad {
        row: usize,
        #[source]
        source: DbError,
    },

    #[error("batch insert of {rows} row(s) failed: {source}")]
    BatchLoad {
        rows: usize,
        #[source]
        source: DbError,
    },

    #[error("transaction control failed: {0}")]
    Transaction(#[source] DbError),
}

pub type ImportResult<T> = std::result::Result<T, ImportError>;
