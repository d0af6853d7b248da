//! Database seam used by the loader.
//!
//! [`Database`] is the minimal surface the pipeline needs: plain statements
//! and parameterized inserts. [`Transaction`] wraps a connection for the
//! duration of one run and rolls back on drop unless it was committed.

pub mod postgres;

use log::{debug, warn};
use thiserror::Error;

use crate::{coerce::Row, statements::InsertStatement};

pub use self::postgres::{DbConfig, PgDatabase};

#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[error("database runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("{0}")]
    Rejected(String),
}

pub trait Database {
    /// Runs a statement without parameters.
    fn execute(&mut self, sql: &str) -> Result<(), DbError>;

    /// Runs a parameterized insert covering `rows`, returning the affected row count.
    fn insert(&mut self, statement: &InsertStatement, rows: &[Row]) -> Result<u64, DbError>;
}

/// An open transaction. Dropping it without [`Transaction::commit`] issues `ROLLBACK`.
pub struct Transaction<'a, D: Database + ?Sized> {
    db: &'a mut D,
    open: bool,
}

impl<'a, D: Database + ?Sized> Transaction<'a, D> {
    pub fn begin(db: &'a mut D) -> Result<Self, DbError> {
        db.execute("BEGIN")?;
        debug!("Transaction opened");
        Ok(Self { db, open: true })
    }

    pub fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        self.db.execute(sql)
    }

    pub fn insert(&mut self, statement: &InsertStatement, rows: &[Row]) -> Result<u64, DbError> {
        self.db.insert(statement, rows)
    }

    pub fn commit(mut self) -> Result<(), DbError> {
        self.open = false;
        self.db.execute("COMMIT")
    }

    pub fn rollback(mut self) -> Result<(), DbError> {
        self.open = false;
        self.db.execute("ROLLBACK")
    }
}

impl<D: Database + ?Sized> Drop for Transaction<'_, D> {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            if let Err(err) = self.db.execute("ROLLBACK") {
                warn!("Rollback on drop failed: {err}");
            }
        }
    }
}
