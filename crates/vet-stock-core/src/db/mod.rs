//! Database layer for vet-stock.

mod schema;
mod items;
mod movements;

pub use schema::*;
#[allow(unused_imports)]
pub use items::*;
#[allow(unused_imports)]
pub use movements::*;

use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::EngineConfig;
use crate::stock::StockError;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error(transparent)]
    Stock(#[from] StockError),
}

pub type DbResult<T> = Result<T, DbError>;

/// Default time a writer waits for another writer's transaction to finish.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, DEFAULT_BUSY_TIMEOUT)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open the database described by the engine configuration.
    pub fn open_with_config(config: &EngineConfig) -> DbResult<Self> {
        let conn = match &config.database_path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        Self::from_connection(conn, config.busy_timeout)
    }

    fn from_connection(conn: Connection, busy_timeout: Duration) -> DbResult<Self> {
        conn.busy_timeout(busy_timeout)?;
        let db = Self { conn };
        db.initialize()?;
        debug!(?busy_timeout, "database ready");
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin a write transaction.
    ///
    /// `BEGIN IMMEDIATE` takes the database write lock up front, so an item's
    /// stock is read and written back without another writer interleaving.
    pub fn transaction(&mut self) -> DbResult<rusqlite::Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

/// Map SQLite constraint failures (CHECK, UNIQUE, FOREIGN KEY) to [`DbError::Constraint`].
pub(crate) fn constraint_context(err: rusqlite::Error, context: &str) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::Constraint(format!("{}: {}", context, err))
        }
        _ => DbError::Sqlite(err),
    }
}
