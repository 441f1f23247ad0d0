//! SQLite-backed record store.

mod catalog;
mod queries;
pub mod schema;

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use tracing::warn;

use super::repository::{RegistrarRepository, RegistrarStore, RepositoryError};

pub use catalog::{
    NewProgram, NewProspectusEntry, NewSection, NewStudent, NewSubject, NewTerm,
};
pub use queries::SqliteRepository;

/// Shared SQLite connection; writes go through `IMMEDIATE` transactions.
#[derive(Clone)]
pub struct SqliteRegistrarStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistrarStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &str) -> Result<Self, RepositoryError> {
        let conn = schema::open_connection(path)?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self, RepositoryError> {
        Self::open(":memory:")
    }

    pub fn from_connection(conn: Connection) -> Result<Self, RepositoryError> {
        schema::configure_connection(&conn)?;
        schema::apply(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|err| RepositoryError::Unavailable(format!("connection lock poisoned: {err}")))
    }
}

impl RegistrarStore for SqliteRegistrarStore {
    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RegistrarRepository) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let conn = self.connection()?;
        let repository = SqliteRepository::new(&conn);
        work(&repository)
    }

    fn atomic<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RegistrarRepository) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        match work(&SqliteRepository::new(&tx)) {
            Ok(value) => {
                tx.commit().map_err(RepositoryError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message) => match failure.code {
                ErrorCode::ConstraintViolation
                    if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
                {
                    RepositoryError::Conflict(message.clone().unwrap_or_else(|| err.to_string()))
                }
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen => {
                    RepositoryError::Unavailable(err.to_string())
                }
                _ => RepositoryError::Query(err.to_string()),
            },
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::InvalidColumnType(..) => RepositoryError::InvalidData(err.to_string()),
            _ => RepositoryError::Query(err.to_string()),
        }
    }
}
