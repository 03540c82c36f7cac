//! Record store contract and backends.
//!
//! # Responsibility
//! - Define the generic, schemaless `Store` contract used by the model.
//! - Provide an in-memory backend and a durable SQLite backend.
//!
//! # Invariants
//! - Ids are assigned by the store, unique, and never reused.
//! - `find_all` preserves insertion order.
//! - Every call is complete when it returns: a later read in the same thread
//!   observes an earlier write.
//! - "Not found" is never an error; only backend failures are.

use crate::db::DbError;
use crate::model::record::{Fields, Record, RecordId};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory_store;
pub mod sqlite_store;

pub type StoreResult<T> = Result<T, StoreError>;

/// Backend failure raised by a store.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    /// Persisted data could not be decoded.
    InvalidData(String),
    /// Required table or column is absent from the connected database.
    MissingSchema(String),
    /// A thread panicked while holding the store lock.
    LockPoisoned(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
            Self::MissingSchema(what) => write!(f, "store schema is missing {what}"),
            Self::LockPoisoned(collection) => {
                write!(f, "store lock poisoned for collection `{collection}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Ordered collection of flat records identified by store-assigned ids.
pub trait Store: Send + Sync {
    /// Returns all records whose fields equal every predicate entry.
    fn find(&self, predicate: &Fields) -> StoreResult<Vec<Record>>;
    /// Returns the record with this id, if any.
    fn find_by_id(&self, id: RecordId) -> StoreResult<Option<Record>>;
    /// Returns every record in insertion order.
    fn find_all(&self) -> StoreResult<Vec<Record>>;
    /// Without `id`: inserts `data` under a fresh id and returns the new
    /// record alone. With `id`: merges `data` into that record and returns the
    /// whole collection, unchanged when no record has that id.
    fn save(&self, data: Fields, id: Option<RecordId>) -> StoreResult<Vec<Record>>;
    /// Deletes the record with this id and returns the remaining collection.
    fn remove(&self, id: RecordId) -> StoreResult<Vec<Record>>;
    /// Deletes every record and returns the (empty) collection.
    fn drop_all(&self) -> StoreResult<Vec<Record>>;
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn find(&self, predicate: &Fields) -> StoreResult<Vec<Record>> {
        (**self).find(predicate)
    }

    fn find_by_id(&self, id: RecordId) -> StoreResult<Option<Record>> {
        (**self).find_by_id(id)
    }

    fn find_all(&self) -> StoreResult<Vec<Record>> {
        (**self).find_all()
    }

    fn save(&self, data: Fields, id: Option<RecordId>) -> StoreResult<Vec<Record>> {
        (**self).save(data, id)
    }

    fn remove(&self, id: RecordId) -> StoreResult<Vec<Record>> {
        (**self).remove(id)
    }

    fn drop_all(&self) -> StoreResult<Vec<Record>> {
        (**self).drop_all()
    }
}
