use std::sync::{Arc, Mutex};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::storage::{StorageBackend, StorageError, Table};

/// A typed document persisted in one [`Table`].
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: Table;

    fn key(&self) -> String;
}

/// Zero-padded key for numbered documents so that key order is numeric order.
pub fn number_key(number: u64) -> String {
    format!("{:010}", number)
}

fn decode<T: Record>(value: Value) -> Result<T, StorageError> {
    Ok(serde_json::from_value(value)?)
}

fn decode_all<T: Record>(rows: Vec<(String, Value)>) -> Result<Vec<T>, StorageError> {
    rows.into_iter().map(|(_, v)| decode(v)).collect()
}

/// Typed reads, shared by [`Store`] and [`Tx`] so query helpers work both
/// inside and outside a unit of work.
pub trait Reader {
    fn backend_ref(&self) -> &dyn StorageBackend;

    fn get<T: Record>(&self, key: &str) -> Result<Option<T>, StorageError> {
        self.backend_ref().get(T::TABLE, key)?.map(decode).transpose()
    }

    fn list<T: Record>(&self) -> Result<Vec<T>, StorageError> {
        decode_all(self.backend_ref().scan(T::TABLE)?)
    }

    fn list_prefix<T: Record>(&self, prefix: &str) -> Result<Vec<T>, StorageError> {
        decode_all(self.backend_ref().scan_prefix(T::TABLE, prefix)?)
    }

    fn exists<T: Record>(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.backend_ref().get(T::TABLE, key)?.is_some())
    }

    fn count<T: Record>(&self) -> Result<usize, StorageError> {
        self.backend_ref().count(T::TABLE)
    }
}

/// Typed access to a [`StorageBackend`].
///
/// Reads go straight to the backend. Writes are only reachable through the
/// [`Tx`] handed to [`Store::transaction`], which holds the writer lock for
/// the whole unit of work and rolls the backend back when the closure fails.
pub struct Store {
    backend: Arc<dyn StorageBackend>,
    write_lock: Mutex<()>,
}

impl Store {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            write_lock: Mutex::new(()),
        }
    }

    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Tx<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let _guard = self.write_lock.lock().map_err(|_| StorageError::LockPoisoned)?;
        let tx_id = self.backend.begin_transaction()?;
        let tx = Tx {
            backend: self.backend.as_ref(),
        };

        match f(&tx) {
            Ok(value) => {
                self.backend.commit_transaction(tx_id)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.backend.rollback_transaction(tx_id) {
                    tracing::error!(tx_id, error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

impl Reader for Store {
    fn backend_ref(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }
}

/// Handle to an open unit of work.
pub struct Tx<'a> {
    backend: &'a dyn StorageBackend,
}

impl Tx<'_> {
    pub fn put<T: Record>(&self, record: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(record)?;
        self.backend.put(T::TABLE, &record.key(), &value)
    }

    pub fn delete<T: Record>(&self, key: &str) -> Result<bool, StorageError> {
        self.backend.delete(T::TABLE, key)
    }

    /// Next value of a named document sequence. Rolled back with the transaction.
    pub fn next_number(&self, sequence: &str) -> Result<u64, StorageError> {
        self.backend.next_sequence(sequence)
    }
}

impl Reader for Tx<'_> {
    fn backend_ref(&self) -> &dyn StorageBackend {
        self.backend
    }
}
