//! In-memory storage backend for ACAS.
//!
//! Tables are ordered maps behind a single `RwLock`. A transaction takes a
//! snapshot of every table and sequence; rollback restores it.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use acas_core::{StorageBackend, StorageError, Table, TransactionId};
use serde_json::Value;

#[derive(Clone, Default)]
struct Tables {
    rows: BTreeMap<Table, BTreeMap<String, Value>>,
    sequences: HashMap<String, u64>,
}

pub struct InMemoryStorage {
    tables: RwLock<Tables>,
    tx_counter: AtomicU64,
    snapshots: RwLock<HashMap<TransactionId, Tables>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            tx_counter: AtomicU64::new(1),
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables.write().map_err(|_| StorageError::LockPoisoned)
    }
}

impl StorageBackend for InMemoryStorage {
    fn get(&self, table: Table, key: &str) -> Result<Option<Value>, StorageError> {
        let tables = self.read()?;
        Ok(tables.rows.get(&table).and_then(|rows| rows.get(key)).cloned())
    }

    fn put(&self, table: Table, key: &str, value: &Value) -> Result<(), StorageError> {
        let mut tables = self.write()?;
        tables
            .rows
            .entry(table)
            .or_default()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, table: Table, key: &str) -> Result<bool, StorageError> {
        let mut tables = self.write()?;
        Ok(tables
            .rows
            .get_mut(&table)
            .map(|rows| rows.remove(key).is_some())
            .unwrap_or(false))
    }

    fn scan(&self, table: Table) -> Result<Vec<(String, Value)>, StorageError> {
        let tables = self.read()?;
        Ok(match tables.rows.get(&table) {
            Some(rows) => rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => Vec::new(),
        })
    }

    fn scan_prefix(&self, table: Table, prefix: &str) -> Result<Vec<(String, Value)>, StorageError> {
        let tables = self.read()?;
        Ok(match tables.rows.get(&table) {
            Some(rows) => rows
                .range(prefix.to_string()..)
                .take_while(|(k, _)| k.starts_with(prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            None => Vec::new(),
        })
    }

    fn count(&self, table: Table) -> Result<usize, StorageError> {
        let tables = self.read()?;
        Ok(tables.rows.get(&table).map(|rows| rows.len()).unwrap_or(0))
    }

    fn next_sequence(&self, name: &str) -> Result<u64, StorageError> {
        let mut tables = self.write()?;
        let value = tables.sequences.entry(name.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let tx_id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.read()?.clone();
        self.snapshots
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .insert(tx_id, snapshot);
        tracing::debug!(tx_id, "Transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.snapshots
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .remove(&tx_id)
            .ok_or(StorageError::NoActiveTransaction)?;
        tracing::debug!(tx_id, "Transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let snapshot = self
            .snapshots
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .remove(&tx_id)
            .ok_or(StorageError::NoActiveTransaction)?;
        *self.write()? = snapshot;
        tracing::debug!(tx_id, "Transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use acas_core::{Customer, Reader, Record, Store, Tx};
    use serde_json::json;

    use super::*;

    fn customer(code: &str) -> Customer {
        Customer {
            code: code.to_string(),
            name: format!("Customer {}", code),
            address: None,
            email: None,
            credit_limit: Default::default(),
            balance: Default::default(),
            active: true,
        }
    }

    #[test]
    fn test_scan_is_key_ordered_and_prefix_bounded() {
        let storage = InMemoryStorage::new();
        for key in ["b/2", "a/1", "b/1", "c/1"] {
            storage.put(Table::StockMovements, key, &json!({ "k": key })).unwrap();
        }
        let keys: Vec<String> = storage
            .scan(Table::StockMovements)
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["a/1", "b/1", "b/2", "c/1"]);

        let prefixed = storage.scan_prefix(Table::StockMovements, "b/").unwrap();
        assert_eq!(prefixed.len(), 2);
        assert_eq!(storage.count(Table::Customers).unwrap(), 0);
    }

    #[test]
    fn test_sequences_are_per_name() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.next_sequence("journal").unwrap(), 1);
        assert_eq!(storage.next_sequence("journal").unwrap(), 2);
        assert_eq!(storage.next_sequence("batch").unwrap(), 1);
    }

    #[test]
    fn test_store_transaction_commit() {
        let store = Store::new(Arc::new(InMemoryStorage::new()));
        store
            .transaction(|tx: &Tx<'_>| -> Result<(), StorageError> {
                tx.put(&customer("C1"))?;
                tx.next_number("sales_order")?;
                Ok(())
            })
            .unwrap();

        let loaded: Customer = store.get("C1").unwrap().unwrap();
        assert_eq!(loaded.key(), "C1");
        assert_eq!(store.count::<Customer>().unwrap(), 1);
    }

    #[test]
    fn test_store_transaction_rollback_restores_rows_and_sequences() {
        let store = Store::new(Arc::new(InMemoryStorage::new()));
        let result: Result<(), StorageError> = store.transaction(|tx| {
            tx.put(&customer("C1"))?;
            tx.next_number("sales_order")?;
            Err(StorageError::Other("boom".to_string()))
        });
        assert!(result.is_err());
        assert!(store.get::<Customer>("C1").unwrap().is_none());

        let next = store
            .transaction(|tx| -> Result<u64, StorageError> { tx.next_number("sales_order") })
            .unwrap();
        assert_eq!(next, 1, "sequence should have been rolled back");
    }

    #[test]
    fn test_unknown_transaction_is_rejected() {
        let storage = InMemoryStorage::new();
        assert!(matches!(
            storage.commit_transaction(42),
            Err(StorageError::NoActiveTransaction)
        ));
    }
}
