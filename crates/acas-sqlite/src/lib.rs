//! SQLite storage backend for ACAS.
//!
//! Records are stored as JSON text in one `records` table keyed by
//! `(table_name, key)`; sequences live in `sequences`. Transactions are
//! savepoints on the single connection.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, MutexGuard,
};

use acas_core::{StorageBackend, StorageError, Table, TransactionId};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

const SAVEPOINT: &str = "acas_tx";

pub struct SqliteStorage {
    conn: Mutex<Connection>,
    tx_counter: AtomicU64,
    active_tx: Mutex<Option<TransactionId>>,
}

fn sql_err(e: rusqlite::Error) -> StorageError {
    StorageError::Other(e.to_string())
}

fn parse_rows(rows: Vec<(String, String)>) -> Result<Vec<(String, Value)>, StorageError> {
    rows.into_iter()
        .map(|(k, body)| Ok((k, serde_json::from_str(&body)?)))
        .collect()
}

impl SqliteStorage {
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(sql_err)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(sql_err)?;

        let storage = Self {
            conn: Mutex::new(conn),
            tx_counter: AtomicU64::new(1),
            active_tx: Mutex::new(None),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn active(&self) -> Result<MutexGuard<'_, Option<TransactionId>>, StorageError> {
        self.active_tx.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                table_name TEXT NOT NULL,
                key TEXT NOT NULL,
                body TEXT NOT NULL,
                PRIMARY KEY (table_name, key)
            );

            CREATE TABLE IF NOT EXISTS sequences (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );
            ",
        )
        .map_err(sql_err)?;
        Ok(())
    }

    fn query_rows(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<(String, Value)>, StorageError> {
        let mut stmt = conn.prepare(sql).map_err(sql_err)?;
        let rows = stmt
            .query_map(params, |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(sql_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        parse_rows(rows)
    }
}

/// Smallest string greater than every string starting with `prefix`.
fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        if let Some(next) = char::from_u32(last as u32 + 1) {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

impl StorageBackend for SqliteStorage {
    fn get(&self, table: Table, key: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.conn()?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM records WHERE table_name = ?1 AND key = ?2",
                params![table.name(), key],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err)?;
        match body {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    fn put(&self, table: Table, key: &str, value: &Value) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO records (table_name, key, body) VALUES (?1, ?2, ?3)",
            params![table.name(), key, value.to_string()],
        )
        .map_err(sql_err)?;
        Ok(())
    }

    fn delete(&self, table: Table, key: &str) -> Result<bool, StorageError> {
        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM records WHERE table_name = ?1 AND key = ?2",
                params![table.name(), key],
            )
            .map_err(sql_err)?;
        Ok(removed > 0)
    }

    fn scan(&self, table: Table) -> Result<Vec<(String, Value)>, StorageError> {
        let conn = self.conn()?;
        Self::query_rows(
            &conn,
            "SELECT key, body FROM records WHERE table_name = ?1 ORDER BY key",
            params![table.name()],
        )
    }

    fn scan_prefix(&self, table: Table, prefix: &str) -> Result<Vec<(String, Value)>, StorageError> {
        let conn = self.conn()?;
        match prefix_upper_bound(prefix) {
            Some(upper) => Self::query_rows(
                &conn,
                "SELECT key, body FROM records
                 WHERE table_name = ?1 AND key >= ?2 AND key < ?3
                 ORDER BY key",
                params![table.name(), prefix, upper],
            ),
            None => Self::query_rows(
                &conn,
                "SELECT key, body FROM records WHERE table_name = ?1 AND key >= ?2 ORDER BY key",
                params![table.name(), prefix],
            ),
        }
    }

    fn count(&self, table: Table) -> Result<usize, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE table_name = ?1",
                params![table.name()],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        Ok(count as usize)
    }

    fn next_sequence(&self, name: &str) -> Result<u64, StorageError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sequences (name, value) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET value = value + 1",
            params![name],
        )
        .map_err(sql_err)?;
        let value: i64 = conn
            .query_row(
                "SELECT value FROM sequences WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        Ok(value as u64)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let mut active = self.active()?;
        if active.is_some() {
            return Err(StorageError::TransactionActive);
        }
        let conn = self.conn()?;
        conn.execute_batch(&format!("SAVEPOINT {}", SAVEPOINT))
            .map_err(sql_err)?;
        let tx_id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        *active = Some(tx_id);
        tracing::debug!(tx_id, "SQLite transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let mut active = self.active()?;
        if *active != Some(tx_id) {
            return Err(StorageError::NoActiveTransaction);
        }
        let conn = self.conn()?;
        conn.execute_batch(&format!("RELEASE SAVEPOINT {}", SAVEPOINT))
            .map_err(sql_err)?;
        *active = None;
        tracing::debug!(tx_id, "SQLite transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let mut active = self.active()?;
        if *active != Some(tx_id) {
            return Err(StorageError::NoActiveTransaction);
        }
        let conn = self.conn()?;
        conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {0}; RELEASE SAVEPOINT {0}",
            SAVEPOINT
        ))
        .map_err(sql_err)?;
        *active = None;
        tracing::debug!(tx_id, "SQLite transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sqlite_basic_operations() {
        let storage = SqliteStorage::new(":memory:").unwrap();

        storage
            .put(Table::Accounts, "1200", &json!({ "code": "1200", "name": "Bank" }))
            .unwrap();
        storage
            .put(Table::Accounts, "4000", &json!({ "code": "4000", "name": "Sales" }))
            .unwrap();
        storage
            .put(Table::Customers, "1200", &json!({ "code": "1200" }))
            .unwrap();

        let bank = storage.get(Table::Accounts, "1200").unwrap().unwrap();
        assert_eq!(bank["name"], "Bank");
        assert_eq!(storage.count(Table::Accounts).unwrap(), 2);
        assert_eq!(storage.scan(Table::Accounts).unwrap().len(), 2);

        assert!(storage.delete(Table::Accounts, "4000").unwrap());
        assert!(!storage.delete(Table::Accounts, "4000").unwrap());
        assert!(storage.get(Table::Accounts, "4000").unwrap().is_none());
        assert_eq!(storage.count(Table::Customers).unwrap(), 1);
    }

    #[test]
    fn test_sqlite_scan_prefix() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        for key in ["2024-01/1200", "2024-01/4000", "2024-02/1200", "2024-010/x"] {
            storage.put(Table::Balances, key, &json!({ "key": key })).unwrap();
        }
        let jan: Vec<String> = storage
            .scan_prefix(Table::Balances, "2024-01/")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(jan, vec!["2024-01/1200", "2024-01/4000"]);
    }

    #[test]
    fn test_sqlite_sequences() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        assert_eq!(storage.next_sequence("journal").unwrap(), 1);
        assert_eq!(storage.next_sequence("journal").unwrap(), 2);
        assert_eq!(storage.next_sequence("grn").unwrap(), 1);
    }

    #[test]
    fn test_sqlite_transaction_rollback() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        storage.put(Table::Accounts, "1200", &json!({ "v": 1 })).unwrap();

        let tx_id = storage.begin_transaction().unwrap();
        storage.put(Table::Accounts, "1200", &json!({ "v": 2 })).unwrap();
        storage.put(Table::Accounts, "4000", &json!({ "v": 1 })).unwrap();
        storage.next_sequence("journal").unwrap();
        storage.rollback_transaction(tx_id).unwrap();

        assert_eq!(storage.get(Table::Accounts, "1200").unwrap().unwrap()["v"], 1);
        assert!(storage.get(Table::Accounts, "4000").unwrap().is_none());
        assert_eq!(storage.next_sequence("journal").unwrap(), 1);
    }

    #[test]
    fn test_sqlite_transaction_commit() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        let tx_id = storage.begin_transaction().unwrap();
        assert!(matches!(
            storage.begin_transaction(),
            Err(StorageError::TransactionActive)
        ));
        storage.put(Table::Users, "admin", &json!({ "username": "admin" })).unwrap();
        storage.commit_transaction(tx_id).unwrap();
        assert!(storage.get(Table::Users, "admin").unwrap().is_some());
        assert!(matches!(
            storage.commit_transaction(tx_id),
            Err(StorageError::NoActiveTransaction)
        ));
    }

    #[test]
    fn test_prefix_upper_bound() {
        assert_eq!(prefix_upper_bound("ab/"), Some("ab0".to_string()));
        assert_eq!(prefix_upper_bound(""), None);
    }
}
