use std::fmt::Display;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
    #[error("no active transaction")]
    NoActiveTransaction,
    #[error("a transaction is already active")]
    TransactionActive,
    #[error("storage lock poisoned")]
    LockPoisoned,
}

pub type TransactionId = u64;

/// Logical tables. Every record lives in exactly one table under a string key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    Accounts,
    Periods,
    Journals,
    Batches,
    Balances,
    Budgets,
    Customers,
    SalesOrders,
    SalesInvoices,
    Receipts,
    Suppliers,
    PurchaseOrders,
    GoodsReceipts,
    PurchaseInvoices,
    Payments,
    StockItems,
    StockMovements,
    VatCodes,
    Users,
    Settings,
}

impl Table {
    pub const ALL: [Table; 20] = [
        Table::Accounts,
        Table::Periods,
        Table::Journals,
        Table::Batches,
        Table::Balances,
        Table::Budgets,
        Table::Customers,
        Table::SalesOrders,
        Table::SalesInvoices,
        Table::Receipts,
        Table::Suppliers,
        Table::PurchaseOrders,
        Table::GoodsReceipts,
        Table::PurchaseInvoices,
        Table::Payments,
        Table::StockItems,
        Table::StockMovements,
        Table::VatCodes,
        Table::Users,
        Table::Settings,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Accounts => "accounts",
            Table::Periods => "periods",
            Table::Journals => "journals",
            Table::Batches => "batches",
            Table::Balances => "balances",
            Table::Budgets => "budgets",
            Table::Customers => "customers",
            Table::SalesOrders => "sales_orders",
            Table::SalesInvoices => "sales_invoices",
            Table::Receipts => "receipts",
            Table::Suppliers => "suppliers",
            Table::PurchaseOrders => "purchase_orders",
            Table::GoodsReceipts => "goods_receipts",
            Table::PurchaseInvoices => "purchase_invoices",
            Table::Payments => "payments",
            Table::StockItems => "stock_items",
            Table::StockMovements => "stock_movements",
            Table::VatCodes => "vat_codes",
            Table::Users => "users",
            Table::Settings => "settings",
        }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A document store keyed by `(table, key)`.
///
/// Scans return records ordered by key. Sequences are named counters that
/// start at 1 and participate in transactions like any other write.
pub trait StorageBackend: Send + Sync {
    fn get(&self, table: Table, key: &str) -> Result<Option<Value>, StorageError>;
    fn put(&self, table: Table, key: &str, value: &Value) -> Result<(), StorageError>;
    fn delete(&self, table: Table, key: &str) -> Result<bool, StorageError>;
    fn scan(&self, table: Table) -> Result<Vec<(String, Value)>, StorageError>;
    fn scan_prefix(&self, table: Table, prefix: &str) -> Result<Vec<(String, Value)>, StorageError>;
    fn count(&self, table: Table) -> Result<usize, StorageError>;
    fn next_sequence(&self, name: &str) -> Result<u64, StorageError>;

    fn begin_transaction(&self) -> Result<TransactionId, StorageError>;
    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;
    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;
}
