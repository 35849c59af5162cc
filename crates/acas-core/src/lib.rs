//! Core types and traits for ACAS storage backends.
//!
//! This crate provides the `StorageBackend` trait, the record types of every
//! ledger, and the typed `Store`/`Tx` unit of work the services run on,
//! enabling pluggable storage implementations in separate crates.

pub mod models;
pub mod storage;
pub mod store;

// Re-export key types at crate root for convenience
pub use models::*;
pub use storage::{StorageBackend, StorageError, Table, TransactionId};
pub use store::{number_key, Reader, Record, Store, Tx};
