//! ACAS accounting: general, sales and purchase ledgers with stock control,
//! served over HTTP.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod services;

pub use error::{LedgerError, LedgerResult};
pub use services::Services;
