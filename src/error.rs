use acas_core::StorageError;
use rust_decimal::Decimal;
use thiserror::Error;
use time::Date;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("journal is out of balance: debits {debits} != credits {credits}")]
    Unbalanced { debits: Decimal, credits: Decimal },

    #[error("{0}")]
    Conflict(String),

    #[error("period {0} is closed")]
    PeriodClosed(String),

    #[error("{date} is not in the current period {current}")]
    PeriodNotCurrent { date: Date, current: String },

    #[error("no period defined for {0}")]
    NoPeriod(Date),

    #[error("insufficient stock for {item}: on hand {on_hand}, requested {requested}")]
    InsufficientStock {
        item: String,
        on_hand: Decimal,
        requested: Decimal,
    },

    #[error("credit limit exceeded for {customer}: limit {limit}, exposure {exposure}")]
    CreditLimitExceeded {
        customer: String,
        limit: Decimal,
        exposure: Decimal,
    },

    #[error("setting not configured: {0}")]
    NotConfigured(&'static str),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, key: impl ToString) -> Self {
        LedgerError::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        LedgerError::Conflict(message.into())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
