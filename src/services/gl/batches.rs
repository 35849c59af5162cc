use acas_core::{
    number_key, Batch, BatchStatus, CreateBatchCommand, JournalHeader, JournalStatus, Reader, Record,
    Tx,
};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{apply_posting, check_lines, current_period, GeneralLedger};
use crate::{
    error::{LedgerError, LedgerResult},
    services::{fetch, require_money, require_text},
};

pub(crate) const BATCH_SEQUENCE: &str = "batch";

/// Outcome of checking a batch against its control totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchValidation {
    pub batch: u64,
    pub valid: bool,
    pub errors: Vec<String>,
    pub journal_count: usize,
    pub total_debits: Decimal,
    pub total_credits: Decimal,
}

fn load_batch(r: &impl Reader, number: u64) -> LedgerResult<Batch> {
    fetch(r, "batch", &number_key(number))
}

fn check_batch(r: &impl Reader, batch: &Batch) -> LedgerResult<(BatchValidation, Vec<JournalHeader>)> {
    let mut errors = Vec::new();
    let mut journals = Vec::with_capacity(batch.journals.len());
    let current = current_period(r)?;

    if batch.journals.is_empty() {
        errors.push("batch has no journals".to_string());
    }

    for number in &batch.journals {
        let journal = match r.get::<JournalHeader>(&number_key(*number))? {
            Some(j) => j,
            None => {
                errors.push(format!("journal {} is missing", number));
                continue;
            }
        };
        if journal.status != JournalStatus::Draft {
            errors.push(format!("journal {} is not a draft", number));
        }
        if !current.contains(journal.date) {
            errors.push(format!(
                "journal {} is dated {}, outside the current period {}",
                number,
                journal.date,
                current.key()
            ));
        }
        for problem in check_lines(r, &journal.lines, journal.source)? {
            errors.push(format!("journal {}: {}", number, problem));
        }
        if !journal.is_balanced() {
            errors.push(format!(
                "journal {} is out of balance: debits {} != credits {}",
                number,
                journal.total_debits(),
                journal.total_credits()
            ));
        }
        journals.push(journal);
    }

    let total_debits: Decimal = journals.iter().map(|j| j.total_debits()).sum();
    let total_credits: Decimal = journals.iter().map(|j| j.total_credits()).sum();
    if total_debits != batch.control_total {
        errors.push(format!(
            "batch total {} does not match control total {}",
            total_debits, batch.control_total
        ));
    }
    if let Some(count) = batch.control_count {
        if count as usize != batch.journals.len() {
            errors.push(format!(
                "batch has {} journals, control count is {}",
                batch.journals.len(),
                count
            ));
        }
    }

    let report = BatchValidation {
        batch: batch.number,
        valid: errors.is_empty(),
        errors,
        journal_count: batch.journals.len(),
        total_debits,
        total_credits,
    };
    Ok((report, journals))
}

fn load_unposted(tx: &Tx<'_>, number: u64) -> LedgerResult<Batch> {
    let batch = load_batch(tx, number)?;
    if batch.status == BatchStatus::Posted {
        return Err(LedgerError::conflict(format!("batch {} is already posted", number)));
    }
    Ok(batch)
}

impl GeneralLedger {
    pub fn create_batch(&self, cmd: CreateBatchCommand, user: &str) -> LedgerResult<Batch> {
        require_text(&cmd.description, "description")?;
        require_money(cmd.control_total, "control total")?;

        self.store.transaction(|tx| {
            let batch = Batch {
                number: tx.next_number(BATCH_SEQUENCE)?,
                description: cmd.description.clone(),
                control_total: cmd.control_total,
                control_count: cmd.control_count,
                status: BatchStatus::Open,
                journals: Vec::new(),
                created_by: user.to_string(),
            };
            tx.put(&batch)?;
            tracing::info!(batch = batch.number, control_total = %batch.control_total, "Batch created");
            Ok(batch)
        })
    }

    pub fn get_batch(&self, number: u64) -> LedgerResult<Batch> {
        load_batch(self.store.as_ref(), number)
    }

    pub fn list_batches(&self, status: Option<BatchStatus>) -> LedgerResult<Vec<Batch>> {
        Ok(self
            .store
            .list::<Batch>()?
            .into_iter()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .collect())
    }

    /// Checks every journal and the control totals. A clean batch moves to
    /// VALIDATED; otherwise it stays OPEN and the report lists the problems.
    pub fn validate_batch(&self, number: u64) -> LedgerResult<BatchValidation> {
        self.store.transaction(|tx| {
            let mut batch = load_unposted(tx, number)?;
            let (report, _) = check_batch(tx, &batch)?;
            batch.status = if report.valid {
                BatchStatus::Validated
            } else {
                BatchStatus::Open
            };
            tx.put(&batch)?;
            tracing::info!(batch = number, valid = report.valid, "Batch validated");
            Ok(report)
        })
    }

    /// Posts every journal of a validated batch in one transaction.
    pub fn post_batch(&self, number: u64) -> LedgerResult<Batch> {
        self.store.transaction(|tx| {
            let mut batch = load_unposted(tx, number)?;
            if batch.status != BatchStatus::Validated {
                return Err(LedgerError::conflict(format!(
                    "batch {} must be validated before posting",
                    number
                )));
            }
            let (report, journals) = check_batch(tx, &batch)?;
            if !report.valid {
                return Err(LedgerError::Validation(report.errors.join("; ")));
            }

            for mut journal in journals {
                apply_posting(tx, &mut journal)?;
            }
            batch.status = BatchStatus::Posted;
            tx.put(&batch)?;
            tracing::info!(batch = number, journals = batch.journals.len(), "Batch posted");
            Ok(batch)
        })
    }
}
