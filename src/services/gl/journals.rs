use acas_core::{
    number_key, Batch, BatchStatus, CreateJournalCommand, JournalHeader, JournalSource,
    JournalStatus, Reader, Record, Tx, UpdateJournalCommand,
};
use serde::Deserialize;
use time::Date;

use super::{
    apply_posting, current_period, entry_period, validate_lines, GeneralLedger, JOURNAL_SEQUENCE,
};
use crate::{
    error::{LedgerError, LedgerResult},
    services::{fetch, require_text},
};

/// Filter for [`GeneralLedger::list_journals`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JournalFilter {
    pub status: Option<JournalStatus>,
    pub period: Option<String>,
    pub batch: Option<u64>,
}

fn load_journal(r: &impl Reader, number: u64) -> LedgerResult<JournalHeader> {
    fetch(r, "journal", &number_key(number))
}

fn load_draft(r: &impl Reader, number: u64) -> LedgerResult<JournalHeader> {
    let journal = load_journal(r, number)?;
    if journal.status != JournalStatus::Draft {
        return Err(LedgerError::conflict(format!(
            "journal {} is {:?} and can no longer be changed",
            number, journal.status
        )));
    }
    Ok(journal)
}

/// A change to a journal reopens a validated batch that contains it.
fn reopen_batch(tx: &Tx<'_>, batch: Option<u64>) -> LedgerResult<()> {
    if let Some(number) = batch {
        let mut batch: Batch = fetch(tx, "batch", &number_key(number))?;
        if batch.status == BatchStatus::Validated {
            batch.status = BatchStatus::Open;
            tx.put(&batch)?;
            tracing::debug!(batch = number, "Batch reopened by journal change");
        }
    }
    Ok(())
}

impl GeneralLedger {
    /// Enters a draft journal, optionally into an open batch.
    pub fn create_journal(&self, cmd: CreateJournalCommand, user: &str) -> LedgerResult<JournalHeader> {
        require_text(&cmd.description, "description")?;

        self.store.transaction(|tx| {
            let period = entry_period(tx, cmd.date)?;
            validate_lines(tx, &cmd.lines, JournalSource::General)?;

            let number = tx.next_number(JOURNAL_SEQUENCE)?;
            if let Some(batch_number) = cmd.batch {
                let mut batch: Batch = fetch(tx, "batch", &number_key(batch_number))?;
                if batch.status == BatchStatus::Posted {
                    return Err(LedgerError::conflict(format!(
                        "batch {} is already posted",
                        batch_number
                    )));
                }
                batch.journals.push(number);
                batch.status = BatchStatus::Open;
                tx.put(&batch)?;
            }

            let journal = JournalHeader {
                number,
                batch: cmd.batch,
                date: cmd.date,
                period: period.key(),
                description: cmd.description.clone(),
                source: JournalSource::General,
                status: JournalStatus::Draft,
                lines: cmd.lines.clone(),
                created_by: user.to_string(),
                posted_at: None,
                reverses: None,
                reversed_by: None,
            };
            tx.put(&journal)?;
            tracing::info!(journal = number, batch = ?cmd.batch, "Journal created");
            Ok(journal)
        })
    }

    pub fn update_journal(
        &self,
        number: u64,
        cmd: UpdateJournalCommand,
    ) -> LedgerResult<JournalHeader> {
        self.store.transaction(|tx| {
            let mut journal = load_draft(tx, number)?;
            if let Some(date) = cmd.date {
                let period = entry_period(tx, date)?;
                journal.date = date;
                journal.period = period.key();
            }
            if let Some(description) = cmd.description {
                require_text(&description, "description")?;
                journal.description = description;
            }
            if let Some(lines) = cmd.lines {
                journal.lines = lines;
            }
            validate_lines(tx, &journal.lines, journal.source)?;

            reopen_batch(tx, journal.batch)?;
            tx.put(&journal)?;
            Ok(journal)
        })
    }

    pub fn delete_journal(&self, number: u64) -> LedgerResult<()> {
        self.store.transaction(|tx| {
            let journal = load_draft(tx, number)?;
            if let Some(batch_number) = journal.batch {
                let mut batch: Batch = fetch(tx, "batch", &number_key(batch_number))?;
                batch.journals.retain(|n| *n != number);
                if batch.status == BatchStatus::Validated {
                    batch.status = BatchStatus::Open;
                }
                tx.put(&batch)?;
            }
            tx.delete::<JournalHeader>(&number_key(number))?;
            tracing::info!(journal = number, "Draft journal deleted");
            Ok(())
        })
    }

    pub fn get_journal(&self, number: u64) -> LedgerResult<JournalHeader> {
        load_journal(self.store.as_ref(), number)
    }

    pub fn list_journals(&self, filter: &JournalFilter) -> LedgerResult<Vec<JournalHeader>> {
        Ok(self
            .store
            .list::<JournalHeader>()?
            .into_iter()
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .filter(|j| filter.period.as_ref().map_or(true, |p| &j.period == p))
            .filter(|j| filter.batch.map_or(true, |b| j.batch == Some(b)))
            .collect())
    }

    /// Posts a standalone draft journal. Batched journals post with their batch.
    pub fn post_journal(&self, number: u64) -> LedgerResult<JournalHeader> {
        self.store.transaction(|tx| {
            let mut journal = load_draft(tx, number)?;
            if let Some(batch) = journal.batch {
                return Err(LedgerError::conflict(format!(
                    "journal {} belongs to batch {} and is posted with it",
                    number, batch
                )));
            }
            validate_lines(tx, &journal.lines, journal.source)?;
            apply_posting(tx, &mut journal)?;
            Ok(journal)
        })
    }

    /// Posts a mirror image of a posted journal. The reversal is dated
    /// `date`, or the original's date when that is still in the current
    /// period, or else the first day of the current period.
    pub fn reverse_journal(
        &self,
        number: u64,
        date: Option<Date>,
        user: &str,
    ) -> LedgerResult<JournalHeader> {
        self.store.transaction(|tx| {
            let mut original = load_journal(tx, number)?;
            match original.status {
                JournalStatus::Posted => {}
                JournalStatus::Reversed => {
                    return Err(LedgerError::conflict(format!(
                        "journal {} has already been reversed by journal {}",
                        number,
                        original.reversed_by.unwrap_or_default()
                    )))
                }
                JournalStatus::Draft => {
                    return Err(LedgerError::conflict(format!(
                        "journal {} is a draft; delete it instead",
                        number
                    )))
                }
            }
            if original.source != JournalSource::General {
                return Err(LedgerError::conflict(format!(
                    "journal {} was raised by the {:?} ledger and cannot be reversed here",
                    number, original.source
                )));
            }

            let lines: Vec<_> = original.lines.iter().map(|l| l.swapped()).collect();
            validate_lines(tx, &lines, JournalSource::Reversal)?;

            let current = current_period(tx)?;
            let date = date.unwrap_or(if current.contains(original.date) {
                original.date
            } else {
                current.start
            });

            let mut reversal = JournalHeader {
                number: tx.next_number(JOURNAL_SEQUENCE)?,
                batch: None,
                date,
                period: String::new(),
                description: format!("Reversal of journal {}: {}", number, original.description),
                source: JournalSource::Reversal,
                status: JournalStatus::Draft,
                lines,
                created_by: user.to_string(),
                posted_at: None,
                reverses: Some(number),
                reversed_by: None,
            };
            apply_posting(tx, &mut reversal)?;

            original.status = JournalStatus::Reversed;
            original.reversed_by = Some(reversal.number);
            tx.put(&original)?;
            tracing::info!(journal = number, reversal = reversal.number, "Journal reversed");
            Ok(reversal)
        })
    }
}
