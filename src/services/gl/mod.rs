//! General ledger: chart of accounts, periods, journals and batches, period
//! close, budgets and the financial reports.
//!
//! The posting engine lives here. Journals raised by the sub-ledgers go
//! through [`post_system_journal`] inside the caller's transaction, so a
//! document and its ledger entries commit together.

use std::sync::Arc;

use acas_core::{
    balance_key, round_money, Account, AccountBalance, AccountType, JournalHeader, JournalLine,
    JournalSource, JournalStatus, Period, PeriodStatus, Reader, Record, Store, Tx,
};
use rust_decimal::Decimal;
use time::{Date, OffsetDateTime};

use crate::error::{LedgerError, LedgerResult};

mod accounts;
mod batches;
mod budgets;
mod closing;
mod journals;
mod periods;
mod reports;

pub use batches::BatchValidation;
pub use budgets::{BudgetReport, BudgetReportLine};
pub use closing::CloseResult;
pub use journals::JournalFilter;
pub use reports::{
    AccountStatement, BalanceSheet, BalanceSheetLine, IncomeStatement, IncomeStatementLine,
    StatementLine, TrialBalance, TrialBalanceLine,
};

pub(crate) const JOURNAL_SEQUENCE: &str = "journal";

pub struct GeneralLedger {
    store: Arc<Store>,
}

impl GeneralLedger {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

pub(crate) fn current_period(r: &impl Reader) -> LedgerResult<Period> {
    r.list::<Period>()?
        .into_iter()
        .find(|p| p.status == PeriodStatus::Current)
        .ok_or_else(|| LedgerError::conflict("no current period; open a fiscal year first"))
}

pub(crate) fn period_for_date(r: &impl Reader, date: Date) -> LedgerResult<Period> {
    r.list::<Period>()?
        .into_iter()
        .find(|p| p.contains(date))
        .ok_or(LedgerError::NoPeriod(date))
}

/// Period a draft dated `date` may be entered into: any period not yet closed.
pub(crate) fn entry_period(r: &impl Reader, date: Date) -> LedgerResult<Period> {
    let period = period_for_date(r, date)?;
    if period.status == PeriodStatus::Closed {
        return Err(LedgerError::PeriodClosed(period.key()));
    }
    Ok(period)
}

/// Period a posting dated `date` lands in. Only the current period accepts postings.
pub(crate) fn posting_period(r: &impl Reader, date: Date) -> LedgerResult<Period> {
    let period = period_for_date(r, date)?;
    match period.status {
        PeriodStatus::Current => Ok(period),
        PeriodStatus::Closed => Err(LedgerError::PeriodClosed(period.key())),
        PeriodStatus::Future => Err(LedgerError::PeriodNotCurrent {
            date,
            current: current_period(r).map(|p| p.key()).unwrap_or_default(),
        }),
    }
}

/// Problems with a set of journal lines other than the balance check.
pub(crate) fn check_lines(
    r: &impl Reader,
    lines: &[JournalLine],
    source: JournalSource,
) -> LedgerResult<Vec<String>> {
    let mut problems = Vec::new();
    if lines.len() < 2 {
        problems.push("a journal needs at least two lines".to_string());
    }

    for (i, line) in lines.iter().enumerate() {
        let n = i + 1;
        if line.debit < Decimal::ZERO || line.credit < Decimal::ZERO {
            problems.push(format!("line {}: amounts cannot be negative", n));
        } else if line.debit.is_zero() == line.credit.is_zero() {
            problems.push(format!(
                "line {}: exactly one of debit or credit must be non-zero",
                n
            ));
        }
        if round_money(line.debit) != line.debit || round_money(line.credit) != line.credit {
            problems.push(format!("line {}: amounts are limited to two decimal places", n));
        }

        match r.get::<Account>(&line.account)? {
            None => problems.push(format!("line {}: unknown account {}", n, line.account)),
            Some(account) if !account.postable => problems.push(format!(
                "line {}: account {} is a header account",
                n, account.code
            )),
            Some(account) if !account.active => problems.push(format!(
                "line {}: account {} is inactive",
                n, account.code
            )),
            Some(account)
                if account.account_type == AccountType::Control
                    && source == JournalSource::General =>
            {
                problems.push(format!(
                    "line {}: control account {} is maintained by its sub-ledger",
                    n, account.code
                ))
            }
            Some(_) => {}
        }
    }
    Ok(problems)
}

pub(crate) fn validate_lines(
    r: &impl Reader,
    lines: &[JournalLine],
    source: JournalSource,
) -> LedgerResult<()> {
    let problems = check_lines(r, lines, source)?;
    if !problems.is_empty() {
        return Err(LedgerError::Validation(problems.join("; ")));
    }
    let debits: Decimal = lines.iter().map(|l| l.debit).sum();
    let credits: Decimal = lines.iter().map(|l| l.credit).sum();
    if debits != credits {
        return Err(LedgerError::Unbalanced { debits, credits });
    }
    Ok(())
}

/// Adds the journal's lines to the period balances and marks it posted.
pub(crate) fn apply_posting(tx: &Tx<'_>, journal: &mut JournalHeader) -> LedgerResult<()> {
    let period = posting_period(tx, journal.date)?;
    journal.period = period.key();

    for line in &journal.lines {
        let key = balance_key(&journal.period, &line.account);
        let mut balance = tx
            .get::<AccountBalance>(&key)?
            .unwrap_or_else(|| AccountBalance::new(line.account.as_str(), journal.period.as_str()));
        balance.debits += line.debit;
        balance.credits += line.credit;
        tx.put(&balance)?;
    }

    journal.status = JournalStatus::Posted;
    journal.posted_at = Some(OffsetDateTime::now_utc());
    tx.put(&*journal)?;

    metrics::increment_counter!("acas_journals_posted_total");
    tracing::info!(
        journal = journal.number,
        period = %journal.period,
        amount = %journal.total_debits(),
        "Journal posted"
    );
    Ok(())
}

/// Raises and posts a journal on behalf of a sub-ledger. Zero lines are
/// dropped so that, for example, a zero-rated invoice carries no VAT line.
pub(crate) fn post_system_journal(
    tx: &Tx<'_>,
    date: Date,
    description: impl Into<String>,
    source: JournalSource,
    lines: Vec<JournalLine>,
    user: &str,
) -> LedgerResult<JournalHeader> {
    let lines: Vec<JournalLine> = lines
        .into_iter()
        .filter(|l| !(l.debit.is_zero() && l.credit.is_zero()))
        .collect();
    validate_lines(tx, &lines, source)?;

    let mut journal = JournalHeader {
        number: tx.next_number(JOURNAL_SEQUENCE)?,
        batch: None,
        date,
        period: String::new(),
        description: description.into(),
        source,
        status: JournalStatus::Draft,
        lines,
        created_by: user.to_string(),
        posted_at: None,
        reverses: None,
        reversed_by: None,
    };
    apply_posting(tx, &mut journal)?;
    Ok(journal)
}

/// Every balance record of periods `1..=through` of a fiscal year.
pub(crate) fn year_balances(
    r: &impl Reader,
    year: i32,
    through: u8,
) -> LedgerResult<Vec<AccountBalance>> {
    let mut balances = Vec::new();
    for number in 1..=through {
        let prefix = format!("{}/", acas_core::period_key(year, number));
        balances.extend(r.list_prefix::<AccountBalance>(&prefix)?);
    }
    Ok(balances)
}

pub(crate) fn load_period(r: &impl Reader, key: &str) -> LedgerResult<Period> {
    super::fetch(r, "period", key)
}
