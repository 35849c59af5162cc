use std::{fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    storage::Table,
    store::{number_key, Record},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Asset,
    Liability,
    Capital,
    Income,
    Expense,
    Control,
}

impl AccountType {
    pub fn default_normal_balance(&self) -> NormalBalance {
        match self {
            AccountType::Asset | AccountType::Expense | AccountType::Control => NormalBalance::Debit,
            AccountType::Liability | AccountType::Capital | AccountType::Income => NormalBalance::Credit,
        }
    }

    /// Income and expense accounts are cleared to retained earnings at year end.
    pub fn is_profit_and_loss(&self) -> bool {
        matches!(self, AccountType::Income | AccountType::Expense)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Capital => "CAPITAL",
            AccountType::Income => "INCOME",
            AccountType::Expense => "EXPENSE",
            AccountType::Control => "CONTROL",
        }
    }
}

impl Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASSET" => Ok(AccountType::Asset),
            "LIABILITY" => Ok(AccountType::Liability),
            "CAPITAL" => Ok(AccountType::Capital),
            "INCOME" => Ok(AccountType::Income),
            "EXPENSE" => Ok(AccountType::Expense),
            "CONTROL" => Ok(AccountType::Control),
            other => Err(format!("unknown account type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NormalBalance {
    Debit,
    Credit,
}

/// Chart of accounts entry. Header accounts (`postable == false`) group
/// children and never carry postings of their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub normal_balance: NormalBalance,
    #[serde(default)]
    pub parent: Option<String>,
    pub postable: bool,
    pub active: bool,
}

impl Record for Account {
    const TABLE: Table = Table::Accounts;

    fn key(&self) -> String {
        self.code.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeriodStatus {
    Future,
    Current,
    Closed,
}

pub fn period_key(year: i32, number: u8) -> String {
    format!("{:04}-{:02}", year, number)
}

/// Accounting period. Twelve per fiscal year, closed strictly in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub number: u8,
    pub start: Date,
    pub end: Date,
    pub status: PeriodStatus,
}

pub const PERIODS_PER_YEAR: u8 = 12;

impl Period {
    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn is_year_end(&self) -> bool {
        self.number == PERIODS_PER_YEAR
    }
}

impl Record for Period {
    const TABLE: Table = Table::Periods;

    fn key(&self) -> String {
        period_key(self.year, self.number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalSource {
    General,
    Sales,
    Purchase,
    Stock,
    Reversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalStatus {
    Draft,
    Posted,
    Reversed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account: String,
    #[serde(default)]
    pub debit: Decimal,
    #[serde(default)]
    pub credit: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl JournalLine {
    pub fn debit(account: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account: account.into(),
            debit: amount,
            credit: Decimal::ZERO,
            narrative: None,
        }
    }

    pub fn credit(account: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account: account.into(),
            debit: Decimal::ZERO,
            credit: amount,
            narrative: None,
        }
    }

    pub fn with_narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative = Some(narrative.into());
        self
    }

    /// Debit-positive amount of the line.
    pub fn signed_amount(&self) -> Decimal {
        self.debit - self.credit
    }

    pub fn swapped(&self) -> Self {
        Self {
            account: self.account.clone(),
            debit: self.credit,
            credit: self.debit,
            narrative: self.narrative.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalHeader {
    pub number: u64,
    #[serde(default)]
    pub batch: Option<u64>,
    pub date: Date,
    pub period: String,
    pub description: String,
    pub source: JournalSource,
    pub status: JournalStatus,
    pub lines: Vec<JournalLine>,
    pub created_by: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub posted_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub reverses: Option<u64>,
    #[serde(default)]
    pub reversed_by: Option<u64>,
}

impl JournalHeader {
    pub fn total_debits(&self) -> Decimal {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credits(&self) -> Decimal {
        self.lines.iter().map(|l| l.credit).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }
}

impl Record for JournalHeader {
    const TABLE: Table = Table::Journals;

    fn key(&self) -> String {
        number_key(self.number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Open,
    Validated,
    Posted,
}

/// A group of journals entered against control totals and posted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub number: u64,
    pub description: String,
    pub control_total: Decimal,
    #[serde(default)]
    pub control_count: Option<u32>,
    pub status: BatchStatus,
    pub journals: Vec<u64>,
    pub created_by: String,
}

impl Record for Batch {
    const TABLE: Table = Table::Batches;

    fn key(&self) -> String {
        number_key(self.number)
    }
}

pub fn balance_key(period: &str, account: &str) -> String {
    format!("{}/{}", period, account)
}

/// Per-period totals of one account, debit-positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: String,
    pub period: String,
    pub opening: Decimal,
    pub debits: Decimal,
    pub credits: Decimal,
}

impl AccountBalance {
    pub fn new(account: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            period: period.into(),
            opening: Decimal::ZERO,
            debits: Decimal::ZERO,
            credits: Decimal::ZERO,
        }
    }

    pub fn movement(&self) -> Decimal {
        self.debits - self.credits
    }

    pub fn closing(&self) -> Decimal {
        self.opening + self.movement()
    }

    pub fn is_empty(&self) -> bool {
        self.opening.is_zero() && self.debits.is_zero() && self.credits.is_zero()
    }
}

impl Record for AccountBalance {
    const TABLE: Table = Table::Balances;

    fn key(&self) -> String {
        balance_key(&self.period, &self.account)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BudgetStatus {
    Draft,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLine {
    pub account: String,
    /// One amount per period, debit-positive like balances.
    pub amounts: Vec<Decimal>,
}

impl BudgetLine {
    /// Budget for periods `1..=period`.
    pub fn year_to_date(&self, period: u8) -> Decimal {
        self.amounts.iter().take(period as usize).sum()
    }

    pub fn total(&self) -> Decimal {
        self.amounts.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub year: i32,
    pub name: String,
    pub status: BudgetStatus,
    pub lines: Vec<BudgetLine>,
    #[serde(default)]
    pub approved_by: Option<String>,
}

impl Record for Budget {
    const TABLE: Table = Table::Budgets;

    fn key(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;

    #[test]
    fn test_normal_balances() {
        assert_eq!(AccountType::Asset.default_normal_balance(), NormalBalance::Debit);
        assert_eq!(AccountType::Expense.default_normal_balance(), NormalBalance::Debit);
        assert_eq!(AccountType::Income.default_normal_balance(), NormalBalance::Credit);
        assert_eq!(AccountType::Capital.default_normal_balance(), NormalBalance::Credit);
        assert!(AccountType::Income.is_profit_and_loss());
        assert!(!AccountType::Control.is_profit_and_loss());
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!("capital".parse::<AccountType>().unwrap(), AccountType::Capital);
        assert!("EQUITY".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_journal_totals() {
        let journal = JournalHeader {
            number: 1,
            batch: None,
            date: date!(2024 - 01 - 10),
            period: period_key(2024, 1),
            description: "Rent".to_string(),
            source: JournalSource::General,
            status: JournalStatus::Draft,
            lines: vec![
                JournalLine::debit("7000", dec!(500)),
                JournalLine::debit("2200", dec!(100)),
                JournalLine::credit("1200", dec!(600)),
            ],
            created_by: "test".to_string(),
            posted_at: None,
            reverses: None,
            reversed_by: None,
        };
        assert_eq!(journal.total_debits(), dec!(600));
        assert_eq!(journal.total_credits(), dec!(600));
        assert!(journal.is_balanced());
        assert_eq!(journal.key(), "0000000001");
    }

    #[test]
    fn test_balance_closing_and_key() {
        let mut bal = AccountBalance::new("1200", "2024-03");
        bal.opening = dec!(100);
        bal.debits = dec!(50);
        bal.credits = dec!(80);
        assert_eq!(bal.closing(), dec!(70));
        assert_eq!(bal.key(), "2024-03/1200");
    }

    #[test]
    fn test_budget_year_to_date() {
        let line = BudgetLine {
            account: "4000".to_string(),
            amounts: vec![dec!(10); 12],
        };
        assert_eq!(line.year_to_date(3), dec!(30));
        assert_eq!(line.total(), dec!(120));
    }

    #[test]
    fn test_period_serializes_iso_dates() {
        let period = Period {
            year: 2024,
            number: 2,
            start: date!(2024 - 02 - 01),
            end: date!(2024 - 02 - 29),
            status: PeriodStatus::Current,
        };
        let json = serde_json::to_value(&period).unwrap();
        assert_eq!(json["start"], "2024-02-01");
        assert_eq!(json["status"], "CURRENT");
        assert!(period.contains(date!(2024 - 02 - 15)));
        assert!(!period.contains(date!(2024 - 03 - 01)));
    }
}
