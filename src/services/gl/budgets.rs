use std::collections::BTreeMap;

use acas_core::{
    period_key, Account, Budget, BudgetLine, BudgetStatus, CreateBudgetCommand, Reader,
    SetBudgetLineCommand, Tx, PERIODS_PER_YEAR,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::{load_period, year_balances, GeneralLedger};
use crate::{
    error::{LedgerError, LedgerResult},
    services::{fetch, require_text},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetReportLine {
    pub account: String,
    pub name: String,
    pub budget: Decimal,
    pub actual: Decimal,
    pub budget_ytd: Decimal,
    pub actual_ytd: Decimal,
    /// Actual less budget, year to date.
    pub variance_ytd: Decimal,
}

/// Budget against actual movements, debit-positive like balances.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetReport {
    pub budget: Uuid,
    pub name: String,
    pub period: String,
    pub lines: Vec<BudgetReportLine>,
    pub total_budget_ytd: Decimal,
    pub total_actual_ytd: Decimal,
    pub total_variance_ytd: Decimal,
}

fn load_budget(r: &impl Reader, id: Uuid) -> LedgerResult<Budget> {
    fetch(r, "budget", &id.to_string())
}

fn load_draft(tx: &Tx<'_>, id: Uuid) -> LedgerResult<Budget> {
    let budget = load_budget(tx, id)?;
    if budget.status == BudgetStatus::Approved {
        return Err(LedgerError::conflict(format!(
            "budget {} is approved and can no longer be changed",
            budget.name
        )));
    }
    Ok(budget)
}

impl GeneralLedger {
    pub fn create_budget(&self, cmd: CreateBudgetCommand) -> LedgerResult<Budget> {
        require_text(&cmd.name, "budget name")?;
        self.store.transaction(|tx| {
            if tx
                .list::<Budget>()?
                .iter()
                .any(|b| b.year == cmd.year && b.name == cmd.name)
            {
                return Err(LedgerError::already_exists(
                    "budget",
                    format!("{} {}", cmd.year, cmd.name),
                ));
            }
            let budget = Budget {
                id: Uuid::new_v4(),
                year: cmd.year,
                name: cmd.name.clone(),
                status: BudgetStatus::Draft,
                lines: Vec::new(),
                approved_by: None,
            };
            tx.put(&budget)?;
            tracing::info!(budget = %budget.id, year = budget.year, "Budget created");
            Ok(budget)
        })
    }

    pub fn get_budget(&self, id: Uuid) -> LedgerResult<Budget> {
        load_budget(self.store.as_ref(), id)
    }

    pub fn list_budgets(&self, year: Option<i32>) -> LedgerResult<Vec<Budget>> {
        Ok(self
            .store
            .list::<Budget>()?
            .into_iter()
            .filter(|b| year.map_or(true, |y| b.year == y))
            .collect())
    }

    /// Sets the twelve period amounts for one account, replacing any earlier line.
    pub fn set_budget_line(&self, id: Uuid, cmd: SetBudgetLineCommand) -> LedgerResult<Budget> {
        if cmd.amounts.len() != PERIODS_PER_YEAR as usize {
            return Err(LedgerError::validation(format!(
                "a budget line needs {} period amounts, got {}",
                PERIODS_PER_YEAR,
                cmd.amounts.len()
            )));
        }
        self.store.transaction(|tx| {
            let mut budget = load_draft(tx, id)?;
            let account: Account = fetch(tx, "account", &cmd.account)?;
            if !account.postable {
                return Err(LedgerError::validation(format!(
                    "account {} is a header account",
                    account.code
                )));
            }

            let line = BudgetLine {
                account: cmd.account.clone(),
                amounts: cmd.amounts.clone(),
            };
            match budget.lines.iter_mut().find(|l| l.account == cmd.account) {
                Some(existing) => *existing = line,
                None => {
                    budget.lines.push(line);
                    budget.lines.sort_by(|a, b| a.account.cmp(&b.account));
                }
            }
            tx.put(&budget)?;
            Ok(budget)
        })
    }

    pub fn remove_budget_line(&self, id: Uuid, account: &str) -> LedgerResult<Budget> {
        self.store.transaction(|tx| {
            let mut budget = load_draft(tx, id)?;
            let before = budget.lines.len();
            budget.lines.retain(|l| l.account != account);
            if budget.lines.len() == before {
                return Err(LedgerError::not_found("budget line", account));
            }
            tx.put(&budget)?;
            Ok(budget)
        })
    }

    pub fn approve_budget(&self, id: Uuid, user: &str) -> LedgerResult<Budget> {
        self.store.transaction(|tx| {
            let mut budget = load_draft(tx, id)?;
            if budget.lines.is_empty() {
                return Err(LedgerError::validation("cannot approve a budget with no lines"));
            }
            budget.status = BudgetStatus::Approved;
            budget.approved_by = Some(user.to_string());
            tx.put(&budget)?;
            tracing::info!(budget = %budget.id, user, "Budget approved");
            Ok(budget)
        })
    }

    /// Compares a budget with posted movements up to and including `period`.
    pub fn budget_vs_actual(&self, id: Uuid, period: &str) -> LedgerResult<BudgetReport> {
        let store = self.store.as_ref();
        let budget = load_budget(store, id)?;
        let period = load_period(store, period)?;
        if period.year != budget.year {
            return Err(LedgerError::validation(format!(
                "period {} is not in budget year {}",
                period_key(period.year, period.number),
                budget.year
            )));
        }
        let key = period_key(period.year, period.number);

        let mut actuals: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
        for balance in year_balances(store, period.year, period.number)? {
            let entry = actuals.entry(balance.account.clone()).or_default();
            if balance.period == key {
                entry.0 += balance.movement();
            }
            entry.1 += balance.movement();
        }

        let mut lines = Vec::with_capacity(budget.lines.len());
        for line in &budget.lines {
            let name = store
                .get::<Account>(&line.account)?
                .map(|a| a.name)
                .unwrap_or_default();
            let (actual, actual_ytd) = actuals.get(&line.account).copied().unwrap_or_default();
            let budget_ytd = line.year_to_date(period.number);
            lines.push(BudgetReportLine {
                account: line.account.clone(),
                name,
                budget: line.amounts.get(period.number as usize - 1).copied().unwrap_or_default(),
                actual,
                budget_ytd,
                actual_ytd,
                variance_ytd: actual_ytd - budget_ytd,
            });
        }

        let total_budget_ytd: Decimal = lines.iter().map(|l| l.budget_ytd).sum();
        let total_actual_ytd: Decimal = lines.iter().map(|l| l.actual_ytd).sum();
        Ok(BudgetReport {
            budget: budget.id,
            name: budget.name,
            period: key,
            lines,
            total_budget_ytd,
            total_actual_ytd,
            total_variance_ytd: total_actual_ytd - total_budget_ytd,
        })
    }
}
