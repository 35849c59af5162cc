use std::{collections::BTreeMap, fmt::Display};

use acas_core::{
    balance_key, period_key, Account, AccountBalance, AccountType, JournalHeader, JournalStatus,
    NormalBalance, Period, Reader,
};
use prettytable::{row, Table};
use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use super::{current_period, load_period, year_balances, GeneralLedger};
use crate::{
    error::{LedgerError, LedgerResult},
    services::fetch,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialBalanceLine {
    pub account: String,
    pub name: String,
    pub account_type: AccountType,
    pub opening: Decimal,
    pub debits: Decimal,
    pub credits: Decimal,
    /// Closing balance split into its debit or credit column.
    pub debit: Decimal,
    pub credit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialBalance {
    pub period: String,
    pub lines: Vec<TrialBalanceLine>,
    pub total_debit: Decimal,
    pub total_credit: Decimal,
    pub balanced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeStatementLine {
    pub account: String,
    pub name: String,
    pub account_type: AccountType,
    /// Income credit-positive, expenses debit-positive.
    pub period: Decimal,
    pub year_to_date: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeStatement {
    pub period: String,
    pub income: Vec<IncomeStatementLine>,
    pub expenses: Vec<IncomeStatementLine>,
    pub total_income: Decimal,
    pub total_income_ytd: Decimal,
    pub total_expenses: Decimal,
    pub total_expenses_ytd: Decimal,
    pub net_profit: Decimal,
    pub net_profit_ytd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSheetLine {
    pub account: String,
    pub name: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSheet {
    pub period: String,
    pub assets: Vec<BalanceSheetLine>,
    pub liabilities: Vec<BalanceSheetLine>,
    pub capital: Vec<BalanceSheetLine>,
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub total_capital: Decimal,
    /// Profit of the year so far, not yet transferred to retained earnings.
    pub current_year_profit: Decimal,
    pub balanced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementLine {
    pub journal: u64,
    pub date: Date,
    pub period: String,
    pub description: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountStatement {
    pub account: String,
    pub name: String,
    pub from: String,
    pub to: String,
    pub opening: Decimal,
    pub lines: Vec<StatementLine>,
    pub closing: Decimal,
}

fn account_map(r: &impl Reader) -> LedgerResult<BTreeMap<String, Account>> {
    Ok(r.list::<Account>()?
        .into_iter()
        .map(|a| (a.code.clone(), a))
        .collect())
}

fn resolve_period(r: &impl Reader, key: Option<&str>) -> LedgerResult<Period> {
    match key {
        Some(key) => load_period(r, key),
        None => current_period(r),
    }
}

/// Accounts that sit on the debit side of the balance sheet.
fn is_asset(account: &Account) -> bool {
    match account.account_type {
        AccountType::Asset => true,
        AccountType::Control => account.normal_balance == NormalBalance::Debit,
        _ => false,
    }
}

impl GeneralLedger {
    /// Totals of one account in one period. Accounts without postings get
    /// an empty balance.
    pub fn account_balance(&self, account: &str, period: &str) -> LedgerResult<AccountBalance> {
        let store = self.store.as_ref();
        fetch::<Account>(store, "account", account)?;
        load_period(store, period)?;
        Ok(store
            .get::<AccountBalance>(&balance_key(period, account))?
            .unwrap_or_else(|| AccountBalance::new(account, period)))
    }

    /// Every account with activity in the period.
    pub fn trial_balance(&self, period: Option<&str>) -> LedgerResult<TrialBalance> {
        let store = self.store.as_ref();
        let period = resolve_period(store, period)?;
        let key = period_key(period.year, period.number);
        let accounts = account_map(store)?;

        let mut lines = Vec::new();
        for balance in store.list_prefix::<AccountBalance>(&format!("{}/", key))? {
            if balance.is_empty() {
                continue;
            }
            let closing = balance.closing();
            let account = accounts
                .get(&balance.account)
                .ok_or_else(|| LedgerError::not_found("account", &balance.account))?;
            let (debit, credit) = if closing > Decimal::ZERO {
                (closing, Decimal::ZERO)
            } else {
                (Decimal::ZERO, -closing)
            };
            lines.push(TrialBalanceLine {
                account: account.code.clone(),
                name: account.name.clone(),
                account_type: account.account_type,
                opening: balance.opening,
                debits: balance.debits,
                credits: balance.credits,
                debit,
                credit,
            });
        }

        let total_debit: Decimal = lines.iter().map(|l| l.debit).sum();
        let total_credit: Decimal = lines.iter().map(|l| l.credit).sum();
        Ok(TrialBalance {
            period: key,
            lines,
            total_debit,
            total_credit,
            balanced: total_debit == total_credit,
        })
    }

    /// Income and expenditure for the period and for the year to date.
    pub fn income_statement(&self, period: Option<&str>) -> LedgerResult<IncomeStatement> {
        let store = self.store.as_ref();
        let period = resolve_period(store, period)?;
        let key = period_key(period.year, period.number);
        let accounts = account_map(store)?;

        let mut movements: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
        for balance in year_balances(store, period.year, period.number)? {
            let entry = movements.entry(balance.account.clone()).or_default();
            if balance.period == key {
                entry.0 += balance.movement();
            }
            entry.1 += balance.movement();
        }

        let mut income = Vec::new();
        let mut expenses = Vec::new();
        for (code, (period_movement, ytd_movement)) in movements {
            let Some(account) = accounts.get(&code) else { continue };
            let line = |sign: Decimal| IncomeStatementLine {
                account: account.code.clone(),
                name: account.name.clone(),
                account_type: account.account_type,
                period: period_movement * sign,
                year_to_date: ytd_movement * sign,
            };
            match account.account_type {
                AccountType::Income => income.push(line(Decimal::NEGATIVE_ONE)),
                AccountType::Expense => expenses.push(line(Decimal::ONE)),
                _ => {}
            }
        }

        let total_income: Decimal = income.iter().map(|l| l.period).sum();
        let total_income_ytd: Decimal = income.iter().map(|l| l.year_to_date).sum();
        let total_expenses: Decimal = expenses.iter().map(|l| l.period).sum();
        let total_expenses_ytd: Decimal = expenses.iter().map(|l| l.year_to_date).sum();
        Ok(IncomeStatement {
            period: key,
            income,
            expenses,
            total_income,
            total_income_ytd,
            total_expenses,
            total_expenses_ytd,
            net_profit: total_income - total_expenses,
            net_profit_ytd: total_income_ytd - total_expenses_ytd,
        })
    }

    /// Position at the end of the period. Income and expense accounts are
    /// shown as one current-year profit figure.
    pub fn balance_sheet(&self, period: Option<&str>) -> LedgerResult<BalanceSheet> {
        let store = self.store.as_ref();
        let period = resolve_period(store, period)?;
        let key = period_key(period.year, period.number);
        let accounts = account_map(store)?;

        let mut assets = Vec::new();
        let mut liabilities = Vec::new();
        let mut capital = Vec::new();
        let mut profit_and_loss = Decimal::ZERO;
        for balance in store.list_prefix::<AccountBalance>(&format!("{}/", key))? {
            let closing = balance.closing();
            let Some(account) = accounts.get(&balance.account) else { continue };
            if account.account_type.is_profit_and_loss() {
                profit_and_loss += closing;
                continue;
            }
            if closing.is_zero() {
                continue;
            }
            let line = |amount: Decimal| BalanceSheetLine {
                account: account.code.clone(),
                name: account.name.clone(),
                amount,
            };
            if is_asset(account) {
                assets.push(line(closing));
            } else if account.account_type == AccountType::Capital {
                capital.push(line(-closing));
            } else {
                liabilities.push(line(-closing));
            }
        }

        let total_assets: Decimal = assets.iter().map(|l| l.amount).sum();
        let total_liabilities: Decimal = liabilities.iter().map(|l| l.amount).sum();
        let total_capital: Decimal = capital.iter().map(|l| l.amount).sum();
        let current_year_profit = Decimal::ZERO - profit_and_loss;
        Ok(BalanceSheet {
            period: key,
            balanced: total_assets == total_liabilities + total_capital + current_year_profit,
            assets,
            liabilities,
            capital,
            total_assets,
            total_liabilities,
            total_capital,
            current_year_profit,
        })
    }

    /// Posted activity on one account between two periods inclusive, with a
    /// running balance.
    pub fn account_statement(
        &self,
        code: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> LedgerResult<AccountStatement> {
        let store = self.store.as_ref();
        let account: Account = fetch(store, "account", code)?;
        let to = resolve_period(store, to)?;
        let from = match from {
            Some(key) => load_period(store, key)?,
            None => load_period(store, &period_key(to.year, 1))?,
        };
        let (from_key, to_key) = (period_key(from.year, from.number), period_key(to.year, to.number));
        if from_key > to_key {
            return Err(LedgerError::validation(format!(
                "statement starts at {} which is after {}",
                from_key, to_key
            )));
        }
        if account.account_type.is_profit_and_loss() && from.year != to.year {
            return Err(LedgerError::validation(
                "statements of income and expense accounts cannot span fiscal years",
            ));
        }

        let opening = store
            .get::<AccountBalance>(&balance_key(&from_key, code))?
            .map(|b| b.opening)
            .unwrap_or_default();

        let mut lines = Vec::new();
        for journal in store.list::<JournalHeader>()? {
            if journal.status == JournalStatus::Draft
                || journal.period < from_key
                || journal.period > to_key
            {
                continue;
            }
            for line in journal.lines.iter().filter(|l| l.account == code) {
                lines.push(StatementLine {
                    journal: journal.number,
                    date: journal.date,
                    period: journal.period.clone(),
                    description: line
                        .narrative
                        .clone()
                        .unwrap_or_else(|| journal.description.clone()),
                    debit: line.debit,
                    credit: line.credit,
                    balance: Decimal::ZERO,
                });
            }
        }
        lines.sort_by(|a, b| (&a.period, a.date, a.journal).cmp(&(&b.period, b.date, b.journal)));
        let mut running = opening;
        for line in &mut lines {
            running += line.debit - line.credit;
            line.balance = running;
        }

        Ok(AccountStatement {
            account: account.code,
            name: account.name,
            from: from_key,
            to: to_key,
            opening,
            lines,
            closing: running,
        })
    }
}

impl Display for TrialBalance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Account", "Name", "Opening", "Debits", "Credits", "Debit", "Credit"]);
        table.add_empty_row();
        for line in &self.lines {
            let debit = if line.debit.is_zero() { String::new() } else { line.debit.to_string() };
            let credit = if line.credit.is_zero() { String::new() } else { line.credit.to_string() };
            table.add_row(row![
                line.account,
                line.name,
                r->line.opening,
                r->line.debits,
                r->line.credits,
                r->debit,
                r->credit
            ]);
        }
        table.add_empty_row();
        table.add_row(row!["", "Total", "", "", "", r->self.total_debit, r->self.total_credit]);
        write!(f, "\nTrial balance {}\n{}\n", self.period, table)
    }
}

impl Display for IncomeStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Account", "Name", "Period", "Year to date"]);
        table.add_empty_row();
        for line in &self.income {
            table.add_row(row![line.account, line.name, r->line.period, r->line.year_to_date]);
        }
        table.add_row(row!["", "Total income", r->self.total_income, r->self.total_income_ytd]);
        table.add_empty_row();
        for line in &self.expenses {
            table.add_row(row![line.account, line.name, r->line.period, r->line.year_to_date]);
        }
        table.add_row(row!["", "Total expenses", r->self.total_expenses, r->self.total_expenses_ytd]);
        table.add_empty_row();
        table.add_row(row!["", "Net profit", r->self.net_profit, r->self.net_profit_ytd]);
        write!(f, "\nIncome statement {}\n{}\n", self.period, table)
    }
}

impl Display for BalanceSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Account", "Name", "Amount"]);
        let sections = [
            ("Assets", &self.assets, self.total_assets),
            ("Liabilities", &self.liabilities, self.total_liabilities),
            ("Capital", &self.capital, self.total_capital),
        ];
        for (title, lines, total) in sections {
            table.add_empty_row();
            for line in lines {
                table.add_row(row![line.account, line.name, r->line.amount]);
            }
            table.add_row(row!["", format!("Total {}", title.to_lowercase()), r->total]);
        }
        table.add_empty_row();
        table.add_row(row!["", "Current year profit", r->self.current_year_profit]);
        write!(f, "\nBalance sheet {}\n{}\n", self.period, table)
    }
}

impl Display for AccountStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Date", "Journal", "Description", "Debit", "Credit", "Balance"]);
        table.add_empty_row();
        table.add_row(row!["", "", "Opening balance", "", "", r->self.opening]);
        for line in &self.lines {
            table.add_row(row![
                line.date,
                line.journal,
                line.description,
                r->line.debit,
                r->line.credit,
                r->line.balance
            ]);
        }
        write!(
            f,
            "\nStatement {} {} ({} to {})\n{}\n",
            self.account, self.name, self.from, self.to, table
        )
    }
}
