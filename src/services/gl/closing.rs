use std::collections::BTreeMap;

use acas_core::{
    balance_key, period_key, Account, AccountBalance, Batch, BatchStatus, JournalHeader,
    JournalStatus, Period, PeriodStatus, Reader, Record,
};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{current_period, GeneralLedger};
use crate::{
    error::{LedgerError, LedgerResult},
    services::{configured, fetch, settings},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloseResult {
    pub closed: String,
    pub current: String,
    pub year_end: bool,
    /// Profit for the year moved to retained earnings (credit-positive).
    /// Zero for an ordinary month end.
    pub retained_earnings_transfer: Decimal,
}

impl GeneralLedger {
    /// Closes the current period and opens the next one.
    ///
    /// Closing balances roll forward as the next period's opening balances.
    /// At year end income and expense accounts start the new year at zero and
    /// their net is carried into the retained earnings account instead.
    /// Refused while draft journals or unposted batches remain.
    pub fn close_period(&self, user: &str) -> LedgerResult<CloseResult> {
        self.store.transaction(|tx| {
            let mut current = current_period(tx)?;
            let current_key = current.key();

            let drafts = tx
                .list::<JournalHeader>()?
                .into_iter()
                .filter(|j| j.status == JournalStatus::Draft && current.contains(j.date))
                .count();
            if drafts > 0 {
                return Err(LedgerError::conflict(format!(
                    "period {} still has {} draft journal(s)",
                    current_key, drafts
                )));
            }

            let unposted: Vec<String> = tx
                .list::<Batch>()?
                .into_iter()
                .filter(|b| b.status != BatchStatus::Posted)
                .map(|b| b.number.to_string())
                .collect();
            if !unposted.is_empty() {
                return Err(LedgerError::conflict(format!(
                    "period {} has unposted batch(es) {}",
                    current_key,
                    unposted.join(", ")
                )));
            }

            let year_end = current.is_year_end();
            let next_key = if year_end {
                period_key(current.year + 1, 1)
            } else {
                period_key(current.year, current.number + 1)
            };
            let mut next: Period = match tx.get::<Period>(&next_key)? {
                Some(p) => p,
                None if year_end => {
                    return Err(LedgerError::conflict(format!(
                        "fiscal year {} must be opened before closing year end",
                        current.year + 1
                    )))
                }
                None => return Err(LedgerError::not_found("period", &next_key)),
            };

            let accounts: BTreeMap<String, Account> = tx
                .list::<Account>()?
                .into_iter()
                .map(|a| (a.code.clone(), a))
                .collect();

            let mut openings: BTreeMap<String, Decimal> = BTreeMap::new();
            let mut profit_and_loss = Decimal::ZERO;
            for balance in tx.list_prefix::<AccountBalance>(&format!("{}/", current_key))? {
                let closing = balance.closing();
                let is_pl = accounts
                    .get(&balance.account)
                    .map(|a| a.account_type.is_profit_and_loss())
                    .unwrap_or(false);
                if year_end && is_pl {
                    profit_and_loss += closing;
                } else if !closing.is_zero() {
                    *openings.entry(balance.account).or_default() += closing;
                }
            }

            if year_end && !profit_and_loss.is_zero() {
                let settings = settings(tx)?;
                let retained =
                    configured(&settings.retained_earnings_account, "retained_earnings_account")?;
                fetch::<Account>(tx, "retained earnings account", &retained)?;
                *openings.entry(retained).or_default() += profit_and_loss;
            }

            for (account, opening) in openings {
                if opening.is_zero() {
                    continue;
                }
                let mut balance = tx
                    .get::<AccountBalance>(&balance_key(&next_key, &account))?
                    .unwrap_or_else(|| AccountBalance::new(account.as_str(), next_key.as_str()));
                balance.opening = opening;
                tx.put(&balance)?;
            }

            current.status = PeriodStatus::Closed;
            next.status = PeriodStatus::Current;
            tx.put(&current)?;
            tx.put(&next)?;

            metrics::increment_counter!("acas_periods_closed_total");
            tracing::info!(
                closed = %current_key,
                current = %next_key,
                year_end,
                user,
                "Period closed"
            );
            Ok(CloseResult {
                closed: current_key,
                current: next_key,
                year_end,
                retained_earnings_transfer: Decimal::ZERO - profit_and_loss,
            })
        })
    }
}
