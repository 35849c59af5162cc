use acas_core::{OpenFiscalYearCommand, Period, PeriodStatus, Reader, PERIODS_PER_YEAR};
use time::{Date, Month};

use super::GeneralLedger;
use crate::error::{LedgerError, LedgerResult};

fn month_start(year: i32, month: u8) -> LedgerResult<Date> {
    let month = Month::try_from(month)
        .map_err(|_| LedgerError::validation(format!("invalid month {}", month)))?;
    Date::from_calendar_date(year, month, 1)
        .map_err(|e| LedgerError::validation(format!("invalid period start: {}", e)))
}

/// The twelve monthly periods of fiscal year `year`, which begins on the
/// first day of `first_month` of that calendar year.
fn fiscal_periods(year: i32, first_month: u8) -> LedgerResult<Vec<Period>> {
    let mut periods = Vec::with_capacity(PERIODS_PER_YEAR as usize);
    let mut start = month_start(year, first_month)?;
    for number in 1..=PERIODS_PER_YEAR {
        let (next_year, next_month) = match start.month() {
            Month::December => (start.year() + 1, 1),
            m => (start.year(), u8::from(m) + 1),
        };
        let next = month_start(next_year, next_month)?;
        let end = next
            .previous_day()
            .ok_or_else(|| LedgerError::validation("period end out of range"))?;
        periods.push(Period {
            year,
            number,
            start,
            end,
            status: PeriodStatus::Future,
        });
        start = next;
    }
    Ok(periods)
}

impl GeneralLedger {
    /// Creates the twelve periods of a fiscal year. The first year opened
    /// makes its period 1 current. Later years must follow on directly from
    /// the last year defined.
    pub fn open_fiscal_year(&self, cmd: OpenFiscalYearCommand) -> LedgerResult<Vec<Period>> {
        if !(1..=12).contains(&cmd.first_month) {
            return Err(LedgerError::validation("first_month must be between 1 and 12"));
        }

        self.store.transaction(|tx| {
            let existing = tx.list::<Period>()?;
            if existing.iter().any(|p| p.year == cmd.year) {
                return Err(LedgerError::already_exists("fiscal year", cmd.year));
            }

            let mut periods = fiscal_periods(cmd.year, cmd.first_month)?;
            if let Some(last) = existing.iter().max_by_key(|p| (p.year, p.number)) {
                if cmd.year != last.year + 1 {
                    return Err(LedgerError::validation(format!(
                        "fiscal year {} must follow the last defined year {}",
                        cmd.year, last.year
                    )));
                }
                if last.end.next_day() != Some(periods[0].start) {
                    return Err(LedgerError::validation(format!(
                        "fiscal year {} must start on the day after {}",
                        cmd.year, last.end
                    )));
                }
            }
            if !existing.iter().any(|p| p.status == PeriodStatus::Current) {
                periods[0].status = PeriodStatus::Current;
            }

            for period in &periods {
                tx.put(period)?;
            }
            tracing::info!(year = cmd.year, first_month = cmd.first_month, "Fiscal year opened");
            Ok(periods)
        })
    }

    pub fn list_periods(&self, year: Option<i32>) -> LedgerResult<Vec<Period>> {
        Ok(self
            .store
            .list::<Period>()?
            .into_iter()
            .filter(|p| year.map_or(true, |y| p.year == y))
            .collect())
    }

    pub fn get_period(&self, key: &str) -> LedgerResult<Period> {
        super::load_period(self.store.as_ref(), key)
    }

    pub fn current_period(&self) -> LedgerResult<Period> {
        super::current_period(self.store.as_ref())
    }

    pub fn period_for_date(&self, date: Date) -> LedgerResult<Period> {
        super::period_for_date(self.store.as_ref(), date)
    }
}
