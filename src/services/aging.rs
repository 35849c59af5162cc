//! Aged debtor and creditor analysis shared by both sub-ledgers.

use std::fmt::Display;

use prettytable::{row, Table};
use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AgedLine {
    pub account: String,
    pub name: String,
    /// Up to 30 days old.
    pub current: Decimal,
    pub days_31_60: Decimal,
    pub days_61_90: Decimal,
    pub over_90: Decimal,
    pub total: Decimal,
}

impl AgedLine {
    fn add(&mut self, age_days: i64, amount: Decimal) {
        match age_days {
            i64::MIN..=30 => self.current += amount,
            31..=60 => self.days_31_60 += amount,
            61..=90 => self.days_61_90 += amount,
            _ => self.over_90 += amount,
        }
        self.total += amount;
    }

    fn accumulate(&mut self, other: &AgedLine) {
        self.current += other.current;
        self.days_31_60 += other.days_31_60;
        self.days_61_90 += other.days_61_90;
        self.over_90 += other.over_90;
        self.total += other.total;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgedReport {
    pub as_at: Date,
    pub lines: Vec<AgedLine>,
    pub totals: AgedLine,
}

/// One account's open documents and unapplied credits: `(date, amount)`.
/// Credits are negative.
pub(crate) struct OpenItems {
    pub account: String,
    pub name: String,
    pub items: Vec<(Date, Decimal)>,
}

/// Buckets outstanding amounts by age at `as_at`. Documents dated after
/// `as_at` are ignored, as are accounts with nothing outstanding.
pub(crate) fn aged_report(as_at: Date, accounts: Vec<OpenItems>) -> AgedReport {
    let mut totals = AgedLine {
        account: String::new(),
        name: "Total".to_string(),
        ..Default::default()
    };
    let mut lines = Vec::new();

    for open in accounts {
        let mut line = AgedLine {
            account: open.account,
            name: open.name,
            ..Default::default()
        };
        for (date, amount) in open.items {
            if date > as_at || amount.is_zero() {
                continue;
            }
            line.add((as_at - date).whole_days(), amount);
        }
        if !line.total.is_zero() {
            totals.accumulate(&line);
            lines.push(line);
        }
    }

    AgedReport { as_at, lines, totals }
}

impl Display for AgedReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Account", "Name", "Current", "31-60", "61-90", "Over 90", "Total"]);
        table.add_empty_row();
        for line in self.lines.iter().chain(std::iter::once(&self.totals)) {
            table.add_row(row![
                line.account,
                line.name,
                r->line.current,
                r->line.days_31_60,
                r->line.days_61_90,
                r->line.over_90,
                r->line.total
            ]);
        }
        write!(f, "\nAged analysis at {}\n{}\n", self.as_at, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;

    #[test]
    fn test_buckets_by_age() {
        let report = aged_report(
            date!(2024 - 06 - 30),
            vec![
                OpenItems {
                    account: "C001".to_string(),
                    name: "Acme".to_string(),
                    items: vec![
                        (date!(2024 - 06 - 15), dec!(100)),
                        (date!(2024 - 05 - 31), dec!(50)),
                        (date!(2024 - 05 - 30), dec!(25)),
                        (date!(2024 - 04 - 15), dec!(10)),
                        (date!(2024 - 01 - 01), dec!(5)),
                        (date!(2024 - 07 - 01), dec!(999)),
                    ],
                },
                OpenItems {
                    account: "C002".to_string(),
                    name: "Settled".to_string(),
                    items: vec![(date!(2024 - 06 - 01), dec!(0))],
                },
            ],
        );

        assert_eq!(report.lines.len(), 1);
        let line = &report.lines[0];
        assert_eq!(line.current, dec!(150));
        assert_eq!(line.days_31_60, dec!(25));
        assert_eq!(line.days_61_90, dec!(10));
        assert_eq!(line.over_90, dec!(5));
        assert_eq!(line.total, dec!(190));
        assert_eq!(report.totals.total, dec!(190));
    }
}
