mod common;

use acas::{services::gl::JournalFilter, LedgerError, Services};
use acas_core::{
    BatchStatus, BudgetStatus, CreateBatchCommand, CreateBudgetCommand, CreateJournalCommand,
    JournalLine, JournalStatus, OpenFiscalYearCommand, PeriodStatus, Record, SetBudgetLineCommand,
    UpdateAccountCommand,
};
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::{macros::date, Date};

fn journal(date: Date, description: &str, lines: Vec<JournalLine>) -> CreateJournalCommand {
    CreateJournalCommand {
        date,
        description: description.to_string(),
        lines,
        batch: None,
    }
}

fn post(services: &Services, date: Date, description: &str, lines: Vec<JournalLine>) -> u64 {
    let draft = services
        .gl
        .create_journal(journal(date, description, lines), USER)
        .expect("Failed to create journal");
    services.gl.post_journal(draft.number).expect("Failed to post journal");
    draft.number
}

fn close_periods(services: &Services, count: usize) {
    for _ in 0..count {
        services.gl.close_period(USER).expect("Failed to close period");
    }
}

#[test]
fn test_post_journal_updates_balances() {
    for (name, services) in backends() {
        company(&services);
        let number = post(
            &services,
            date!(2024 - 01 - 15),
            "Owner investment",
            vec![
                JournalLine::debit(BANK, dec!(10000)),
                JournalLine::credit(CAPITAL, dec!(10000)),
            ],
        );

        let journal = services.gl.get_journal(number).unwrap();
        assert_eq!(journal.status, JournalStatus::Posted, "{}", name);
        assert_eq!(journal.period, "2024-01", "{}", name);
        assert!(journal.posted_at.is_some(), "{}", name);

        let bank = services.gl.account_balance(BANK, "2024-01").unwrap();
        assert_eq!(bank.debits, dec!(10000), "{}", name);
        assert_eq!(bank.closing(), dec!(10000), "{}", name);
        let capital = services.gl.account_balance(CAPITAL, "2024-01").unwrap();
        assert_eq!(capital.closing(), dec!(-10000), "{}", name);

        let tb = services.gl.trial_balance(None).unwrap();
        assert!(tb.balanced, "{}", name);
        assert_eq!(tb.total_debit, dec!(10000), "{}", name);
        assert_eq!(tb.lines.len(), 2, "{}", name);
    }
}

#[test]
fn test_unused_account_has_empty_balance() {
    let services = setup();
    let balance = services.gl.account_balance(RENT, "2024-03").unwrap();
    assert!(balance.is_empty());
    assert!(matches!(
        services.gl.account_balance("9999", "2024-03"),
        Err(LedgerError::NotFound { .. })
    ));
    assert!(matches!(
        services.gl.account_balance(RENT, "2031-01"),
        Err(LedgerError::NotFound { .. })
    ));
}

#[test]
fn test_unbalanced_journal_rejected() {
    let services = setup();
    let result = services.gl.create_journal(
        journal(
            date!(2024 - 01 - 10),
            "Typo",
            vec![
                JournalLine::debit(RENT, dec!(500)),
                JournalLine::credit(BANK, dec!(50)),
            ],
        ),
        USER,
    );
    match result {
        Err(LedgerError::Unbalanced { debits, credits }) => {
            assert_eq!(debits, dec!(500));
            assert_eq!(credits, dec!(50));
        }
        other => panic!("Expected Unbalanced, got {:?}", other),
    }
}

#[test]
fn test_journal_line_rules() {
    let services = setup();
    let cases = vec![
        vec![JournalLine::debit(RENT, dec!(10))],
        vec![
            JournalLine::debit(RENT, dec!(10)),
            JournalLine::credit("1000", dec!(10)),
        ],
        vec![
            JournalLine::debit(RENT, dec!(10)),
            JournalLine::credit(DEBTORS, dec!(10)),
        ],
        vec![
            JournalLine::debit(RENT, dec!(10.001)),
            JournalLine::credit(BANK, dec!(10.001)),
        ],
        vec![
            JournalLine::debit(RENT, dec!(-10)),
            JournalLine::credit(BANK, dec!(-10)),
        ],
        vec![
            JournalLine::debit("9999", dec!(10)),
            JournalLine::credit(BANK, dec!(10)),
        ],
    ];
    for lines in cases {
        let result = services
            .gl
            .create_journal(journal(date!(2024 - 01 - 10), "Bad", lines.clone()), USER);
        assert!(
            matches!(result, Err(LedgerError::Validation(_))),
            "lines {:?} gave {:?}",
            lines,
            result
        );
    }

    services
        .gl
        .update_account(RENT, UpdateAccountCommand {
            active: Some(false),
            ..Default::default()
        })
        .unwrap();
    let result = services.gl.create_journal(
        journal(
            date!(2024 - 01 - 10),
            "Inactive",
            vec![
                JournalLine::debit(RENT, dec!(10)),
                JournalLine::credit(BANK, dec!(10)),
            ],
        ),
        USER,
    );
    assert!(matches!(result, Err(LedgerError::Validation(_))));
}

#[test]
fn test_posting_only_into_current_period() {
    let services = setup();
    let lines = vec![
        JournalLine::debit(RENT, dec!(100)),
        JournalLine::credit(BANK, dec!(100)),
    ];

    let future = services
        .gl
        .create_journal(journal(date!(2024 - 03 - 01), "March rent", lines.clone()), USER)
        .unwrap();
    assert_eq!(future.period, "2024-03");
    assert!(matches!(
        services.gl.post_journal(future.number),
        Err(LedgerError::PeriodNotCurrent { .. })
    ));

    let result = services
        .gl
        .create_journal(journal(date!(2023 - 12 - 31), "Too early", lines.clone()), USER);
    assert!(matches!(result, Err(LedgerError::NoPeriod(_))));

    post(&services, date!(2024 - 01 - 31), "January rent", lines.clone());
    close_periods(&services, 1);
    assert_eq!(services.gl.current_period().unwrap().number, 2);

    let result = services
        .gl
        .create_journal(journal(date!(2024 - 01 - 20), "Late", lines), USER);
    assert!(matches!(result, Err(LedgerError::PeriodClosed(_))));
}

#[test]
fn test_posted_journal_is_immutable() {
    let services = setup();
    let number = post(
        &services,
        date!(2024 - 01 - 05),
        "Rent",
        vec![
            JournalLine::debit(RENT, dec!(100)),
            JournalLine::credit(BANK, dec!(100)),
        ],
    );
    assert!(matches!(services.gl.delete_journal(number), Err(LedgerError::Conflict(_))));
    assert!(matches!(services.gl.post_journal(number), Err(LedgerError::Conflict(_))));
}

#[test]
fn test_draft_edit_and_delete() {
    let services = setup();
    let draft = services
        .gl
        .create_journal(
            journal(
                date!(2024 - 01 - 05),
                "Rent",
                vec![
                    JournalLine::debit(RENT, dec!(100)),
                    JournalLine::credit(BANK, dec!(100)),
                ],
            ),
            USER,
        )
        .unwrap();

    let updated = services
        .gl
        .update_journal(
            draft.number,
            acas_core::UpdateJournalCommand {
                date: Some(date!(2024 - 02 - 05)),
                description: None,
                lines: Some(vec![
                    JournalLine::debit(RENT, dec!(120)),
                    JournalLine::credit(BANK, dec!(120)),
                ]),
            },
        )
        .unwrap();
    assert_eq!(updated.period, "2024-02");
    assert_eq!(updated.total_debits(), dec!(120));

    services.gl.delete_journal(draft.number).unwrap();
    assert!(matches!(
        services.gl.get_journal(draft.number),
        Err(LedgerError::NotFound { .. })
    ));
}

#[test]
fn test_close_period_rolls_balances_forward() {
    for (name, services) in backends() {
        company(&services);
        post(
            &services,
            date!(2024 - 01 - 02),
            "Loan drawdown",
            vec![
                JournalLine::debit(BANK, dec!(5000)),
                JournalLine::credit(LOAN, dec!(5000)),
            ],
        );

        let result = services.gl.close_period(USER).unwrap();
        assert_eq!(result.closed, "2024-01", "{}", name);
        assert_eq!(result.current, "2024-02", "{}", name);
        assert!(!result.year_end, "{}", name);
        assert_eq!(result.retained_earnings_transfer, Decimal::ZERO, "{}", name);

        assert_eq!(
            services.gl.get_period("2024-01").unwrap().status,
            PeriodStatus::Closed,
            "{}",
            name
        );
        let bank = services.gl.account_balance(BANK, "2024-02").unwrap();
        assert_eq!(bank.opening, dec!(5000), "{}", name);
        assert_eq!(bank.movement(), Decimal::ZERO, "{}", name);
        let loan = services.gl.account_balance(LOAN, "2024-02").unwrap();
        assert_eq!(loan.opening, dec!(-5000), "{}", name);

        let tb = services.gl.trial_balance(Some("2024-02")).unwrap();
        assert!(tb.balanced, "{}", name);
        assert_eq!(tb.total_debit, dec!(5000), "{}", name);
    }
}

#[test]
fn test_close_blocked_by_drafts() {
    let services = setup();
    services
        .gl
        .create_journal(
            journal(
                date!(2024 - 01 - 20),
                "Pending",
                vec![
                    JournalLine::debit(RENT, dec!(10)),
                    JournalLine::credit(BANK, dec!(10)),
                ],
            ),
            USER,
        )
        .unwrap();
    assert!(matches!(services.gl.close_period(USER), Err(LedgerError::Conflict(_))));
    assert_eq!(services.gl.current_period().unwrap().key(), "2024-01");
}

#[test]
fn test_close_blocked_by_unposted_batches() {
    for (name, services) in backends() {
        company(&services);
        let batch = services
            .gl
            .create_batch(
                CreateBatchCommand {
                    description: "Month end accruals".to_string(),
                    control_total: dec!(100),
                    control_count: None,
                },
                USER,
            )
            .unwrap();
        assert!(
            matches!(services.gl.close_period(USER), Err(LedgerError::Conflict(_))),
            "{}",
            name
        );

        let mut cmd = journal(
            date!(2024 - 01 - 31),
            "Accrued rent",
            vec![
                JournalLine::debit(RENT, dec!(100)),
                JournalLine::credit(BANK, dec!(100)),
            ],
        );
        cmd.batch = Some(batch.number);
        services.gl.create_journal(cmd, USER).unwrap();
        let report = services.gl.validate_batch(batch.number).unwrap();
        assert!(report.valid, "{}", name);
        assert!(
            matches!(services.gl.close_period(USER), Err(LedgerError::Conflict(_))),
            "{}",
            name
        );
        assert_eq!(services.gl.current_period().unwrap().key(), "2024-01", "{}", name);

        services.gl.post_batch(batch.number).unwrap();
        let result = services.gl.close_period(USER).unwrap();
        assert_eq!(result.closed, "2024-01", "{}", name);
    }
}

#[test]
fn test_year_end_moves_profit_to_retained_earnings() {
    let services = setup();
    post(
        &services,
        date!(2024 - 01 - 10),
        "Cash sale",
        vec![
            JournalLine::debit(BANK, dec!(500)),
            JournalLine::credit(SALES, dec!(500)),
        ],
    );
    post(
        &services,
        date!(2024 - 01 - 11),
        "Rent",
        vec![
            JournalLine::debit(RENT, dec!(200)),
            JournalLine::credit(BANK, dec!(200)),
        ],
    );

    close_periods(&services, 11);
    assert_eq!(services.gl.current_period().unwrap().number, 12);
    assert!(matches!(services.gl.close_period(USER), Err(LedgerError::Conflict(_))));

    services
        .gl
        .open_fiscal_year(OpenFiscalYearCommand {
            year: 2025,
            first_month: 1,
        })
        .unwrap();
    let result = services.gl.close_period(USER).unwrap();
    assert!(result.year_end);
    assert_eq!(result.current, "2025-01");
    assert_eq!(result.retained_earnings_transfer, dec!(300));

    let retained = services.gl.account_balance(RETAINED, "2025-01").unwrap();
    assert_eq!(retained.opening, dec!(-300));
    let sales = services.gl.account_balance(SALES, "2025-01").unwrap();
    assert!(sales.is_empty());
    let bank = services.gl.account_balance(BANK, "2025-01").unwrap();
    assert_eq!(bank.opening, dec!(300));

    let sheet = services.gl.balance_sheet(None).unwrap();
    assert!(sheet.balanced);
    assert_eq!(sheet.current_year_profit, Decimal::ZERO);
    assert_eq!(sheet.total_capital, dec!(300));
}

#[test]
fn test_fiscal_years_must_be_contiguous() {
    let services = setup();
    assert!(matches!(
        services.gl.open_fiscal_year(OpenFiscalYearCommand {
            year: 2024,
            first_month: 1
        }),
        Err(LedgerError::AlreadyExists { .. })
    ));
    assert!(matches!(
        services.gl.open_fiscal_year(OpenFiscalYearCommand {
            year: 2026,
            first_month: 1
        }),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        services.gl.open_fiscal_year(OpenFiscalYearCommand {
            year: 2025,
            first_month: 4
        }),
        Err(LedgerError::Validation(_))
    ));
    let periods = services
        .gl
        .open_fiscal_year(OpenFiscalYearCommand {
            year: 2025,
            first_month: 1,
        })
        .unwrap();
    assert!(periods.iter().all(|p| p.status == PeriodStatus::Future));
    assert_eq!(
        services.gl.period_for_date(date!(2025 - 06 - 30)).unwrap().number,
        6
    );
}

#[test]
fn test_reverse_journal() {
    let services = setup();
    let number = post(
        &services,
        date!(2024 - 01 - 05),
        "Wrong rent",
        vec![
            JournalLine::debit(RENT, dec!(750)),
            JournalLine::credit(BANK, dec!(750)),
        ],
    );

    let reversal = services.gl.reverse_journal(number, None, USER).unwrap();
    assert_eq!(reversal.reverses, Some(number));
    assert_eq!(reversal.status, JournalStatus::Posted);
    assert_eq!(reversal.lines[0].credit, dec!(750));

    let original = services.gl.get_journal(number).unwrap();
    assert_eq!(original.status, JournalStatus::Reversed);
    assert_eq!(original.reversed_by, Some(reversal.number));

    let rent = services.gl.account_balance(RENT, "2024-01").unwrap();
    assert_eq!(rent.closing(), Decimal::ZERO);

    assert!(matches!(
        services.gl.reverse_journal(number, None, USER),
        Err(LedgerError::Conflict(_))
    ));
}

#[test]
fn test_reversal_needs_active_accounts() {
    let services = setup();
    let number = post(
        &services,
        date!(2024 - 01 - 05),
        "Loan drawdown",
        vec![
            JournalLine::debit(BANK, dec!(400)),
            JournalLine::credit(LOAN, dec!(400)),
        ],
    );
    services
        .gl
        .update_account(LOAN, UpdateAccountCommand {
            active: Some(false),
            ..Default::default()
        })
        .unwrap();

    assert!(matches!(
        services.gl.reverse_journal(number, None, USER),
        Err(LedgerError::Validation(_))
    ));
    assert_eq!(services.gl.get_journal(number).unwrap().status, JournalStatus::Posted);

    services
        .gl
        .update_account(LOAN, UpdateAccountCommand {
            active: Some(true),
            ..Default::default()
        })
        .unwrap();
    let reversal = services.gl.reverse_journal(number, None, USER).unwrap();
    assert_eq!(reversal.reverses, Some(number));
}

#[test]
fn test_batch_validate_and_post() {
    let services = setup();
    let batch = services
        .gl
        .create_batch(
            CreateBatchCommand {
                description: "January bills".to_string(),
                control_total: dec!(300),
                control_count: Some(2),
            },
            USER,
        )
        .unwrap();

    for amount in [dec!(100), dec!(200)] {
        let mut cmd = journal(
            date!(2024 - 01 - 20),
            "Bill",
            vec![
                JournalLine::debit(RENT, amount),
                JournalLine::credit(BANK, amount),
            ],
        );
        cmd.batch = Some(batch.number);
        services.gl.create_journal(cmd, USER).unwrap();
    }

    let drafts = services
        .gl
        .list_journals(&JournalFilter {
            batch: Some(batch.number),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(drafts.len(), 2);
    assert!(matches!(
        services.gl.post_journal(drafts[0].number),
        Err(LedgerError::Conflict(_))
    ));

    let report = services.gl.validate_batch(batch.number).unwrap();
    assert!(report.valid, "{:?}", report.errors);
    assert_eq!(report.total_debits, dec!(300));
    assert_eq!(
        services.gl.get_batch(batch.number).unwrap().status,
        BatchStatus::Validated
    );

    let posted = services.gl.post_batch(batch.number).unwrap();
    assert_eq!(posted.status, BatchStatus::Posted);
    let rent = services.gl.account_balance(RENT, "2024-01").unwrap();
    assert_eq!(rent.debits, dec!(300));
    assert!(matches!(services.gl.post_batch(batch.number), Err(LedgerError::Conflict(_))));
}

#[test]
fn test_batch_control_total_mismatch() {
    let services = setup();
    let batch = services
        .gl
        .create_batch(
            CreateBatchCommand {
                description: "Short".to_string(),
                control_total: dec!(999),
                control_count: None,
            },
            USER,
        )
        .unwrap();
    let mut cmd = journal(
        date!(2024 - 01 - 20),
        "Bill",
        vec![
            JournalLine::debit(RENT, dec!(100)),
            JournalLine::credit(BANK, dec!(100)),
        ],
    );
    cmd.batch = Some(batch.number);
    services.gl.create_journal(cmd, USER).unwrap();

    let report = services.gl.validate_batch(batch.number).unwrap();
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(services.gl.get_batch(batch.number).unwrap().status, BatchStatus::Open);
    assert!(matches!(services.gl.post_batch(batch.number), Err(LedgerError::Conflict(_))));
    assert!(services.gl.account_balance(RENT, "2024-01").unwrap().is_empty());
}

#[test]
fn test_income_statement_and_balance_sheet() {
    let services = setup();
    post(
        &services,
        date!(2024 - 01 - 01),
        "Capital",
        vec![
            JournalLine::debit(BANK, dec!(1000)),
            JournalLine::credit(CAPITAL, dec!(1000)),
        ],
    );
    post(
        &services,
        date!(2024 - 01 - 10),
        "Sales",
        vec![
            JournalLine::debit(BANK, dec!(400)),
            JournalLine::credit(SALES, dec!(400)),
        ],
    );
    post(
        &services,
        date!(2024 - 01 - 12),
        "Rent",
        vec![
            JournalLine::debit(RENT, dec!(150)),
            JournalLine::credit(BANK, dec!(150)),
        ],
    );

    let income = services.gl.income_statement(None).unwrap();
    assert_eq!(income.total_income, dec!(400));
    assert_eq!(income.total_expenses, dec!(150));
    assert_eq!(income.net_profit, dec!(250));
    assert_eq!(income.net_profit_ytd, dec!(250));

    let sheet = services.gl.balance_sheet(None).unwrap();
    assert_eq!(sheet.total_assets, dec!(1250));
    assert_eq!(sheet.total_capital, dec!(1000));
    assert_eq!(sheet.current_year_profit, dec!(250));
    assert!(sheet.balanced);

    let text = services.gl.trial_balance(None).unwrap().to_string();
    assert!(text.contains("Trial balance 2024-01"));
}

#[test]
fn test_account_statement_running_balance() {
    let services = setup();
    post(
        &services,
        date!(2024 - 01 - 01),
        "Capital",
        vec![
            JournalLine::debit(BANK, dec!(1000)),
            JournalLine::credit(CAPITAL, dec!(1000)),
        ],
    );
    post(
        &services,
        date!(2024 - 01 - 12),
        "Rent",
        vec![
            JournalLine::debit(RENT, dec!(150)),
            JournalLine::credit(BANK, dec!(150)).with_narrative("January rent"),
        ],
    );
    close_periods(&services, 1);
    post(
        &services,
        date!(2024 - 02 - 12),
        "Rent",
        vec![
            JournalLine::debit(RENT, dec!(150)),
            JournalLine::credit(BANK, dec!(150)),
        ],
    );

    let statement = services.gl.account_statement(BANK, None, None).unwrap();
    assert_eq!(statement.from, "2024-01");
    assert_eq!(statement.to, "2024-02");
    assert_eq!(statement.opening, Decimal::ZERO);
    assert_eq!(statement.lines.len(), 3);
    assert_eq!(statement.lines[1].description, "January rent");
    assert_eq!(statement.lines[1].balance, dec!(850));
    assert_eq!(statement.closing, dec!(700));

    let february = services
        .gl
        .account_statement(BANK, Some("2024-02"), Some("2024-02"))
        .unwrap();
    assert_eq!(february.opening, dec!(850));
    assert_eq!(february.closing, dec!(700));

    assert!(matches!(
        services.gl.account_statement(BANK, Some("2024-02"), Some("2024-01")),
        Err(LedgerError::Validation(_))
    ));
}

#[test]
fn test_account_hierarchy_rules() {
    let services = setup();
    let children = services.gl.children("1000").unwrap();
    assert_eq!(children.len(), 3);

    assert!(matches!(services.gl.delete_account("1000"), Err(LedgerError::Conflict(_))));
    assert!(matches!(services.gl.delete_account(BANK), Err(LedgerError::Conflict(_))));
    assert!(matches!(
        services.gl.update_account("1000", UpdateAccountCommand {
            parent: Some(BANK.to_string()),
            ..Default::default()
        }),
        Err(LedgerError::Validation(_))
    ));

    post(
        &services,
        date!(2024 - 01 - 12),
        "Loan",
        vec![
            JournalLine::debit(BANK, dec!(10)),
            JournalLine::credit(LOAN, dec!(10)),
        ],
    );
    assert!(matches!(services.gl.delete_account(LOAN), Err(LedgerError::Conflict(_))));
    assert!(matches!(
        services.gl.update_account(LOAN, UpdateAccountCommand {
            postable: Some(false),
            ..Default::default()
        }),
        Err(LedgerError::Conflict(_))
    ));
}

#[test]
fn test_budget_vs_actual() {
    let services = setup();
    let budget = services
        .gl
        .create_budget(CreateBudgetCommand {
            year: 2024,
            name: "Operating".to_string(),
        })
        .unwrap();

    assert!(matches!(
        services.gl.approve_budget(budget.id, USER),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        services.gl.set_budget_line(budget.id, SetBudgetLineCommand {
            account: RENT.to_string(),
            amounts: vec![dec!(100); 11],
        }),
        Err(LedgerError::Validation(_))
    ));

    services
        .gl
        .set_budget_line(budget.id, SetBudgetLineCommand {
            account: RENT.to_string(),
            amounts: vec![dec!(100); 12],
        })
        .unwrap();
    let approved = services.gl.approve_budget(budget.id, USER).unwrap();
    assert_eq!(approved.status, BudgetStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some(USER));
    assert!(matches!(
        services.gl.remove_budget_line(budget.id, RENT),
        Err(LedgerError::Conflict(_))
    ));

    post(
        &services,
        date!(2024 - 01 - 12),
        "Rent",
        vec![
            JournalLine::debit(RENT, dec!(150)),
            JournalLine::credit(BANK, dec!(150)),
        ],
    );
    let report = services.gl.budget_vs_actual(budget.id, "2024-01").unwrap();
    assert_eq!(report.lines.len(), 1);
    assert_eq!(report.lines[0].budget, dec!(100));
    assert_eq!(report.lines[0].actual, dec!(150));
    assert_eq!(report.lines[0].variance_ytd, dec!(50));
    assert_eq!(report.total_variance_ytd, dec!(50));
}
