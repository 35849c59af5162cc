use std::sync::Arc;

use acas::Services;
use acas_core::{
    AccountType, CreateAccountCommand, CreateJournalCommand, JournalLine, OpenFiscalYearCommand,
    Store,
};
use acas_memory::InMemoryStorage;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal_macros::dec;
use time::macros::date;

fn setup() -> Services {
    let services = Services::new(Arc::new(Store::new(Arc::new(InMemoryStorage::new()))));
    for (code, name, account_type) in [
        ("1200", "Bank", AccountType::Asset),
        ("3000", "Capital", AccountType::Capital),
        ("4000", "Sales", AccountType::Income),
        ("6000", "Rent", AccountType::Expense),
    ] {
        services
            .gl
            .create_account(CreateAccountCommand {
                code: code.to_string(),
                name: name.to_string(),
                account_type,
                normal_balance: None,
                parent: None,
                postable: true,
            })
            .unwrap();
    }
    services
        .gl
        .open_fiscal_year(OpenFiscalYearCommand {
            year: 2024,
            first_month: 1,
        })
        .unwrap();
    services
}

fn journal(description: &str) -> CreateJournalCommand {
    CreateJournalCommand {
        date: date!(2024 - 01 - 15),
        description: description.to_string(),
        lines: vec![
            JournalLine::debit("1200", dec!(120.00)),
            JournalLine::credit("4000", dec!(100.00)),
            JournalLine::credit("3000", dec!(20.00)),
        ],
        batch: None,
    }
}

fn seed_journals(services: &Services, count: usize) {
    for i in 0..count {
        let header = services
            .gl
            .create_journal(journal(&format!("Seed {}", i)), "bench")
            .unwrap();
        services.gl.post_journal(header.number).unwrap();
    }
}

fn bench_create_and_post(c: &mut Criterion) {
    let services = setup();
    c.bench_function("create_and_post_journal", |b| {
        b.iter(|| {
            let header = services
                .gl
                .create_journal(black_box(journal("Bench")), "bench")
                .unwrap();
            services.gl.post_journal(header.number).unwrap()
        })
    });
}

fn bench_account_balance(c: &mut Criterion) {
    let services = setup();
    seed_journals(&services, 500);
    c.bench_function("account_balance", |b| {
        b.iter(|| services.gl.account_balance(black_box("1200"), "2024-01").unwrap())
    });
}

fn bench_trial_balance(c: &mut Criterion) {
    let services = setup();
    seed_journals(&services, 500);
    c.bench_function("trial_balance", |b| {
        b.iter(|| services.gl.trial_balance(black_box(None)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_create_and_post,
    bench_account_balance,
    bench_trial_balance
);
criterion_main!(benches);
