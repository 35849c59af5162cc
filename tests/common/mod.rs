#![allow(dead_code)]

use std::sync::Arc;

use acas::Services;
use acas_core::{
    AccountType, CompanySettings, CreateAccountCommand, CreateCustomerCommand,
    CreateStockItemCommand, CreateSupplierCommand, NormalBalance, OpenFiscalYearCommand, Store,
    VatCode,
};
use acas_memory::InMemoryStorage;
use acas_sqlite::SqliteStorage;
use rust_decimal_macros::dec;

pub const USER: &str = "tester";

pub const DEBTORS: &str = "1100";
pub const BANK: &str = "1200";
pub const STOCK: &str = "1300";
pub const VAT_INPUT: &str = "1400";
pub const CREDITORS: &str = "2100";
pub const VAT_OUTPUT: &str = "2200";
pub const LOAN: &str = "2300";
pub const CAPITAL: &str = "3000";
pub const RETAINED: &str = "3100";
pub const SALES: &str = "4000";
pub const PURCHASES: &str = "5000";
pub const STOCK_ADJUSTMENT: &str = "5100";
pub const RENT: &str = "6000";

pub fn memory_services() -> Services {
    Services::new(Arc::new(Store::new(Arc::new(InMemoryStorage::new()))))
}

pub fn sqlite_services() -> Services {
    let backend = SqliteStorage::new(":memory:").expect("Failed to open SQLite");
    Services::new(Arc::new(Store::new(Arc::new(backend))))
}

/// Both storage backends, so behaviour can be checked against each.
pub fn backends() -> Vec<(&'static str, Services)> {
    vec![("memory", memory_services()), ("sqlite", sqlite_services())]
}

fn account(
    services: &Services,
    code: &str,
    name: &str,
    account_type: AccountType,
    parent: Option<&str>,
) {
    services
        .gl
        .create_account(CreateAccountCommand {
            code: code.to_string(),
            name: name.to_string(),
            account_type,
            normal_balance: None,
            parent: parent.map(str::to_string),
            postable: true,
        })
        .expect("Failed to create account");
}

fn header(services: &Services, code: &str, name: &str, account_type: AccountType) {
    services
        .gl
        .create_account(CreateAccountCommand {
            code: code.to_string(),
            name: name.to_string(),
            account_type,
            normal_balance: None,
            parent: None,
            postable: false,
        })
        .expect("Failed to create header account");
}

/// A small company: chart of accounts, fiscal year 2024 with January
/// current, standard and zero VAT, and every ledger account configured.
pub fn company(services: &Services) {
    header(services, "1000", "Current assets", AccountType::Asset);
    services
        .gl
        .create_account(CreateAccountCommand {
            code: DEBTORS.to_string(),
            name: "Debtors control".to_string(),
            account_type: AccountType::Control,
            normal_balance: None,
            parent: None,
            postable: true,
        })
        .expect("Failed to create debtors control");
    account(services, BANK, "Bank", AccountType::Asset, Some("1000"));
    account(services, STOCK, "Stock", AccountType::Asset, Some("1000"));
    account(services, VAT_INPUT, "VAT input", AccountType::Asset, Some("1000"));
    services
        .gl
        .create_account(CreateAccountCommand {
            code: CREDITORS.to_string(),
            name: "Creditors control".to_string(),
            account_type: AccountType::Control,
            normal_balance: Some(NormalBalance::Credit),
            parent: None,
            postable: true,
        })
        .expect("Failed to create creditors control");
    account(services, VAT_OUTPUT, "VAT output", AccountType::Liability, None);
    account(services, LOAN, "Loan", AccountType::Liability, None);
    account(services, CAPITAL, "Share capital", AccountType::Capital, None);
    account(services, RETAINED, "Retained earnings", AccountType::Capital, None);
    account(services, SALES, "Sales", AccountType::Income, None);
    account(services, PURCHASES, "Purchases", AccountType::Expense, None);
    account(services, STOCK_ADJUSTMENT, "Stock adjustments", AccountType::Expense, None);
    account(services, RENT, "Rent", AccountType::Expense, None);

    services
        .gl
        .open_fiscal_year(OpenFiscalYearCommand {
            year: 2024,
            first_month: 1,
        })
        .expect("Failed to open 2024");

    for (code, description, rate) in [("S", "Standard", dec!(20)), ("Z", "Zero rated", dec!(0))] {
        services
            .system
            .create_vat_code(VatCode {
                code: code.to_string(),
                description: description.to_string(),
                rate,
            })
            .expect("Failed to create VAT code");
    }

    services
        .system
        .update_settings(CompanySettings {
            name: "Applewood Computers".to_string(),
            base_currency: "GBP".to_string(),
            retained_earnings_account: Some(RETAINED.to_string()),
            debtors_control_account: Some(DEBTORS.to_string()),
            creditors_control_account: Some(CREDITORS.to_string()),
            sales_account: Some(SALES.to_string()),
            purchases_account: Some(PURCHASES.to_string()),
            vat_output_account: Some(VAT_OUTPUT.to_string()),
            vat_input_account: Some(VAT_INPUT.to_string()),
            bank_account: Some(BANK.to_string()),
            stock_account: Some(STOCK.to_string()),
            stock_adjustment_account: Some(STOCK_ADJUSTMENT.to_string()),
            allow_negative_stock: false,
        })
        .expect("Failed to save settings");
}

pub fn setup() -> Services {
    let services = memory_services();
    company(&services);
    services
}

pub fn customer(services: &Services, code: &str, credit_limit: rust_decimal::Decimal) {
    services
        .sales
        .create_customer(CreateCustomerCommand {
            code: code.to_string(),
            name: format!("Customer {}", code),
            address: None,
            email: None,
            credit_limit,
        })
        .expect("Failed to create customer");
}

pub fn supplier(services: &Services, code: &str) {
    services
        .purchase
        .create_supplier(CreateSupplierCommand {
            code: code.to_string(),
            name: format!("Supplier {}", code),
            address: None,
            email: None,
        })
        .expect("Failed to create supplier");
}

pub fn stock_item(services: &Services, code: &str, sales_price: rust_decimal::Decimal) {
    services
        .stock
        .create_item(CreateStockItemCommand {
            code: code.to_string(),
            description: format!("Item {}", code),
            unit: "EACH".to_string(),
            sales_price,
            reorder_level: dec!(5),
            vat_code: "S".to_string(),
        })
        .expect("Failed to create stock item");
}
