//! Commands accepted by the services. They double as the JSON request bodies
//! of the HTTP API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use super::{AccountType, Allocation, GoodsReceiptLine, JournalLine, NormalBalance, Role};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAccountCommand {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub normal_balance: Option<NormalBalance>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default = "default_true")]
    pub postable: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateAccountCommand {
    pub name: Option<String>,
    pub parent: Option<String>,
    pub postable: Option<bool>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenFiscalYearCommand {
    pub year: i32,
    /// Calendar month (1-12) in which period 1 starts.
    #[serde(default = "default_first_month")]
    pub first_month: u8,
}

fn default_first_month() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateJournalCommand {
    pub date: Date,
    pub description: String,
    pub lines: Vec<JournalLine>,
    #[serde(default)]
    pub batch: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateJournalCommand {
    pub date: Option<Date>,
    pub description: Option<String>,
    pub lines: Option<Vec<JournalLine>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBatchCommand {
    pub description: String,
    pub control_total: Decimal,
    #[serde(default)]
    pub control_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBudgetCommand {
    pub year: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetBudgetLineCommand {
    pub account: String,
    pub amounts: Vec<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCustomerCommand {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub credit_limit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateCustomerCommand {
    pub name: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub credit_limit: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSupplierCommand {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSupplierCommand {
    pub name: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
}

/// An order or invoice line as entered. Stock lines default their
/// description, price and VAT code from the item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineCommand {
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: Decimal,
    /// Selling price on sales documents, cost on purchase documents.
    #[serde(default, alias = "unit_cost")]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub vat_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSalesOrderCommand {
    pub customer: String,
    pub date: Date,
    #[serde(default)]
    pub reference: Option<String>,
    pub lines: Vec<OrderLineCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePurchaseOrderCommand {
    pub supplier: String,
    pub date: Date,
    #[serde(default)]
    pub reference: Option<String>,
    pub lines: Vec<OrderLineCommand>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateOrderCommand {
    pub date: Option<Date>,
    pub reference: Option<String>,
    pub lines: Option<Vec<OrderLineCommand>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceOrderCommand {
    pub date: Date,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordReceiptCommand {
    pub customer: String,
    pub date: Date,
    pub amount: Decimal,
    #[serde(default)]
    pub reference: Option<String>,
    /// `None` allocates oldest invoice first.
    #[serde(default)]
    pub allocations: Option<Vec<Allocation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPaymentCommand {
    pub supplier: String,
    pub date: Date,
    pub amount: Decimal,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub allocations: Option<Vec<Allocation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveGoodsCommand {
    pub date: Date,
    pub lines: Vec<GoodsReceiptLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterPurchaseInvoiceCommand {
    pub supplier: String,
    pub supplier_reference: String,
    pub date: Date,
    /// Invoice a received order. Mutually exclusive with `lines`.
    #[serde(default)]
    pub order: Option<u64>,
    #[serde(default)]
    pub lines: Option<Vec<OrderLineCommand>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStockItemCommand {
    pub code: String,
    pub description: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub sales_price: Decimal,
    #[serde(default)]
    pub reorder_level: Decimal,
    pub vat_code: String,
}

fn default_unit() -> String {
    "EACH".to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateStockItemCommand {
    pub description: Option<String>,
    pub unit: Option<String>,
    pub sales_price: Option<Decimal>,
    pub reorder_level: Option<Decimal>,
    pub vat_code: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovementCommand {
    pub item: String,
    pub date: Date,
    pub quantity: Decimal,
    /// Required for receipts; issues and adjustments use the average cost.
    #[serde(default)]
    pub unit_cost: Option<Decimal>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateVatCodeCommand {
    pub description: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateUserCommand {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginCommand {
    pub username: String,
    pub password: String,
}
