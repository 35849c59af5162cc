use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::{Allocation, InvoiceStatus};
use crate::{
    storage::Table,
    store::{number_key, Record},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub balance: Decimal,
    pub active: bool,
}

impl Record for Supplier {
    const TABLE: Table = Table::Suppliers;

    fn key(&self) -> String {
        self.code.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    #[serde(default)]
    pub item: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub vat_code: String,
    pub net: Decimal,
    pub vat: Decimal,
    pub received: Decimal,
}

impl PurchaseOrderLine {
    pub fn outstanding(&self) -> Decimal {
        self.quantity - self.received
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseOrderStatus {
    Draft,
    Authorised,
    PartReceived,
    Received,
    Invoiced,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub number: u64,
    pub supplier: String,
    pub date: Date,
    #[serde(default)]
    pub reference: Option<String>,
    pub lines: Vec<PurchaseOrderLine>,
    pub net: Decimal,
    pub vat: Decimal,
    pub gross: Decimal,
    pub status: PurchaseOrderStatus,
    #[serde(default)]
    pub invoice: Option<u64>,
    #[serde(default)]
    pub authorised_by: Option<String>,
}

impl PurchaseOrder {
    pub fn fully_received(&self) -> bool {
        self.lines.iter().all(|l| l.received >= l.quantity)
    }
}

impl Record for PurchaseOrder {
    const TABLE: Table = Table::PurchaseOrders;

    fn key(&self) -> String {
        number_key(self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceiptLine {
    /// Zero-based index into the order's lines.
    pub line: usize,
    pub quantity: Decimal,
}

/// Goods receipt note (GRN).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceipt {
    pub number: u64,
    pub order: u64,
    pub date: Date,
    pub lines: Vec<GoodsReceiptLine>,
    pub received_by: String,
}

impl Record for GoodsReceipt {
    const TABLE: Table = Table::GoodsReceipts;

    fn key(&self) -> String {
        number_key(self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseInvoice {
    pub number: u64,
    pub supplier: String,
    pub supplier_reference: String,
    #[serde(default)]
    pub order: Option<u64>,
    pub date: Date,
    pub net: Decimal,
    pub vat: Decimal,
    pub gross: Decimal,
    pub paid: Decimal,
    pub status: InvoiceStatus,
    /// Ledger posting. Invoices with no value are not posted.
    #[serde(default)]
    pub journal: Option<u64>,
}

impl PurchaseInvoice {
    pub fn outstanding(&self) -> Decimal {
        self.gross - self.paid
    }
}

impl Record for PurchaseInvoice {
    const TABLE: Table = Table::PurchaseInvoices;

    fn key(&self) -> String {
        number_key(self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub supplier: String,
    pub date: Date,
    pub amount: Decimal,
    #[serde(default)]
    pub reference: Option<String>,
    pub allocations: Vec<Allocation>,
    pub unallocated: Decimal,
    pub journal: u64,
}

impl Record for Payment {
    const TABLE: Table = Table::Payments;

    fn key(&self) -> String {
        self.id.to_string()
    }
}
