use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::{storage::Table, store::Record};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItem {
    pub code: String,
    pub description: String,
    pub unit: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub sales_price: Decimal,
    pub reorder_level: Decimal,
    pub vat_code: String,
    pub active: bool,
}

impl StockItem {
    pub fn value(&self) -> Decimal {
        super::round_money(self.quantity * self.average_cost)
    }
}

impl Record for StockItem {
    const TABLE: Table = Table::StockItems;

    fn key(&self) -> String {
        self.code.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Receipt,
    Issue,
    Adjustment,
}

/// One change to an item's quantity. Keys are `item/sequence` so an item's
/// movements scan in the order they happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: Uuid,
    pub sequence: u64,
    pub item: String,
    pub date: Date,
    pub kind: MovementKind,
    /// Signed: receipts positive, issues negative.
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    #[serde(default)]
    pub reference: Option<String>,
}

pub fn movement_prefix(item: &str) -> String {
    format!("{}/", item)
}

impl Record for StockMovement {
    const TABLE: Table = Table::StockMovements;

    fn key(&self) -> String {
        format!("{}{:010}", movement_prefix(&self.item), self.sequence)
    }
}
