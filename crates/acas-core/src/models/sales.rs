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
pub struct Customer {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Zero means no limit.
    pub credit_limit: Decimal,
    pub balance: Decimal,
    pub active: bool,
}

impl Customer {
    pub fn has_credit_for(&self, amount: Decimal) -> bool {
        self.credit_limit.is_zero() || self.balance + amount <= self.credit_limit
    }
}

impl Record for Customer {
    const TABLE: Table = Table::Customers;

    fn key(&self) -> String {
        self.code.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrderLine {
    #[serde(default)]
    pub item: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_code: String,
    pub net: Decimal,
    pub vat: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SalesOrderStatus {
    Draft,
    Authorised,
    Invoiced,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub number: u64,
    pub customer: String,
    pub date: Date,
    #[serde(default)]
    pub reference: Option<String>,
    pub lines: Vec<SalesOrderLine>,
    pub net: Decimal,
    pub vat: Decimal,
    pub gross: Decimal,
    pub status: SalesOrderStatus,
    #[serde(default)]
    pub invoice: Option<u64>,
    #[serde(default)]
    pub authorised_by: Option<String>,
}

impl Record for SalesOrder {
    const TABLE: Table = Table::SalesOrders;

    fn key(&self) -> String {
        number_key(self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesInvoice {
    pub number: u64,
    pub customer: String,
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

impl SalesInvoice {
    pub fn outstanding(&self) -> Decimal {
        self.gross - self.paid
    }
}

impl Record for SalesInvoice {
    const TABLE: Table = Table::SalesInvoices;

    fn key(&self) -> String {
        number_key(self.number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: Uuid,
    pub customer: String,
    pub date: Date,
    pub amount: Decimal,
    #[serde(default)]
    pub reference: Option<String>,
    pub allocations: Vec<Allocation>,
    pub unallocated: Decimal,
    pub journal: u64,
}

impl Record for Receipt {
    const TABLE: Table = Table::Receipts;

    fn key(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn customer(limit: Decimal, balance: Decimal) -> Customer {
        Customer {
            code: "C001".to_string(),
            name: "Acme".to_string(),
            address: None,
            email: None,
            credit_limit: limit,
            balance,
            active: true,
        }
    }

    #[test]
    fn test_credit_limit() {
        assert!(customer(dec!(0), dec!(1000000)).has_credit_for(dec!(5)));
        assert!(customer(dec!(1000), dec!(400)).has_credit_for(dec!(600)));
        assert!(!customer(dec!(1000), dec!(400)).has_credit_for(dec!(600.01)));
    }
}
