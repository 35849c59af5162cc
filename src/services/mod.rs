//! Ledger services. Every mutating operation runs inside one
//! [`Store::transaction`] so it either fully applies or leaves no trace.

use std::sync::Arc;

use acas_core::{
    round_money, Allocation, CompanySettings, OrderLineCommand, Reader, Record, StockItem, Store,
    VatCode, SETTINGS_KEY,
};
use rust_decimal::Decimal;

use crate::error::{LedgerError, LedgerResult};

pub mod aging;
pub mod gl;
pub mod purchase;
pub mod sales;
pub mod stock;
pub mod system;

pub use gl::GeneralLedger;
pub use purchase::PurchaseLedger;
pub use sales::SalesLedger;
pub use stock::StockControl;
pub use system::SystemAdmin;

/// All services over one store.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<Store>,
    pub system: Arc<SystemAdmin>,
    pub gl: Arc<GeneralLedger>,
    pub sales: Arc<SalesLedger>,
    pub purchase: Arc<PurchaseLedger>,
    pub stock: Arc<StockControl>,
}

impl Services {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            system: Arc::new(SystemAdmin::new(store.clone())),
            gl: Arc::new(GeneralLedger::new(store.clone())),
            sales: Arc::new(SalesLedger::new(store.clone())),
            purchase: Arc::new(PurchaseLedger::new(store.clone())),
            stock: Arc::new(StockControl::new(store.clone())),
            store,
        }
    }
}

pub(crate) fn fetch<T: Record>(r: &impl Reader, entity: &'static str, key: &str) -> LedgerResult<T> {
    r.get::<T>(key)?
        .ok_or_else(|| LedgerError::not_found(entity, key))
}

pub(crate) fn settings(r: &impl Reader) -> LedgerResult<CompanySettings> {
    Ok(r.get::<CompanySettings>(SETTINGS_KEY)?.unwrap_or_default())
}

/// The account code behind an optional setting.
pub(crate) fn configured(value: &Option<String>, name: &'static str) -> LedgerResult<String> {
    value.clone().ok_or(LedgerError::NotConfigured(name))
}

pub(crate) fn require_text(value: &str, field: &str) -> LedgerResult<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::validation(format!("{} is required", field)));
    }
    Ok(())
}

pub(crate) fn require_code(value: &str, field: &str) -> LedgerResult<()> {
    require_text(value, field)?;
    if value.contains('/') || value.chars().any(char::is_whitespace) {
        return Err(LedgerError::validation(format!(
            "{} may not contain spaces or '/'",
            field
        )));
    }
    Ok(())
}

pub(crate) fn require_money(amount: Decimal, field: &str) -> LedgerResult<()> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::validation(format!("{} cannot be negative", field)));
    }
    if round_money(amount) != amount {
        return Err(LedgerError::validation(format!(
            "{} is limited to two decimal places",
            field
        )));
    }
    Ok(())
}

/// An order or invoice line with its item defaults applied and totals worked out.
#[derive(Debug, Clone)]
pub(crate) struct PricedLine {
    pub item: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub vat_code: String,
    pub net: Decimal,
    pub vat: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PriceBasis {
    /// Sales documents default to the item's selling price.
    Selling,
    /// Purchase documents default to the item's average cost.
    Cost,
}

pub(crate) fn price_lines(
    r: &impl Reader,
    lines: &[OrderLineCommand],
    basis: PriceBasis,
) -> LedgerResult<Vec<PricedLine>> {
    if lines.is_empty() {
        return Err(LedgerError::validation("at least one line is required"));
    }

    let mut priced = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let n = i + 1;
        if line.quantity <= Decimal::ZERO {
            return Err(LedgerError::validation(format!("line {}: quantity must be positive", n)));
        }

        let item = match &line.item {
            Some(code) => {
                let item: StockItem = fetch(r, "stock item", code)?;
                if !item.active {
                    return Err(LedgerError::validation(format!(
                        "line {}: stock item {} is inactive",
                        n, code
                    )));
                }
                Some(item)
            }
            None => None,
        };

        let description = match (&line.description, &item) {
            (Some(d), _) if !d.trim().is_empty() => d.clone(),
            (_, Some(item)) => item.description.clone(),
            _ => {
                return Err(LedgerError::validation(format!(
                    "line {}: description is required",
                    n
                )))
            }
        };

        let unit_price = match (line.unit_price, &item) {
            (Some(price), _) => price,
            (None, Some(item)) => match basis {
                PriceBasis::Selling => item.sales_price,
                PriceBasis::Cost => item.average_cost,
            },
            (None, None) => {
                return Err(LedgerError::validation(format!("line {}: unit price is required", n)))
            }
        };
        if unit_price < Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "line {}: unit price cannot be negative",
                n
            )));
        }

        let vat_code = match (&line.vat_code, &item) {
            (Some(code), _) => code.clone(),
            (None, Some(item)) => item.vat_code.clone(),
            (None, None) => {
                return Err(LedgerError::validation(format!("line {}: VAT code is required", n)))
            }
        };
        let vat_rate: VatCode = fetch(r, "VAT code", &vat_code)?;

        let net = round_money(line.quantity * unit_price);
        priced.push(PricedLine {
            item: item.map(|i| i.code),
            description,
            quantity: line.quantity,
            unit_price,
            vat: vat_rate.vat_for(net),
            vat_code,
            net,
        });
    }
    Ok(priced)
}

/// Applies `amount` to open documents. `open` holds `(number, outstanding)`
/// oldest first. Explicit allocations are checked against it; without them
/// the oldest documents are settled first. Returns the allocations and the
/// part of `amount` left unallocated.
pub(crate) fn allocate(
    amount: Decimal,
    open: &[(u64, Decimal)],
    explicit: Option<&[Allocation]>,
) -> LedgerResult<(Vec<Allocation>, Decimal)> {
    let mut remaining = amount;
    let mut allocations = Vec::new();

    match explicit {
        Some(requested) => {
            for alloc in requested {
                let outstanding = open
                    .iter()
                    .find(|(number, _)| *number == alloc.invoice)
                    .map(|(_, o)| *o)
                    .ok_or_else(|| {
                        LedgerError::validation(format!("invoice {} is not open", alloc.invoice))
                    })?;
                if allocations.iter().any(|a: &Allocation| a.invoice == alloc.invoice) {
                    return Err(LedgerError::validation(format!(
                        "invoice {} is allocated more than once",
                        alloc.invoice
                    )));
                }
                if alloc.amount <= Decimal::ZERO || alloc.amount > outstanding {
                    return Err(LedgerError::validation(format!(
                        "allocation to invoice {} must be between 0 and {}",
                        alloc.invoice, outstanding
                    )));
                }
                if alloc.amount > remaining {
                    return Err(LedgerError::validation("allocations exceed the amount"));
                }
                remaining -= alloc.amount;
                allocations.push(alloc.clone());
            }
        }
        None => {
            for (number, outstanding) in open {
                if remaining.is_zero() {
                    break;
                }
                let applied = remaining.min(*outstanding);
                if applied > Decimal::ZERO {
                    allocations.push(Allocation {
                        invoice: *number,
                        amount: applied,
                    });
                    remaining -= applied;
                }
            }
        }
    }

    Ok((allocations, remaining))
}
