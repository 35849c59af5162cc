//! Stock control: item master, weighted-average costing and movements.

use std::{fmt::Display, sync::Arc};

use acas_core::{
    movement_prefix, round_money, CreateStockItemCommand, JournalLine, JournalSource,
    MovementKind, Reader, StockItem, StockMovement, StockMovementCommand, Store, Tx,
    UpdateStockItemCommand, VatCode,
};
use prettytable::{row, Table};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::{
    error::{LedgerError, LedgerResult},
    services::{fetch, gl::post_system_journal, require_code, require_money, require_text, settings},
};

pub(crate) const MOVEMENT_SEQUENCE: &str = "stock_movement";

/// Decimal places kept on average costs.
const COST_DP: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationLine {
    pub item: String,
    pub description: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockValuation {
    pub lines: Vec<ValuationLine>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReorderLine {
    pub item: String,
    pub description: String,
    pub quantity: Decimal,
    pub reorder_level: Decimal,
    pub shortfall: Decimal,
}

/// Weighted average of the stock on hand and a receipt, rounded to four places.
/// Stock that was negative before the receipt takes the receipt cost.
pub fn weighted_average_cost(
    on_hand: Decimal,
    average_cost: Decimal,
    received: Decimal,
    unit_cost: Decimal,
) -> Decimal {
    let total = on_hand + received;
    if on_hand <= Decimal::ZERO || total <= Decimal::ZERO {
        return unit_cost.round_dp_with_strategy(COST_DP, RoundingStrategy::MidpointAwayFromZero);
    }
    ((on_hand * average_cost + received * unit_cost) / total)
        .round_dp_with_strategy(COST_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Records one movement and updates the item. `quantity` is signed.
/// Incoming quantities with a `unit_cost` re-average the item cost; all
/// others move at the current average.
pub(crate) fn apply_movement(
    tx: &Tx<'_>,
    code: &str,
    date: Date,
    kind: MovementKind,
    quantity: Decimal,
    unit_cost: Option<Decimal>,
    reference: Option<String>,
) -> LedgerResult<(StockItem, StockMovement)> {
    if quantity.is_zero() {
        return Err(LedgerError::validation("quantity cannot be zero"));
    }
    let mut item: StockItem = fetch(tx, "stock item", code)?;
    if !item.active {
        return Err(LedgerError::validation(format!("stock item {} is inactive", code)));
    }

    let cost = if quantity > Decimal::ZERO {
        match unit_cost {
            Some(cost) if cost < Decimal::ZERO => {
                return Err(LedgerError::validation("unit cost cannot be negative"))
            }
            Some(cost) => {
                item.average_cost =
                    weighted_average_cost(item.quantity, item.average_cost, quantity, cost);
                cost
            }
            None => item.average_cost,
        }
    } else {
        let requested = -quantity;
        if item.quantity < requested && !settings(tx)?.allow_negative_stock {
            return Err(LedgerError::InsufficientStock {
                item: item.code.clone(),
                on_hand: item.quantity,
                requested,
            });
        }
        item.average_cost
    };
    item.quantity += quantity;

    let movement = StockMovement {
        id: Uuid::new_v4(),
        sequence: tx.next_number(MOVEMENT_SEQUENCE)?,
        item: item.code.clone(),
        date,
        kind,
        quantity,
        unit_cost: cost,
        reference,
    };
    tx.put(&item)?;
    tx.put(&movement)?;
    tracing::debug!(item = %item.code, kind = ?kind, %quantity, on_hand = %item.quantity, "Stock movement");
    Ok((item, movement))
}

pub struct StockControl {
    store: Arc<Store>,
}

impl StockControl {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn create_item(&self, cmd: CreateStockItemCommand) -> LedgerResult<StockItem> {
        require_code(&cmd.code, "item code")?;
        require_text(&cmd.description, "description")?;
        require_money(cmd.sales_price, "sales price")?;
        if cmd.reorder_level < Decimal::ZERO {
            return Err(LedgerError::validation("reorder level cannot be negative"));
        }

        self.store.transaction(|tx| {
            if tx.exists::<StockItem>(&cmd.code)? {
                return Err(LedgerError::already_exists("stock item", &cmd.code));
            }
            fetch::<VatCode>(tx, "VAT code", &cmd.vat_code)?;
            let item = StockItem {
                code: cmd.code.clone(),
                description: cmd.description.clone(),
                unit: cmd.unit.clone(),
                quantity: Decimal::ZERO,
                average_cost: Decimal::ZERO,
                sales_price: cmd.sales_price,
                reorder_level: cmd.reorder_level,
                vat_code: cmd.vat_code.clone(),
                active: true,
            };
            tx.put(&item)?;
            metrics::increment_counter!("acas_documents_created_total", "kind" => "stock_item");
            tracing::info!(item = %item.code, "Stock item created");
            Ok(item)
        })
    }

    pub fn update_item(&self, code: &str, cmd: UpdateStockItemCommand) -> LedgerResult<StockItem> {
        self.store.transaction(|tx| {
            let mut item: StockItem = fetch(tx, "stock item", code)?;
            if let Some(description) = cmd.description {
                require_text(&description, "description")?;
                item.description = description;
            }
            if let Some(unit) = cmd.unit {
                require_text(&unit, "unit")?;
                item.unit = unit;
            }
            if let Some(price) = cmd.sales_price {
                require_money(price, "sales price")?;
                item.sales_price = price;
            }
            if let Some(level) = cmd.reorder_level {
                if level < Decimal::ZERO {
                    return Err(LedgerError::validation("reorder level cannot be negative"));
                }
                item.reorder_level = level;
            }
            if let Some(vat_code) = cmd.vat_code {
                fetch::<VatCode>(tx, "VAT code", &vat_code)?;
                item.vat_code = vat_code;
            }
            if let Some(active) = cmd.active {
                item.active = active;
            }
            tx.put(&item)?;
            Ok(item)
        })
    }

    pub fn get_item(&self, code: &str) -> LedgerResult<StockItem> {
        fetch(self.store.as_ref(), "stock item", code)
    }

    pub fn list_items(&self, active_only: bool) -> LedgerResult<Vec<StockItem>> {
        Ok(self
            .store
            .list::<StockItem>()?
            .into_iter()
            .filter(|i| !active_only || i.active)
            .collect())
    }

    /// Goods in at `unit_cost`, re-averaging the item cost.
    pub fn receive_stock(&self, cmd: StockMovementCommand) -> LedgerResult<StockMovement> {
        if cmd.quantity <= Decimal::ZERO {
            return Err(LedgerError::validation("received quantity must be positive"));
        }
        let unit_cost = cmd
            .unit_cost
            .ok_or_else(|| LedgerError::validation("unit cost is required for a receipt"))?;
        self.store.transaction(|tx| {
            let (_, movement) = apply_movement(
                tx,
                &cmd.item,
                cmd.date,
                MovementKind::Receipt,
                cmd.quantity,
                Some(unit_cost),
                cmd.reference.clone(),
            )?;
            Ok(movement)
        })
    }

    /// Goods out at average cost.
    pub fn issue_stock(&self, cmd: StockMovementCommand) -> LedgerResult<StockMovement> {
        if cmd.quantity <= Decimal::ZERO {
            return Err(LedgerError::validation("issued quantity must be positive"));
        }
        self.store.transaction(|tx| {
            let (_, movement) = apply_movement(
                tx,
                &cmd.item,
                cmd.date,
                MovementKind::Issue,
                -cmd.quantity,
                None,
                cmd.reference.clone(),
            )?;
            Ok(movement)
        })
    }

    /// Stock-take correction by a signed quantity at average cost. With both
    /// the stock and stock adjustment accounts configured the value change
    /// is posted to the ledger.
    pub fn adjust_stock(&self, cmd: StockMovementCommand, user: &str) -> LedgerResult<StockMovement> {
        self.store.transaction(|tx| {
            let (item, movement) = apply_movement(
                tx,
                &cmd.item,
                cmd.date,
                MovementKind::Adjustment,
                cmd.quantity,
                None,
                cmd.reference.clone(),
            )?;

            let settings = settings(tx)?;
            if let (Some(stock), Some(adjustment)) =
                (settings.stock_account, settings.stock_adjustment_account)
            {
                let value = round_money(cmd.quantity.abs() * movement.unit_cost);
                if !value.is_zero() {
                    let lines = if cmd.quantity > Decimal::ZERO {
                        vec![
                            JournalLine::debit(stock, value),
                            JournalLine::credit(adjustment, value),
                        ]
                    } else {
                        vec![
                            JournalLine::debit(adjustment, value),
                            JournalLine::credit(stock, value),
                        ]
                    };
                    post_system_journal(
                        tx,
                        cmd.date,
                        format!("Stock adjustment {}", item.code),
                        JournalSource::Stock,
                        lines,
                        user,
                    )?;
                }
            }
            Ok(movement)
        })
    }

    pub fn movements(&self, code: &str) -> LedgerResult<Vec<StockMovement>> {
        self.get_item(code)?;
        Ok(self.store.list_prefix::<StockMovement>(&movement_prefix(code))?)
    }

    pub fn stock_valuation(&self) -> LedgerResult<StockValuation> {
        let lines: Vec<ValuationLine> = self
            .store
            .list::<StockItem>()?
            .into_iter()
            .filter(|i| !i.quantity.is_zero())
            .map(|i| ValuationLine {
                value: i.value(),
                item: i.code,
                description: i.description,
                quantity: i.quantity,
                average_cost: i.average_cost,
            })
            .collect();
        let total = lines.iter().map(|l| l.value).sum();
        Ok(StockValuation { lines, total })
    }

    /// Active items at or below their reorder level.
    pub fn reorder_report(&self) -> LedgerResult<Vec<ReorderLine>> {
        Ok(self
            .store
            .list::<StockItem>()?
            .into_iter()
            .filter(|i| i.active && i.quantity <= i.reorder_level)
            .map(|i| ReorderLine {
                shortfall: i.reorder_level - i.quantity,
                item: i.code,
                description: i.description,
                quantity: i.quantity,
                reorder_level: i.reorder_level,
            })
            .collect())
    }
}

impl Display for StockValuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Item", "Description", "Quantity", "Average cost", "Value"]);
        table.add_empty_row();
        for line in &self.lines {
            table.add_row(row![
                line.item,
                line.description,
                r->line.quantity,
                r->line.average_cost,
                r->line.value
            ]);
        }
        table.add_empty_row();
        table.add_row(row!["", "Total", "", "", r->self.total]);
        write!(f, "\nStock valuation\n{}\n", table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_weighted_average_cost() {
        assert_eq!(weighted_average_cost(dec!(10), dec!(2), dec!(10), dec!(4)), dec!(3));
        assert_eq!(
            weighted_average_cost(dec!(3), dec!(1), dec!(4), dec!(2)),
            dec!(1.5714)
        );
    }

    #[test]
    fn test_weighted_average_cost_from_empty_or_negative_stock() {
        assert_eq!(weighted_average_cost(dec!(0), dec!(0), dec!(5), dec!(2.5)), dec!(2.5));
        assert_eq!(weighted_average_cost(dec!(-2), dec!(3), dec!(5), dec!(4)), dec!(4));
    }
}
