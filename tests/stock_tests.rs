mod common;

use acas::{LedgerError, Services};
use acas_core::{MovementKind, StockMovementCommand, UpdateStockItemCommand};
use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::macros::date;

fn movement(item: &str, quantity: Decimal, unit_cost: Option<Decimal>) -> StockMovementCommand {
    StockMovementCommand {
        item: item.to_string(),
        date: date!(2024 - 01 - 10),
        quantity,
        unit_cost,
        reference: None,
    }
}

fn with_widgets() -> Services {
    let services = setup();
    stock_item(&services, "W1", dec!(9.99));
    services
}

#[test]
fn test_weighted_average_cost_across_receipts() {
    for (name, services) in backends() {
        company(&services);
        stock_item(&services, "W1", dec!(9.99));

        services.stock.receive_stock(movement("W1", dec!(10), Some(dec!(2)))).unwrap();
        services.stock.receive_stock(movement("W1", dec!(10), Some(dec!(4)))).unwrap();
        let item = services.stock.get_item("W1").unwrap();
        assert_eq!(item.quantity, dec!(20), "{}", name);
        assert_eq!(item.average_cost, dec!(3), "{}", name);

        let issue = services.stock.issue_stock(movement("W1", dec!(5), None)).unwrap();
        assert_eq!(issue.kind, MovementKind::Issue, "{}", name);
        assert_eq!(issue.quantity, dec!(-5), "{}", name);
        assert_eq!(issue.unit_cost, dec!(3), "{}", name);

        let item = services.stock.get_item("W1").unwrap();
        assert_eq!(item.quantity, dec!(15), "{}", name);
        assert_eq!(item.average_cost, dec!(3), "{}", name);

        let movements = services.stock.movements("W1").unwrap();
        assert_eq!(movements.len(), 3, "{}", name);
        assert!(movements.windows(2).all(|w| w[0].sequence < w[1].sequence), "{}", name);
    }
}

#[test]
fn test_issue_beyond_stock_on_hand() {
    let services = with_widgets();
    services.stock.receive_stock(movement("W1", dec!(3), Some(dec!(2)))).unwrap();

    match services.stock.issue_stock(movement("W1", dec!(4), None)) {
        Err(LedgerError::InsufficientStock { on_hand, requested, .. }) => {
            assert_eq!(on_hand, dec!(3));
            assert_eq!(requested, dec!(4));
        }
        other => panic!("Expected InsufficientStock, got {:?}", other),
    }
    assert_eq!(services.stock.movements("W1").unwrap().len(), 1);

    let mut settings = services.system.get_settings().unwrap();
    settings.allow_negative_stock = true;
    services.system.update_settings(settings).unwrap();
    services.stock.issue_stock(movement("W1", dec!(4), None)).unwrap();
    assert_eq!(services.stock.get_item("W1").unwrap().quantity, dec!(-1));

    services.stock.receive_stock(movement("W1", dec!(5), Some(dec!(6)))).unwrap();
    let item = services.stock.get_item("W1").unwrap();
    assert_eq!(item.quantity, dec!(4));
    assert_eq!(item.average_cost, dec!(6));
}

#[test]
fn test_movement_validation() {
    let services = with_widgets();
    assert!(matches!(
        services.stock.receive_stock(movement("W1", dec!(5), None)),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        services.stock.receive_stock(movement("W1", dec!(0), Some(dec!(1)))),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        services.stock.receive_stock(movement("W1", dec!(1), Some(dec!(-1)))),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        services.stock.issue_stock(movement("W1", dec!(-1), None)),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        services.stock.adjust_stock(movement("W1", dec!(0), None), USER),
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        services.stock.receive_stock(movement("W9", dec!(1), Some(dec!(1)))),
        Err(LedgerError::NotFound { .. })
    ));

    services
        .stock
        .update_item("W1", UpdateStockItemCommand {
            active: Some(false),
            ..Default::default()
        })
        .unwrap();
    assert!(matches!(
        services.stock.receive_stock(movement("W1", dec!(1), Some(dec!(1)))),
        Err(LedgerError::Validation(_))
    ));
}

#[test]
fn test_adjustments_post_value_to_ledger() {
    let services = with_widgets();
    services.stock.receive_stock(movement("W1", dec!(10), Some(dec!(3)))).unwrap();

    let loss = services.stock.adjust_stock(movement("W1", dec!(-2), None), USER).unwrap();
    assert_eq!(loss.kind, MovementKind::Adjustment);
    let gain = services.stock.adjust_stock(movement("W1", dec!(1), None), USER).unwrap();
    assert_eq!(gain.unit_cost, dec!(3));
    assert_eq!(services.stock.get_item("W1").unwrap().quantity, dec!(9));

    let adjustment = services.gl.account_balance(STOCK_ADJUSTMENT, "2024-01").unwrap();
    assert_eq!(adjustment.debits, dec!(6));
    assert_eq!(adjustment.credits, dec!(3));
    let stock = services.gl.account_balance(STOCK, "2024-01").unwrap();
    assert_eq!(stock.closing(), dec!(-3));
    assert!(services.gl.trial_balance(None).unwrap().balanced);
}

#[test]
fn test_adjustment_outside_current_period_rolls_back() {
    let services = with_widgets();
    services.stock.receive_stock(movement("W1", dec!(10), Some(dec!(3)))).unwrap();
    let mut cmd = movement("W1", dec!(-2), None);
    cmd.date = date!(2024 - 02 - 10);
    assert!(matches!(
        services.stock.adjust_stock(cmd, USER),
        Err(LedgerError::PeriodNotCurrent { .. })
    ));
    assert_eq!(services.stock.get_item("W1").unwrap().quantity, dec!(10));
    assert_eq!(services.stock.movements("W1").unwrap().len(), 1);
}

#[test]
fn test_valuation_and_reorder_reports() {
    let services = with_widgets();
    stock_item(&services, "W2", dec!(5));
    stock_item(&services, "W3", dec!(5));
    services.stock.receive_stock(movement("W1", dec!(12), Some(dec!(2.5)))).unwrap();
    services.stock.receive_stock(movement("W2", dec!(3), Some(dec!(1.333)))).unwrap();

    let valuation = services.stock.stock_valuation().unwrap();
    assert_eq!(valuation.lines.len(), 2);
    assert_eq!(valuation.lines[0].value, dec!(30));
    assert_eq!(valuation.lines[1].value, dec!(4));
    assert_eq!(valuation.total, dec!(34));
    assert!(valuation.to_string().contains("Stock valuation"));

    let reorder = services.stock.reorder_report().unwrap();
    let items: Vec<&str> = reorder.iter().map(|l| l.item.as_str()).collect();
    assert_eq!(items, vec!["W2", "W3"]);
    assert_eq!(reorder[0].shortfall, dec!(2));
    assert_eq!(reorder[1].shortfall, dec!(5));
}

#[test]
fn test_item_master_rules() {
    let services = with_widgets();
    assert!(matches!(
        services.stock.create_item(acas_core::CreateStockItemCommand {
            code: "W1".to_string(),
            description: "Duplicate".to_string(),
            unit: "EACH".to_string(),
            sales_price: dec!(1),
            reorder_level: dec!(0),
            vat_code: "S".to_string(),
        }),
        Err(LedgerError::AlreadyExists { .. })
    ));
    assert!(matches!(
        services.stock.create_item(acas_core::CreateStockItemCommand {
            code: "W9".to_string(),
            description: "Unknown VAT".to_string(),
            unit: "EACH".to_string(),
            sales_price: dec!(1),
            reorder_level: dec!(0),
            vat_code: "X".to_string(),
        }),
        Err(LedgerError::NotFound { .. })
    ));
    assert!(matches!(
        services.system.delete_vat_code("S"),
        Err(LedgerError::Conflict(_))
    ));
    services.system.delete_vat_code("Z").unwrap();

    let updated = services
        .stock
        .update_item("W1", UpdateStockItemCommand {
            sales_price: Some(dec!(12.50)),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(updated.sales_price, dec!(12.50));
    assert_eq!(services.stock.list_items(true).unwrap().len(), 1);
}
