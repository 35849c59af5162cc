//! Purchase ledger: suppliers, purchase orders, goods receipts, supplier
//! invoices and payments.

use std::sync::Arc;

use acas_core::{
    number_key, Allocation, CreatePurchaseOrderCommand, CreateSupplierCommand, GoodsReceipt, InvoiceStatus,
    JournalLine, JournalSource, MovementKind, OrderLineCommand, Payment, PurchaseInvoice,
    PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus, Reader, ReceiveGoodsCommand,
    RecordPaymentCommand, RegisterPurchaseInvoiceCommand, Store, Supplier, Tx,
    UpdateOrderCommand, UpdateSupplierCommand,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use super::{
    aging::{aged_report, AgedReport, OpenItems},
    allocate, configured, fetch,
    gl::post_system_journal,
    price_lines, require_code, require_money, require_text, settings,
    stock::apply_movement,
    PriceBasis,
};
use crate::error::{LedgerError, LedgerResult};

const ORDER_SEQUENCE: &str = "purchase_order";
const GRN_SEQUENCE: &str = "grn";
const INVOICE_SEQUENCE: &str = "purchase_invoice";

/// Filter for [`PurchaseLedger::list_orders`] and [`PurchaseLedger::list_invoices`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseFilter {
    pub supplier: Option<String>,
    pub order_status: Option<PurchaseOrderStatus>,
    pub invoice_status: Option<InvoiceStatus>,
}

fn order_lines(r: &impl Reader, lines: &[OrderLineCommand]) -> LedgerResult<Vec<PurchaseOrderLine>> {
    Ok(price_lines(r, lines, PriceBasis::Cost)?
        .into_iter()
        .map(|l| PurchaseOrderLine {
            item: l.item,
            description: l.description,
            quantity: l.quantity,
            unit_cost: l.unit_price,
            vat_code: l.vat_code,
            net: l.net,
            vat: l.vat,
            received: Decimal::ZERO,
        })
        .collect())
}

fn set_totals(order: &mut PurchaseOrder) {
    order.net = order.lines.iter().map(|l| l.net).sum();
    order.vat = order.lines.iter().map(|l| l.vat).sum();
    order.gross = order.net + order.vat;
}

fn active_supplier(r: &impl Reader, code: &str) -> LedgerResult<Supplier> {
    let supplier: Supplier = fetch(r, "supplier", code)?;
    if !supplier.active {
        return Err(LedgerError::validation(format!("supplier {} is inactive", code)));
    }
    Ok(supplier)
}

fn load_order(r: &impl Reader, number: u64) -> LedgerResult<PurchaseOrder> {
    fetch(r, "purchase order", &number_key(number))
}

fn load_order_in(
    tx: &Tx<'_>,
    number: u64,
    allowed: &[PurchaseOrderStatus],
) -> LedgerResult<PurchaseOrder> {
    let order = load_order(tx, number)?;
    if !allowed.contains(&order.status) {
        return Err(LedgerError::conflict(format!(
            "purchase order {} is {:?}",
            number, order.status
        )));
    }
    Ok(order)
}

/// Settles a new invoice from earlier payments left on account, oldest
/// first.
fn apply_unallocated_payments(tx: &Tx<'_>, invoice: &mut PurchaseInvoice) -> LedgerResult<()> {
    let mut payments: Vec<Payment> = tx
        .list::<Payment>()?
        .into_iter()
        .filter(|p| p.supplier == invoice.supplier && p.unallocated > Decimal::ZERO)
        .collect();
    payments.sort_by_key(|p| (p.date, p.id));

    for mut payment in payments {
        let outstanding = invoice.outstanding();
        if outstanding <= Decimal::ZERO {
            break;
        }
        let amount = payment.unallocated.min(outstanding);
        payment.unallocated -= amount;
        payment.allocations.push(Allocation {
            invoice: invoice.number,
            amount,
        });
        tx.put(&payment)?;
        invoice.paid += amount;
    }
    if invoice.outstanding().is_zero() {
        invoice.status = InvoiceStatus::Paid;
    }
    Ok(())
}

pub struct PurchaseLedger {
    store: Arc<Store>,
}

impl PurchaseLedger {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn create_supplier(&self, cmd: CreateSupplierCommand) -> LedgerResult<Supplier> {
        require_code(&cmd.code, "supplier code")?;
        require_text(&cmd.name, "supplier name")?;

        self.store.transaction(|tx| {
            if tx.exists::<Supplier>(&cmd.code)? {
                return Err(LedgerError::already_exists("supplier", &cmd.code));
            }
            let supplier = Supplier {
                code: cmd.code.clone(),
                name: cmd.name.clone(),
                address: cmd.address.clone(),
                email: cmd.email.clone(),
                balance: Decimal::ZERO,
                active: true,
            };
            tx.put(&supplier)?;
            metrics::increment_counter!("acas_documents_created_total", "kind" => "supplier");
            tracing::info!(supplier = %supplier.code, "Supplier created");
            Ok(supplier)
        })
    }

    pub fn update_supplier(&self, code: &str, cmd: UpdateSupplierCommand) -> LedgerResult<Supplier> {
        self.store.transaction(|tx| {
            let mut supplier: Supplier = fetch(tx, "supplier", code)?;
            if let Some(name) = cmd.name {
                require_text(&name, "supplier name")?;
                supplier.name = name;
            }
            if cmd.address.is_some() {
                supplier.address = cmd.address;
            }
            if cmd.email.is_some() {
                supplier.email = cmd.email;
            }
            tx.put(&supplier)?;
            Ok(supplier)
        })
    }

    pub fn deactivate_supplier(&self, code: &str) -> LedgerResult<Supplier> {
        self.store.transaction(|tx| {
            let mut supplier: Supplier = fetch(tx, "supplier", code)?;
            supplier.active = false;
            tx.put(&supplier)?;
            tracing::info!(supplier = code, "Supplier deactivated");
            Ok(supplier)
        })
    }

    pub fn get_supplier(&self, code: &str) -> LedgerResult<Supplier> {
        fetch(self.store.as_ref(), "supplier", code)
    }

    pub fn list_suppliers(&self, active_only: bool) -> LedgerResult<Vec<Supplier>> {
        Ok(self
            .store
            .list::<Supplier>()?
            .into_iter()
            .filter(|s| !active_only || s.active)
            .collect())
    }

    pub fn create_order(&self, cmd: CreatePurchaseOrderCommand) -> LedgerResult<PurchaseOrder> {
        self.store.transaction(|tx| {
            active_supplier(tx, &cmd.supplier)?;
            let mut order = PurchaseOrder {
                number: 0,
                supplier: cmd.supplier.clone(),
                date: cmd.date,
                reference: cmd.reference.clone(),
                lines: order_lines(tx, &cmd.lines)?,
                net: Decimal::ZERO,
                vat: Decimal::ZERO,
                gross: Decimal::ZERO,
                status: PurchaseOrderStatus::Draft,
                invoice: None,
                authorised_by: None,
            };
            set_totals(&mut order);
            order.number = tx.next_number(ORDER_SEQUENCE)?;
            tx.put(&order)?;
            metrics::increment_counter!("acas_documents_created_total", "kind" => "purchase_order");
            tracing::info!(order = order.number, supplier = %order.supplier, gross = %order.gross, "Purchase order created");
            Ok(order)
        })
    }

    pub fn update_order(&self, number: u64, cmd: UpdateOrderCommand) -> LedgerResult<PurchaseOrder> {
        self.store.transaction(|tx| {
            let mut order = load_order_in(tx, number, &[PurchaseOrderStatus::Draft])?;
            if let Some(date) = cmd.date {
                order.date = date;
            }
            if cmd.reference.is_some() {
                order.reference = cmd.reference;
            }
            if let Some(lines) = cmd.lines {
                order.lines = order_lines(tx, &lines)?;
                set_totals(&mut order);
            }
            tx.put(&order)?;
            Ok(order)
        })
    }

    pub fn get_order(&self, number: u64) -> LedgerResult<PurchaseOrder> {
        load_order(self.store.as_ref(), number)
    }

    pub fn list_orders(&self, filter: &PurchaseFilter) -> LedgerResult<Vec<PurchaseOrder>> {
        Ok(self
            .store
            .list::<PurchaseOrder>()?
            .into_iter()
            .filter(|o| filter.supplier.as_ref().map_or(true, |s| &o.supplier == s))
            .filter(|o| filter.order_status.map_or(true, |s| o.status == s))
            .collect())
    }

    pub fn authorise_order(&self, number: u64, user: &str) -> LedgerResult<PurchaseOrder> {
        self.store.transaction(|tx| {
            let mut order = load_order_in(tx, number, &[PurchaseOrderStatus::Draft])?;
            active_supplier(tx, &order.supplier)?;
            order.status = PurchaseOrderStatus::Authorised;
            order.authorised_by = Some(user.to_string());
            tx.put(&order)?;
            tracing::info!(order = number, user, "Purchase order authorised");
            Ok(order)
        })
    }

    /// Cancels an order nothing has been received against.
    pub fn cancel_order(&self, number: u64) -> LedgerResult<PurchaseOrder> {
        self.store.transaction(|tx| {
            let mut order = load_order_in(
                tx,
                number,
                &[PurchaseOrderStatus::Draft, PurchaseOrderStatus::Authorised],
            )?;
            order.status = PurchaseOrderStatus::Cancelled;
            tx.put(&order)?;
            tracing::info!(order = number, "Purchase order cancelled");
            Ok(order)
        })
    }

    /// Books goods in against an authorised order. Stock lines are received
    /// into stock at the order cost.
    pub fn receive_goods(
        &self,
        number: u64,
        cmd: ReceiveGoodsCommand,
        user: &str,
    ) -> LedgerResult<GoodsReceipt> {
        if cmd.lines.is_empty() {
            return Err(LedgerError::validation("a goods receipt needs at least one line"));
        }

        self.store.transaction(|tx| {
            let mut order = load_order_in(
                tx,
                number,
                &[PurchaseOrderStatus::Authorised, PurchaseOrderStatus::PartReceived],
            )?;
            let grn_number = tx.next_number(GRN_SEQUENCE)?;
            let reference = format!("GRN{}", grn_number);

            for (i, received) in cmd.lines.iter().enumerate() {
                if cmd.lines[..i].iter().any(|l| l.line == received.line) {
                    return Err(LedgerError::validation(format!(
                        "order line {} appears more than once",
                        received.line
                    )));
                }
                let line = order.lines.get_mut(received.line).ok_or_else(|| {
                    LedgerError::validation(format!(
                        "purchase order {} has no line {}",
                        number, received.line
                    ))
                })?;
                if received.quantity <= Decimal::ZERO || received.quantity > line.outstanding() {
                    return Err(LedgerError::validation(format!(
                        "received quantity for line {} must be between 0 and {}",
                        received.line,
                        line.outstanding()
                    )));
                }
                line.received += received.quantity;
                if let Some(ref item) = line.item {
                    apply_movement(
                        tx,
                        item,
                        cmd.date,
                        MovementKind::Receipt,
                        received.quantity,
                        Some(line.unit_cost),
                        Some(reference.clone()),
                    )?;
                }
            }

            order.status = if order.fully_received() {
                PurchaseOrderStatus::Received
            } else {
                PurchaseOrderStatus::PartReceived
            };
            tx.put(&order)?;

            let grn = GoodsReceipt {
                number: grn_number,
                order: number,
                date: cmd.date,
                lines: cmd.lines.clone(),
                received_by: user.to_string(),
            };
            tx.put(&grn)?;
            metrics::increment_counter!("acas_documents_created_total", "kind" => "goods_receipt");
            tracing::info!(grn = grn_number, order = number, status = ?order.status, "Goods received");
            Ok(grn)
        })
    }

    pub fn list_goods_receipts(&self, order: Option<u64>) -> LedgerResult<Vec<GoodsReceipt>> {
        Ok(self
            .store
            .list::<GoodsReceipt>()?
            .into_iter()
            .filter(|g| order.map_or(true, |o| g.order == o))
            .collect())
    }

    /// Registers a supplier invoice either for a fully received order or for
    /// free-standing lines, and posts it. Stock lines on free-standing
    /// invoices are received into stock at the invoiced cost.
    pub fn register_invoice(
        &self,
        cmd: RegisterPurchaseInvoiceCommand,
        user: &str,
    ) -> LedgerResult<PurchaseInvoice> {
        require_text(&cmd.supplier_reference, "supplier reference")?;

        self.store.transaction(|tx| {
            let mut supplier = active_supplier(tx, &cmd.supplier)?;
            if tx.list::<PurchaseInvoice>()?.iter().any(|i| {
                i.supplier == supplier.code && i.supplier_reference == cmd.supplier_reference
            }) {
                return Err(LedgerError::already_exists(
                    "supplier invoice",
                    format!("{}/{}", supplier.code, cmd.supplier_reference),
                ));
            }

            let settings = settings(tx)?;
            let creditors =
                configured(&settings.creditors_control_account, "creditors_control_account")?;
            let purchases = configured(&settings.purchases_account, "purchases_account")?;
            let vat_input = configured(&settings.vat_input_account, "vat_input_account")?;
            let stock = settings.stock_account.clone().unwrap_or_else(|| purchases.clone());

            let invoice_number = tx.next_number(INVOICE_SEQUENCE)?;
            let lines: Vec<PurchaseOrderLine> = match (&cmd.order, &cmd.lines) {
                (Some(order_number), None) => {
                    let mut order =
                        load_order_in(tx, *order_number, &[PurchaseOrderStatus::Received])?;
                    if order.supplier != supplier.code {
                        return Err(LedgerError::validation(format!(
                            "purchase order {} belongs to supplier {}",
                            order_number, order.supplier
                        )));
                    }
                    order.status = PurchaseOrderStatus::Invoiced;
                    order.invoice = Some(invoice_number);
                    tx.put(&order)?;
                    order.lines
                }
                (None, Some(lines)) => {
                    let lines = order_lines(tx, lines)?;
                    let reference = format!("PI{}", invoice_number);
                    for line in &lines {
                        if let Some(ref item) = line.item {
                            apply_movement(
                                tx,
                                item,
                                cmd.date,
                                MovementKind::Receipt,
                                line.quantity,
                                Some(line.unit_cost),
                                Some(reference.clone()),
                            )?;
                        }
                    }
                    lines
                }
                _ => {
                    return Err(LedgerError::validation(
                        "an invoice needs either an order or lines, not both",
                    ))
                }
            };

            let stock_net: Decimal = lines.iter().filter(|l| l.item.is_some()).map(|l| l.net).sum();
            let other_net: Decimal = lines.iter().filter(|l| l.item.is_none()).map(|l| l.net).sum();
            let net = stock_net + other_net;
            let vat: Decimal = lines.iter().map(|l| l.vat).sum();
            let gross = net + vat;

            let journal = if gross.is_zero() {
                None
            } else {
                let journal = post_system_journal(
                    tx,
                    cmd.date,
                    format!("Purchase invoice {} {}", cmd.supplier_reference, supplier.name),
                    JournalSource::Purchase,
                    vec![
                        JournalLine::debit(purchases, other_net),
                        JournalLine::debit(stock, stock_net),
                        JournalLine::debit(vat_input, vat),
                        JournalLine::credit(creditors, gross),
                    ],
                    user,
                )?;
                Some(journal.number)
            };

            let mut invoice = PurchaseInvoice {
                number: invoice_number,
                supplier: supplier.code.clone(),
                supplier_reference: cmd.supplier_reference.clone(),
                order: cmd.order,
                date: cmd.date,
                net,
                vat,
                gross,
                paid: Decimal::ZERO,
                status: InvoiceStatus::Open,
                journal,
            };
            apply_unallocated_payments(tx, &mut invoice)?;
            tx.put(&invoice)?;
            supplier.balance += gross;
            tx.put(&supplier)?;

            metrics::increment_counter!("acas_documents_created_total", "kind" => "purchase_invoice");
            tracing::info!(invoice = invoice_number, supplier = %supplier.code, %gross, "Purchase invoice registered");
            Ok(invoice)
        })
    }

    pub fn get_invoice(&self, number: u64) -> LedgerResult<PurchaseInvoice> {
        fetch(self.store.as_ref(), "purchase invoice", &number_key(number))
    }

    pub fn list_invoices(&self, filter: &PurchaseFilter) -> LedgerResult<Vec<PurchaseInvoice>> {
        Ok(self
            .store
            .list::<PurchaseInvoice>()?
            .into_iter()
            .filter(|i| filter.supplier.as_ref().map_or(true, |s| &i.supplier == s))
            .filter(|i| filter.invoice_status.map_or(true, |s| i.status == s))
            .collect())
    }

    /// Pays a supplier and settles invoices, oldest first unless allocations
    /// are given.
    pub fn record_payment(&self, cmd: RecordPaymentCommand, user: &str) -> LedgerResult<Payment> {
        if cmd.amount <= Decimal::ZERO {
            return Err(LedgerError::validation("payment amount must be positive"));
        }
        require_money(cmd.amount, "payment amount")?;

        self.store.transaction(|tx| {
            let mut supplier: Supplier = fetch(tx, "supplier", &cmd.supplier)?;
            let settings = settings(tx)?;
            let bank = configured(&settings.bank_account, "bank_account")?;
            let creditors =
                configured(&settings.creditors_control_account, "creditors_control_account")?;

            let mut open: Vec<PurchaseInvoice> = tx
                .list::<PurchaseInvoice>()?
                .into_iter()
                .filter(|i| i.supplier == supplier.code && i.status == InvoiceStatus::Open)
                .collect();
            open.sort_by_key(|i| (i.date, i.number));
            let outstanding: Vec<(u64, Decimal)> =
                open.iter().map(|i| (i.number, i.outstanding())).collect();
            let (allocations, unallocated) =
                allocate(cmd.amount, &outstanding, cmd.allocations.as_deref())?;

            for alloc in &allocations {
                if let Some(invoice) = open.iter_mut().find(|i| i.number == alloc.invoice) {
                    invoice.paid += alloc.amount;
                    if invoice.outstanding().is_zero() {
                        invoice.status = InvoiceStatus::Paid;
                    }
                    tx.put(&*invoice)?;
                }
            }

            let journal = post_system_journal(
                tx,
                cmd.date,
                format!("Payment to {}", supplier.name),
                JournalSource::Purchase,
                vec![
                    JournalLine::debit(creditors, cmd.amount),
                    JournalLine::credit(bank, cmd.amount),
                ],
                user,
            )?;

            let payment = Payment {
                id: Uuid::new_v4(),
                supplier: supplier.code.clone(),
                date: cmd.date,
                amount: cmd.amount,
                reference: cmd.reference.clone(),
                allocations,
                unallocated,
                journal: journal.number,
            };
            tx.put(&payment)?;
            supplier.balance -= cmd.amount;
            tx.put(&supplier)?;

            metrics::increment_counter!("acas_documents_created_total", "kind" => "payment");
            tracing::info!(supplier = %supplier.code, amount = %cmd.amount, "Payment recorded");
            Ok(payment)
        })
    }

    pub fn list_payments(&self, supplier: Option<&str>) -> LedgerResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .store
            .list::<Payment>()?
            .into_iter()
            .filter(|p| supplier.map_or(true, |s| p.supplier == s))
            .collect();
        payments.sort_by_key(|p| p.date);
        Ok(payments)
    }

    pub fn aged_creditors(&self, as_at: Date) -> LedgerResult<AgedReport> {
        let invoices = self.store.list::<PurchaseInvoice>()?;
        let payments = self.store.list::<Payment>()?;
        let accounts = self
            .store
            .list::<Supplier>()?
            .into_iter()
            .map(|s| OpenItems {
                items: invoices
                    .iter()
                    .filter(|i| i.supplier == s.code && i.status == InvoiceStatus::Open)
                    .map(|i| (i.date, i.outstanding()))
                    .chain(
                        payments
                            .iter()
                            .filter(|p| p.supplier == s.code && p.unallocated > Decimal::ZERO)
                            .map(|p| (p.date, -p.unallocated)),
                    )
                    .collect(),
                account: s.code,
                name: s.name,
            })
            .collect();
        Ok(aged_report(as_at, accounts))
    }
}
