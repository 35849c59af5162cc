//! Sales ledger: customers, sales orders, invoicing, receipts and debtor reports.

use std::{fmt::Display, sync::Arc};

use acas_core::{
    number_key, Allocation, round_money, CreateCustomerCommand, CreateSalesOrderCommand, Customer,
    InvoiceOrderCommand, InvoiceStatus, JournalLine, JournalSource, MovementKind,
    OrderLineCommand, Reader, Receipt, RecordReceiptCommand, SalesInvoice, SalesOrder,
    SalesOrderLine, SalesOrderStatus, Store, Tx, UpdateCustomerCommand, UpdateOrderCommand,
};
use prettytable::{row, Table};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
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

const ORDER_SEQUENCE: &str = "sales_order";
const INVOICE_SEQUENCE: &str = "sales_invoice";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerStatementLine {
    pub date: Date,
    pub document: String,
    pub debit: Decimal,
    pub credit: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerStatement {
    pub customer: String,
    pub name: String,
    pub lines: Vec<CustomerStatementLine>,
    pub balance: Decimal,
}

/// Filter for [`SalesLedger::list_orders`] and [`SalesLedger::list_invoices`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SalesFilter {
    pub customer: Option<String>,
    pub order_status: Option<SalesOrderStatus>,
    pub invoice_status: Option<InvoiceStatus>,
}

fn order_lines(r: &impl Reader, lines: &[OrderLineCommand]) -> LedgerResult<Vec<SalesOrderLine>> {
    Ok(price_lines(r, lines, PriceBasis::Selling)?
        .into_iter()
        .map(|l| SalesOrderLine {
            item: l.item,
            description: l.description,
            quantity: l.quantity,
            unit_price: l.unit_price,
            vat_code: l.vat_code,
            net: l.net,
            vat: l.vat,
        })
        .collect())
}

fn set_totals(order: &mut SalesOrder) {
    order.net = order.lines.iter().map(|l| l.net).sum();
    order.vat = order.lines.iter().map(|l| l.vat).sum();
    order.gross = order.net + order.vat;
}

fn active_customer(r: &impl Reader, code: &str) -> LedgerResult<Customer> {
    let customer: Customer = fetch(r, "customer", code)?;
    if !customer.active {
        return Err(LedgerError::validation(format!("customer {} is inactive", code)));
    }
    Ok(customer)
}

fn load_order(r: &impl Reader, number: u64) -> LedgerResult<SalesOrder> {
    fetch(r, "sales order", &number_key(number))
}

fn load_order_in(tx: &Tx<'_>, number: u64, allowed: &[SalesOrderStatus]) -> LedgerResult<SalesOrder> {
    let order = load_order(tx, number)?;
    if !allowed.contains(&order.status) {
        return Err(LedgerError::conflict(format!(
            "sales order {} is {:?}",
            number, order.status
        )));
    }
    Ok(order)
}

/// Settles a new invoice from earlier receipts left on account, oldest
/// first. The cash is already in the ledger so nothing is posted.
fn apply_unallocated_receipts(tx: &Tx<'_>, invoice: &mut SalesInvoice) -> LedgerResult<()> {
    let mut receipts: Vec<Receipt> = tx
        .list::<Receipt>()?
        .into_iter()
        .filter(|r| r.customer == invoice.customer && r.unallocated > Decimal::ZERO)
        .collect();
    receipts.sort_by_key(|r| (r.date, r.id));

    for mut receipt in receipts {
        let outstanding = invoice.outstanding();
        if outstanding <= Decimal::ZERO {
            break;
        }
        let amount = receipt.unallocated.min(outstanding);
        receipt.unallocated -= amount;
        receipt.allocations.push(Allocation {
            invoice: invoice.number,
            amount,
        });
        tx.put(&receipt)?;
        invoice.paid += amount;
    }
    if invoice.outstanding().is_zero() {
        invoice.status = InvoiceStatus::Paid;
    }
    Ok(())
}

pub struct SalesLedger {
    store: Arc<Store>,
}

impl SalesLedger {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn create_customer(&self, cmd: CreateCustomerCommand) -> LedgerResult<Customer> {
        require_code(&cmd.code, "customer code")?;
        require_text(&cmd.name, "customer name")?;
        require_money(cmd.credit_limit, "credit limit")?;

        self.store.transaction(|tx| {
            if tx.exists::<Customer>(&cmd.code)? {
                return Err(LedgerError::already_exists("customer", &cmd.code));
            }
            let customer = Customer {
                code: cmd.code.clone(),
                name: cmd.name.clone(),
                address: cmd.address.clone(),
                email: cmd.email.clone(),
                credit_limit: cmd.credit_limit,
                balance: Decimal::ZERO,
                active: true,
            };
            tx.put(&customer)?;
            metrics::increment_counter!("acas_documents_created_total", "kind" => "customer");
            tracing::info!(customer = %customer.code, "Customer created");
            Ok(customer)
        })
    }

    pub fn update_customer(&self, code: &str, cmd: UpdateCustomerCommand) -> LedgerResult<Customer> {
        self.store.transaction(|tx| {
            let mut customer: Customer = fetch(tx, "customer", code)?;
            if let Some(name) = cmd.name {
                require_text(&name, "customer name")?;
                customer.name = name;
            }
            if cmd.address.is_some() {
                customer.address = cmd.address;
            }
            if cmd.email.is_some() {
                customer.email = cmd.email;
            }
            if let Some(limit) = cmd.credit_limit {
                require_money(limit, "credit limit")?;
                customer.credit_limit = limit;
            }
            tx.put(&customer)?;
            Ok(customer)
        })
    }

    pub fn deactivate_customer(&self, code: &str) -> LedgerResult<Customer> {
        self.store.transaction(|tx| {
            let mut customer: Customer = fetch(tx, "customer", code)?;
            customer.active = false;
            tx.put(&customer)?;
            tracing::info!(customer = code, "Customer deactivated");
            Ok(customer)
        })
    }

    pub fn get_customer(&self, code: &str) -> LedgerResult<Customer> {
        fetch(self.store.as_ref(), "customer", code)
    }

    pub fn list_customers(&self, active_only: bool) -> LedgerResult<Vec<Customer>> {
        Ok(self
            .store
            .list::<Customer>()?
            .into_iter()
            .filter(|c| !active_only || c.active)
            .collect())
    }

    pub fn create_order(&self, cmd: CreateSalesOrderCommand) -> LedgerResult<SalesOrder> {
        self.store.transaction(|tx| {
            active_customer(tx, &cmd.customer)?;
            let mut order = SalesOrder {
                number: 0,
                customer: cmd.customer.clone(),
                date: cmd.date,
                reference: cmd.reference.clone(),
                lines: order_lines(tx, &cmd.lines)?,
                net: Decimal::ZERO,
                vat: Decimal::ZERO,
                gross: Decimal::ZERO,
                status: SalesOrderStatus::Draft,
                invoice: None,
                authorised_by: None,
            };
            set_totals(&mut order);
            order.number = tx.next_number(ORDER_SEQUENCE)?;
            tx.put(&order)?;
            metrics::increment_counter!("acas_documents_created_total", "kind" => "sales_order");
            tracing::info!(order = order.number, customer = %order.customer, gross = %order.gross, "Sales order created");
            Ok(order)
        })
    }

    pub fn update_order(&self, number: u64, cmd: UpdateOrderCommand) -> LedgerResult<SalesOrder> {
        self.store.transaction(|tx| {
            let mut order = load_order_in(tx, number, &[SalesOrderStatus::Draft])?;
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

    pub fn get_order(&self, number: u64) -> LedgerResult<SalesOrder> {
        load_order(self.store.as_ref(), number)
    }

    pub fn list_orders(&self, filter: &SalesFilter) -> LedgerResult<Vec<SalesOrder>> {
        Ok(self
            .store
            .list::<SalesOrder>()?
            .into_iter()
            .filter(|o| filter.customer.as_ref().map_or(true, |c| &o.customer == c))
            .filter(|o| filter.order_status.map_or(true, |s| o.status == s))
            .collect())
    }

    /// Approves a draft order once the customer's balance plus the order
    /// stays within their credit limit.
    pub fn authorise_order(&self, number: u64, user: &str) -> LedgerResult<SalesOrder> {
        self.store.transaction(|tx| {
            let mut order = load_order_in(tx, number, &[SalesOrderStatus::Draft])?;
            let customer = active_customer(tx, &order.customer)?;
            if !customer.has_credit_for(order.gross) {
                return Err(LedgerError::CreditLimitExceeded {
                    customer: customer.code,
                    limit: customer.credit_limit,
                    exposure: customer.balance + order.gross,
                });
            }
            order.status = SalesOrderStatus::Authorised;
            order.authorised_by = Some(user.to_string());
            tx.put(&order)?;
            tracing::info!(order = number, user, "Sales order authorised");
            Ok(order)
        })
    }

    pub fn cancel_order(&self, number: u64) -> LedgerResult<SalesOrder> {
        self.store.transaction(|tx| {
            let mut order = load_order_in(
                tx,
                number,
                &[SalesOrderStatus::Draft, SalesOrderStatus::Authorised],
            )?;
            order.status = SalesOrderStatus::Cancelled;
            tx.put(&order)?;
            tracing::info!(order = number, "Sales order cancelled");
            Ok(order)
        })
    }

    /// Invoices an authorised order in full: issues its stock lines, raises
    /// the invoice and posts it to the ledger.
    pub fn invoice_order(
        &self,
        number: u64,
        cmd: InvoiceOrderCommand,
        user: &str,
    ) -> LedgerResult<SalesInvoice> {
        self.store.transaction(|tx| {
            let mut order = load_order_in(tx, number, &[SalesOrderStatus::Authorised])?;
            let mut customer: Customer = fetch(tx, "customer", &order.customer)?;
            let settings = settings(tx)?;
            let debtors = configured(&settings.debtors_control_account, "debtors_control_account")?;
            let sales = configured(&settings.sales_account, "sales_account")?;
            let vat_output = configured(&settings.vat_output_account, "vat_output_account")?;

            let invoice_number = tx.next_number(INVOICE_SEQUENCE)?;
            let reference = format!("SI{}", invoice_number);

            let mut cost_of_sales = Decimal::ZERO;
            for line in &order.lines {
                if let Some(ref item) = line.item {
                    let (_, movement) = apply_movement(
                        tx,
                        item,
                        cmd.date,
                        MovementKind::Issue,
                        -line.quantity,
                        None,
                        Some(reference.clone()),
                    )?;
                    cost_of_sales += round_money(line.quantity * movement.unit_cost);
                }
            }

            let journal = if order.gross.is_zero() {
                None
            } else {
                let journal = post_system_journal(
                    tx,
                    cmd.date,
                    format!("Sales invoice {} {}", invoice_number, customer.name),
                    JournalSource::Sales,
                    vec![
                        JournalLine::debit(debtors, order.gross),
                        JournalLine::credit(sales, order.net),
                        JournalLine::credit(vat_output, order.vat),
                    ],
                    user,
                )?;
                Some(journal.number)
            };

            if let (Some(stock), Some(purchases)) =
                (settings.stock_account.clone(), settings.purchases_account.clone())
            {
                if !cost_of_sales.is_zero() {
                    post_system_journal(
                        tx,
                        cmd.date,
                        format!("Cost of sales {}", reference),
                        JournalSource::Stock,
                        vec![
                            JournalLine::debit(purchases, cost_of_sales),
                            JournalLine::credit(stock, cost_of_sales),
                        ],
                        user,
                    )?;
                }
            }

            let mut invoice = SalesInvoice {
                number: invoice_number,
                customer: customer.code.clone(),
                order: Some(order.number),
                date: cmd.date,
                net: order.net,
                vat: order.vat,
                gross: order.gross,
                paid: Decimal::ZERO,
                status: InvoiceStatus::Open,
                journal,
            };
            apply_unallocated_receipts(tx, &mut invoice)?;
            tx.put(&invoice)?;

            customer.balance += invoice.gross;
            tx.put(&customer)?;
            order.status = SalesOrderStatus::Invoiced;
            order.invoice = Some(invoice_number);
            tx.put(&order)?;

            metrics::increment_counter!("acas_documents_created_total", "kind" => "sales_invoice");
            tracing::info!(invoice = invoice_number, order = number, gross = %invoice.gross, "Sales invoice raised");
            Ok(invoice)
        })
    }

    pub fn get_invoice(&self, number: u64) -> LedgerResult<SalesInvoice> {
        fetch(self.store.as_ref(), "sales invoice", &number_key(number))
    }

    pub fn list_invoices(&self, filter: &SalesFilter) -> LedgerResult<Vec<SalesInvoice>> {
        Ok(self
            .store
            .list::<SalesInvoice>()?
            .into_iter()
            .filter(|i| filter.customer.as_ref().map_or(true, |c| &i.customer == c))
            .filter(|i| filter.invoice_status.map_or(true, |s| i.status == s))
            .collect())
    }

    /// Banks a customer receipt and settles invoices with it. Any part not
    /// allocated stays on the account as a credit.
    pub fn record_receipt(&self, cmd: RecordReceiptCommand, user: &str) -> LedgerResult<Receipt> {
        if cmd.amount <= Decimal::ZERO {
            return Err(LedgerError::validation("receipt amount must be positive"));
        }
        require_money(cmd.amount, "receipt amount")?;

        self.store.transaction(|tx| {
            let mut customer: Customer = fetch(tx, "customer", &cmd.customer)?;
            let settings = settings(tx)?;
            let bank = configured(&settings.bank_account, "bank_account")?;
            let debtors = configured(&settings.debtors_control_account, "debtors_control_account")?;

            let mut open: Vec<SalesInvoice> = tx
                .list::<SalesInvoice>()?
                .into_iter()
                .filter(|i| i.customer == customer.code && i.status == InvoiceStatus::Open)
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
                format!("Receipt from {}", customer.name),
                JournalSource::Sales,
                vec![
                    JournalLine::debit(bank, cmd.amount),
                    JournalLine::credit(debtors, cmd.amount),
                ],
                user,
            )?;

            let receipt = Receipt {
                id: Uuid::new_v4(),
                customer: customer.code.clone(),
                date: cmd.date,
                amount: cmd.amount,
                reference: cmd.reference.clone(),
                allocations,
                unallocated,
                journal: journal.number,
            };
            tx.put(&receipt)?;
            customer.balance -= cmd.amount;
            tx.put(&customer)?;

            metrics::increment_counter!("acas_documents_created_total", "kind" => "receipt");
            tracing::info!(customer = %customer.code, amount = %cmd.amount, %unallocated, "Receipt recorded");
            Ok(receipt)
        })
    }

    pub fn list_receipts(&self, customer: Option<&str>) -> LedgerResult<Vec<Receipt>> {
        let mut receipts: Vec<Receipt> = self
            .store
            .list::<Receipt>()?
            .into_iter()
            .filter(|r| customer.map_or(true, |c| r.customer == c))
            .collect();
        receipts.sort_by_key(|r| r.date);
        Ok(receipts)
    }

    /// Open invoices by age, less receipts still held on account.
    pub fn aged_debtors(&self, as_at: Date) -> LedgerResult<AgedReport> {
        let invoices = self.store.list::<SalesInvoice>()?;
        let receipts = self.store.list::<Receipt>()?;
        let accounts = self
            .store
            .list::<Customer>()?
            .into_iter()
            .map(|c| OpenItems {
                items: invoices
                    .iter()
                    .filter(|i| i.customer == c.code && i.status == InvoiceStatus::Open)
                    .map(|i| (i.date, i.outstanding()))
                    .chain(
                        receipts
                            .iter()
                            .filter(|r| r.customer == c.code && r.unallocated > Decimal::ZERO)
                            .map(|r| (r.date, -r.unallocated)),
                    )
                    .collect(),
                account: c.code,
                name: c.name,
            })
            .collect();
        Ok(aged_report(as_at, accounts))
    }

    /// Invoices and receipts in date order with a running balance.
    pub fn customer_statement(&self, code: &str) -> LedgerResult<CustomerStatement> {
        let customer = self.get_customer(code)?;
        let mut lines: Vec<CustomerStatementLine> = Vec::new();
        for invoice in self.list_invoices(&SalesFilter {
            customer: Some(code.to_string()),
            ..Default::default()
        })? {
            lines.push(CustomerStatementLine {
                date: invoice.date,
                document: format!("Invoice {}", invoice.number),
                debit: invoice.gross,
                credit: Decimal::ZERO,
                balance: Decimal::ZERO,
            });
        }
        for receipt in self.list_receipts(Some(code))? {
            lines.push(CustomerStatementLine {
                date: receipt.date,
                document: receipt
                    .reference
                    .map(|r| format!("Receipt {}", r))
                    .unwrap_or_else(|| "Receipt".to_string()),
                debit: Decimal::ZERO,
                credit: receipt.amount,
                balance: Decimal::ZERO,
            });
        }
        lines.sort_by_key(|l| l.date);

        let mut balance = Decimal::ZERO;
        for line in &mut lines {
            balance += line.debit - line.credit;
            line.balance = balance;
        }
        Ok(CustomerStatement {
            customer: customer.code,
            name: customer.name,
            lines,
            balance,
        })
    }
}

impl Display for CustomerStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = Table::new();
        table.add_row(row!["Date", "Document", "Debit", "Credit", "Balance"]);
        table.add_empty_row();
        for line in &self.lines {
            table.add_row(row![line.date, line.document, r->line.debit, r->line.credit, r->line.balance]);
        }
        write!(f, "\nStatement {} {}\n{}\n", self.customer, self.name, table)
    }
}
