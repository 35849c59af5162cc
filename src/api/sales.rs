use acas_core::{
    CreateCustomerCommand, CreateSalesOrderCommand, InvoiceOrderCommand, RecordReceiptCommand,
    Role, UpdateCustomerCommand, UpdateOrderCommand,
};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use super::{created, ok, paginate, report, AppState, Endpoint, FormatParams, PageParams, Verb};
use crate::{auth::CallerIdentity, error::LedgerResult, services::sales::SalesFilter};

const TAG: &str = "sales-ledger";

pub(super) fn endpoints() -> Vec<Endpoint> {
    use Verb::*;
    vec![
        Endpoint::new(TAG, Get, "/customers", "List customers", list_customers),
        Endpoint::new(TAG, Post, "/customers", "Create a customer", create_customer),
        Endpoint::new(TAG, Get, "/customers/:code", "Get a customer", get_customer),
        Endpoint::new(TAG, Put, "/customers/:code", "Update a customer", update_customer),
        Endpoint::new(TAG, Post, "/customers/:code/deactivate", "Deactivate a customer", deactivate_customer),
        Endpoint::new(TAG, Get, "/customers/:code/statement", "Customer statement", customer_statement),
        Endpoint::new(TAG, Get, "/sales-orders", "List sales orders", list_orders),
        Endpoint::new(TAG, Post, "/sales-orders", "Create a sales order", create_order),
        Endpoint::new(TAG, Get, "/sales-orders/:number", "Get a sales order", get_order),
        Endpoint::new(TAG, Put, "/sales-orders/:number", "Update a draft sales order", update_order),
        Endpoint::new(TAG, Post, "/sales-orders/:number/authorise", "Authorise a sales order", authorise_order),
        Endpoint::new(TAG, Post, "/sales-orders/:number/cancel", "Cancel a sales order", cancel_order),
        Endpoint::new(TAG, Post, "/sales-orders/:number/invoice", "Invoice an authorised order", invoice_order),
        Endpoint::new(TAG, Get, "/sales-invoices", "List sales invoices", list_invoices),
        Endpoint::new(TAG, Get, "/sales-invoices/:number", "Get a sales invoice", get_invoice),
        Endpoint::new(TAG, Get, "/receipts", "List customer receipts", list_receipts),
        Endpoint::new(TAG, Post, "/receipts", "Record a customer receipt", record_receipt),
        Endpoint::new(TAG, Get, "/reports/aged-debtors", "Aged debtors", aged_debtors),
    ]
}

#[derive(Debug, Deserialize)]
pub(super) struct ActiveQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct AgedQuery {
    pub as_at: Option<Date>,
    #[serde(flatten)]
    pub format: FormatParams,
}

impl AgedQuery {
    pub(super) fn as_at(&self) -> Date {
        self.as_at.unwrap_or_else(|| OffsetDateTime::now_utc().date())
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct PartyQuery {
    pub customer: Option<String>,
    pub supplier: Option<String>,
}

async fn list_customers(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(query): Query<ActiveQuery>,
) -> LedgerResult<Response> {
    let customers = state.services.sales.list_customers(query.active_only)?;
    Ok(paginate(customers, &page)?.into_response())
}

async fn create_customer(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<CreateCustomerCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.sales.create_customer(cmd)?).into_response())
}

async fn get_customer(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.sales.get_customer(&code)?).into_response())
}

async fn update_customer(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(code): Path<String>,
    Json(cmd): Json<UpdateCustomerCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.sales.update_customer(&code, cmd)?).into_response())
}

async fn deactivate_customer(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(code): Path<String>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.sales.deactivate_customer(&code)?).into_response())
}

async fn customer_statement(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(format): Query<FormatParams>,
) -> LedgerResult<Response> {
    Ok(report(state.services.sales.customer_statement(&code)?, &format))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(filter): Query<SalesFilter>,
) -> LedgerResult<Response> {
    Ok(paginate(state.services.sales.list_orders(&filter)?, &page)?.into_response())
}

async fn create_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<CreateSalesOrderCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.sales.create_order(cmd)?).into_response())
}

async fn get_order(
    State(state): State<AppState>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.sales.get_order(number)?).into_response())
}

async fn update_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
    Json(cmd): Json<UpdateOrderCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.sales.update_order(number, cmd)?).into_response())
}

async fn authorise_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    caller.require(Role::Manager)?;
    Ok(ok(state.services.sales.authorise_order(number, &caller.name)?).into_response())
}

async fn cancel_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.sales.cancel_order(number)?).into_response())
}

async fn invoice_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
    Json(cmd): Json<InvoiceOrderCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    let invoice = state.services.sales.invoice_order(number, cmd, &caller.name)?;
    Ok(created(invoice).into_response())
}

async fn list_invoices(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(filter): Query<SalesFilter>,
) -> LedgerResult<Response> {
    Ok(paginate(state.services.sales.list_invoices(&filter)?, &page)?.into_response())
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.sales.get_invoice(number)?).into_response())
}

async fn list_receipts(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(query): Query<PartyQuery>,
) -> LedgerResult<Response> {
    let receipts = state.services.sales.list_receipts(query.customer.as_deref())?;
    Ok(paginate(receipts, &page)?.into_response())
}

async fn record_receipt(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<RecordReceiptCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.sales.record_receipt(cmd, &caller.name)?).into_response())
}

async fn aged_debtors(
    State(state): State<AppState>,
    Query(query): Query<AgedQuery>,
) -> LedgerResult<Response> {
    Ok(report(state.services.sales.aged_debtors(query.as_at())?, &query.format))
}
