use acas_core::{
    CreatePurchaseOrderCommand, CreateSupplierCommand, ReceiveGoodsCommand, RecordPaymentCommand,
    RegisterPurchaseInvoiceCommand, Role, UpdateOrderCommand, UpdateSupplierCommand,
};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};

use super::{
    created, ok, paginate, report,
    sales::{ActiveQuery, AgedQuery, PartyQuery},
    AppState, Endpoint, PageParams, Verb,
};
use crate::{auth::CallerIdentity, error::LedgerResult, services::purchase::PurchaseFilter};

const TAG: &str = "purchase-ledger";

pub(super) fn endpoints() -> Vec<Endpoint> {
    use Verb::*;
    vec![
        Endpoint::new(TAG, Get, "/suppliers", "List suppliers", list_suppliers),
        Endpoint::new(TAG, Post, "/suppliers", "Create a supplier", create_supplier),
        Endpoint::new(TAG, Get, "/suppliers/:code", "Get a supplier", get_supplier),
        Endpoint::new(TAG, Put, "/suppliers/:code", "Update a supplier", update_supplier),
        Endpoint::new(TAG, Post, "/suppliers/:code/deactivate", "Deactivate a supplier", deactivate_supplier),
        Endpoint::new(TAG, Get, "/purchase-orders", "List purchase orders", list_orders),
        Endpoint::new(TAG, Post, "/purchase-orders", "Create a purchase order", create_order),
        Endpoint::new(TAG, Get, "/purchase-orders/:number", "Get a purchase order", get_order),
        Endpoint::new(TAG, Put, "/purchase-orders/:number", "Update a draft purchase order", update_order),
        Endpoint::new(TAG, Post, "/purchase-orders/:number/authorise", "Authorise a purchase order", authorise_order),
        Endpoint::new(TAG, Post, "/purchase-orders/:number/cancel", "Cancel a purchase order", cancel_order),
        Endpoint::new(TAG, Post, "/purchase-orders/:number/receipts", "Receive goods against an order", receive_goods),
        Endpoint::new(TAG, Get, "/purchase-orders/:number/receipts", "Goods receipts for an order", list_goods_receipts),
        Endpoint::new(TAG, Get, "/purchase-invoices", "List purchase invoices", list_invoices),
        Endpoint::new(TAG, Post, "/purchase-invoices", "Register a supplier invoice", register_invoice),
        Endpoint::new(TAG, Get, "/purchase-invoices/:number", "Get a purchase invoice", get_invoice),
        Endpoint::new(TAG, Get, "/payments", "List supplier payments", list_payments),
        Endpoint::new(TAG, Post, "/payments", "Record a supplier payment", record_payment),
        Endpoint::new(TAG, Get, "/reports/aged-creditors", "Aged creditors", aged_creditors),
    ]
}

async fn list_suppliers(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(query): Query<ActiveQuery>,
) -> LedgerResult<Response> {
    let suppliers = state.services.purchase.list_suppliers(query.active_only)?;
    Ok(paginate(suppliers, &page)?.into_response())
}

async fn create_supplier(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<CreateSupplierCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.purchase.create_supplier(cmd)?).into_response())
}

async fn get_supplier(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.purchase.get_supplier(&code)?).into_response())
}

async fn update_supplier(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(code): Path<String>,
    Json(cmd): Json<UpdateSupplierCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.purchase.update_supplier(&code, cmd)?).into_response())
}

async fn deactivate_supplier(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(code): Path<String>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.purchase.deactivate_supplier(&code)?).into_response())
}

async fn list_orders(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(filter): Query<PurchaseFilter>,
) -> LedgerResult<Response> {
    Ok(paginate(state.services.purchase.list_orders(&filter)?, &page)?.into_response())
}

async fn create_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<CreatePurchaseOrderCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.purchase.create_order(cmd)?).into_response())
}

async fn get_order(
    State(state): State<AppState>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.purchase.get_order(number)?).into_response())
}

async fn update_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
    Json(cmd): Json<UpdateOrderCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.purchase.update_order(number, cmd)?).into_response())
}

async fn authorise_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    caller.require(Role::Manager)?;
    Ok(ok(state.services.purchase.authorise_order(number, &caller.name)?).into_response())
}

async fn cancel_order(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.purchase.cancel_order(number)?).into_response())
}

async fn receive_goods(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
    Json(cmd): Json<ReceiveGoodsCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    let grn = state.services.purchase.receive_goods(number, cmd, &caller.name)?;
    Ok(created(grn).into_response())
}

async fn list_goods_receipts(
    State(state): State<AppState>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    state.services.purchase.get_order(number)?;
    Ok(ok(state.services.purchase.list_goods_receipts(Some(number))?).into_response())
}

async fn list_invoices(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(filter): Query<PurchaseFilter>,
) -> LedgerResult<Response> {
    Ok(paginate(state.services.purchase.list_invoices(&filter)?, &page)?.into_response())
}

async fn register_invoice(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<RegisterPurchaseInvoiceCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    let invoice = state.services.purchase.register_invoice(cmd, &caller.name)?;
    Ok(created(invoice).into_response())
}

async fn get_invoice(
    State(state): State<AppState>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.purchase.get_invoice(number)?).into_response())
}

async fn list_payments(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(query): Query<PartyQuery>,
) -> LedgerResult<Response> {
    let payments = state.services.purchase.list_payments(query.supplier.as_deref())?;
    Ok(paginate(payments, &page)?.into_response())
}

async fn record_payment(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<RecordPaymentCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.purchase.record_payment(cmd, &caller.name)?).into_response())
}

async fn aged_creditors(
    State(state): State<AppState>,
    Query(query): Query<AgedQuery>,
) -> LedgerResult<Response> {
    Ok(report(state.services.purchase.aged_creditors(query.as_at())?, &query.format))
}
