use acas_core::{CreateStockItemCommand, Role, StockMovementCommand, UpdateStockItemCommand};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};

use super::{
    created, ok, paginate, report, sales::ActiveQuery, AppState, Endpoint, FormatParams,
    PageParams, Verb,
};
use crate::{auth::CallerIdentity, error::LedgerResult};

const TAG: &str = "stock-control";

pub(super) fn endpoints() -> Vec<Endpoint> {
    use Verb::*;
    vec![
        Endpoint::new(TAG, Get, "/stock-items", "List stock items", list_items),
        Endpoint::new(TAG, Post, "/stock-items", "Create a stock item", create_item),
        Endpoint::new(TAG, Get, "/stock-items/:code", "Get a stock item", get_item),
        Endpoint::new(TAG, Put, "/stock-items/:code", "Update a stock item", update_item),
        Endpoint::new(TAG, Get, "/stock-items/:code/movements", "Movements of a stock item", movements),
        Endpoint::new(TAG, Post, "/stock/receipts", "Receive stock", receive_stock),
        Endpoint::new(TAG, Post, "/stock/issues", "Issue stock", issue_stock),
        Endpoint::new(TAG, Post, "/stock/adjustments", "Adjust stock", adjust_stock),
        Endpoint::new(TAG, Get, "/reports/stock-valuation", "Stock valuation", stock_valuation),
        Endpoint::new(TAG, Get, "/reports/reorder", "Items at or below reorder level", reorder_report),
    ]
}

async fn list_items(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(query): Query<ActiveQuery>,
) -> LedgerResult<Response> {
    Ok(paginate(state.services.stock.list_items(query.active_only)?, &page)?.into_response())
}

async fn create_item(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<CreateStockItemCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.stock.create_item(cmd)?).into_response())
}

async fn get_item(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.stock.get_item(&code)?).into_response())
}

async fn update_item(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(code): Path<String>,
    Json(cmd): Json<UpdateStockItemCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.stock.update_item(&code, cmd)?).into_response())
}

async fn movements(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(page): Query<PageParams>,
) -> LedgerResult<Response> {
    Ok(paginate(state.services.stock.movements(&code)?, &page)?.into_response())
}

async fn receive_stock(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<StockMovementCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.stock.receive_stock(cmd)?).into_response())
}

async fn issue_stock(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<StockMovementCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.stock.issue_stock(cmd)?).into_response())
}

async fn adjust_stock(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<StockMovementCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Manager)?;
    Ok(created(state.services.stock.adjust_stock(cmd, &caller.name)?).into_response())
}

async fn stock_valuation(
    State(state): State<AppState>,
    Query(format): Query<FormatParams>,
) -> LedgerResult<Response> {
    Ok(report(state.services.stock.stock_valuation()?, &format))
}

async fn reorder_report(State(state): State<AppState>) -> LedgerResult<Response> {
    Ok(ok(state.services.stock.reorder_report()?).into_response())
}
