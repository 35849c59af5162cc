use acas_core::{
    AccountType, BatchStatus, CreateAccountCommand, CreateBatchCommand, CreateBudgetCommand,
    CreateJournalCommand, OpenFiscalYearCommand, Record, Role, SetBudgetLineCommand,
    UpdateAccountCommand, UpdateJournalCommand,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use super::{created, ok, paginate, report, AppState, Endpoint, FormatParams, PageParams, Verb};
use crate::{auth::CallerIdentity, error::LedgerResult, services::gl::JournalFilter};

const TAG: &str = "general-ledger";

pub(super) fn endpoints() -> Vec<Endpoint> {
    use Verb::*;
    vec![
        Endpoint::new(TAG, Get, "/accounts", "List accounts", list_accounts),
        Endpoint::new(TAG, Post, "/accounts", "Create an account", create_account),
        Endpoint::new(TAG, Get, "/accounts/:code", "Get an account", get_account),
        Endpoint::new(TAG, Put, "/accounts/:code", "Update an account", update_account),
        Endpoint::new(TAG, Delete, "/accounts/:code", "Delete an unused account", delete_account),
        Endpoint::new(TAG, Get, "/accounts/:code/children", "Child accounts", children),
        Endpoint::new(TAG, Get, "/accounts/:code/balance", "Account balance for a period", account_balance),
        Endpoint::new(TAG, Get, "/accounts/:code/statement", "Account statement", account_statement),
        Endpoint::new(TAG, Get, "/periods", "List periods", list_periods),
        Endpoint::new(TAG, Post, "/periods", "Open a fiscal year", open_fiscal_year),
        Endpoint::new(TAG, Get, "/periods/current", "The current period", current_period),
        Endpoint::new(TAG, Get, "/periods/lookup", "The period containing a date", period_for_date),
        Endpoint::new(TAG, Post, "/periods/close", "Close the current period", close_period),
        Endpoint::new(TAG, Get, "/periods/:key", "Get a period", get_period),
        Endpoint::new(TAG, Get, "/journals", "List journals", list_journals),
        Endpoint::new(TAG, Post, "/journals", "Create a draft journal", create_journal),
        Endpoint::new(TAG, Get, "/journals/:number", "Get a journal", get_journal),
        Endpoint::new(TAG, Put, "/journals/:number", "Update a draft journal", update_journal),
        Endpoint::new(TAG, Delete, "/journals/:number", "Delete a draft journal", delete_journal),
        Endpoint::new(TAG, Post, "/journals/:number/post", "Post a journal", post_journal),
        Endpoint::new(TAG, Post, "/journals/:number/reverse", "Reverse a posted journal", reverse_journal),
        Endpoint::new(TAG, Get, "/batches", "List batches", list_batches),
        Endpoint::new(TAG, Post, "/batches", "Create a batch", create_batch),
        Endpoint::new(TAG, Get, "/batches/:number", "Get a batch", get_batch),
        Endpoint::new(TAG, Post, "/batches/:number/validate", "Validate a batch", validate_batch),
        Endpoint::new(TAG, Post, "/batches/:number/post", "Post a validated batch", post_batch),
        Endpoint::new(TAG, Get, "/reports/trial-balance", "Trial balance", trial_balance),
        Endpoint::new(TAG, Get, "/reports/income-statement", "Income statement", income_statement),
        Endpoint::new(TAG, Get, "/reports/balance-sheet", "Balance sheet", balance_sheet),
        Endpoint::new(TAG, Get, "/budgets", "List budgets", list_budgets),
        Endpoint::new(TAG, Post, "/budgets", "Create a budget", create_budget),
        Endpoint::new(TAG, Get, "/budgets/:id", "Get a budget", get_budget),
        Endpoint::new(TAG, Put, "/budgets/:id/lines", "Set a budget line", set_budget_line),
        Endpoint::new(TAG, Delete, "/budgets/:id/lines/:account", "Remove a budget line", remove_budget_line),
        Endpoint::new(TAG, Post, "/budgets/:id/approve", "Approve a budget", approve_budget),
        Endpoint::new(TAG, Get, "/budgets/:id/report", "Budget against actual", budget_report),
    ]
}

#[derive(Debug, Deserialize)]
struct AccountQuery {
    account_type: Option<AccountType>,
}

async fn list_accounts(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(query): Query<AccountQuery>,
) -> LedgerResult<Response> {
    let accounts = state.services.gl.list_accounts(query.account_type)?;
    Ok(paginate(accounts, &page)?.into_response())
}

async fn create_account(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<CreateAccountCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.gl.create_account(cmd)?).into_response())
}

async fn get_account(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.gl.get_account(&code)?).into_response())
}

async fn update_account(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(code): Path<String>,
    Json(cmd): Json<UpdateAccountCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.gl.update_account(&code, cmd)?).into_response())
}

async fn delete_account(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(code): Path<String>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    state.services.gl.delete_account(&code)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn children(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.gl.children(&code)?).into_response())
}

#[derive(Debug, Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

async fn account_balance(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> LedgerResult<Response> {
    let gl = &state.services.gl;
    let period = match query.period {
        Some(period) => period,
        None => gl.current_period()?.key(),
    };
    Ok(ok(gl.account_balance(&code, &period)?).into_response())
}

#[derive(Debug, Deserialize)]
struct StatementQuery {
    from: Option<String>,
    to: Option<String>,
    #[serde(flatten)]
    format: FormatParams,
}

async fn account_statement(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<StatementQuery>,
) -> LedgerResult<Response> {
    let statement = state.services.gl.account_statement(
        &code,
        query.from.as_deref(),
        query.to.as_deref(),
    )?;
    Ok(report(statement, &query.format))
}

#[derive(Debug, Deserialize)]
struct YearQuery {
    year: Option<i32>,
}

async fn list_periods(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(query): Query<YearQuery>,
) -> LedgerResult<Response> {
    Ok(paginate(state.services.gl.list_periods(query.year)?, &page)?.into_response())
}

async fn open_fiscal_year(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<OpenFiscalYearCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Manager)?;
    Ok(created(state.services.gl.open_fiscal_year(cmd)?).into_response())
}

async fn current_period(State(state): State<AppState>) -> LedgerResult<Response> {
    Ok(ok(state.services.gl.current_period()?).into_response())
}

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Date,
}

async fn period_for_date(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.gl.period_for_date(query.date)?).into_response())
}

async fn get_period(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.gl.get_period(&key)?).into_response())
}

async fn close_period(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> LedgerResult<Response> {
    caller.require(Role::Manager)?;
    Ok(ok(state.services.gl.close_period(&caller.name)?).into_response())
}

async fn list_journals(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(filter): Query<JournalFilter>,
) -> LedgerResult<Response> {
    Ok(paginate(state.services.gl.list_journals(&filter)?, &page)?.into_response())
}

async fn create_journal(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<CreateJournalCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.gl.create_journal(cmd, &caller.name)?).into_response())
}

async fn get_journal(
    State(state): State<AppState>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.gl.get_journal(number)?).into_response())
}

async fn update_journal(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
    Json(cmd): Json<UpdateJournalCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.gl.update_journal(number, cmd)?).into_response())
}

async fn delete_journal(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    state.services.gl.delete_journal(number)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn post_journal(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    caller.require(Role::Manager)?;
    Ok(ok(state.services.gl.post_journal(number)?).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct ReverseRequest {
    date: Option<Date>,
}

async fn reverse_journal(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
    body: Option<Json<ReverseRequest>>,
) -> LedgerResult<Response> {
    caller.require(Role::Manager)?;
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let reversal = state
        .services
        .gl
        .reverse_journal(number, request.date, &caller.name)?;
    Ok(created(reversal).into_response())
}

#[derive(Debug, Deserialize)]
struct BatchQuery {
    status: Option<BatchStatus>,
}

async fn list_batches(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(query): Query<BatchQuery>,
) -> LedgerResult<Response> {
    Ok(paginate(state.services.gl.list_batches(query.status)?, &page)?.into_response())
}

async fn create_batch(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<CreateBatchCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.gl.create_batch(cmd, &caller.name)?).into_response())
}

async fn get_batch(
    State(state): State<AppState>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.gl.get_batch(number)?).into_response())
}

async fn validate_batch(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.gl.validate_batch(number)?).into_response())
}

async fn post_batch(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(number): Path<u64>,
) -> LedgerResult<Response> {
    caller.require(Role::Manager)?;
    Ok(ok(state.services.gl.post_batch(number)?).into_response())
}

#[derive(Debug, Deserialize)]
struct ReportQuery {
    period: Option<String>,
    #[serde(flatten)]
    format: FormatParams,
}

async fn trial_balance(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> LedgerResult<Response> {
    let tb = state.services.gl.trial_balance(query.period.as_deref())?;
    Ok(report(tb, &query.format))
}

async fn income_statement(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> LedgerResult<Response> {
    let statement = state.services.gl.income_statement(query.period.as_deref())?;
    Ok(report(statement, &query.format))
}

async fn balance_sheet(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> LedgerResult<Response> {
    let sheet = state.services.gl.balance_sheet(query.period.as_deref())?;
    Ok(report(sheet, &query.format))
}

async fn list_budgets(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
    Query(query): Query<YearQuery>,
) -> LedgerResult<Response> {
    Ok(paginate(state.services.gl.list_budgets(query.year)?, &page)?.into_response())
}

async fn create_budget(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<CreateBudgetCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(created(state.services.gl.create_budget(cmd)?).into_response())
}

async fn get_budget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.gl.get_budget(id)?).into_response())
}

async fn set_budget_line(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
    Json(cmd): Json<SetBudgetLineCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.gl.set_budget_line(id, cmd)?).into_response())
}

async fn remove_budget_line(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((id, account)): Path<(Uuid, String)>,
) -> LedgerResult<Response> {
    caller.require(Role::Clerk)?;
    Ok(ok(state.services.gl.remove_budget_line(id, &account)?).into_response())
}

async fn approve_budget(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
) -> LedgerResult<Response> {
    caller.require(Role::Manager)?;
    Ok(ok(state.services.gl.approve_budget(id, &caller.name)?).into_response())
}

async fn budget_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PeriodQuery>,
) -> LedgerResult<Response> {
    let gl = &state.services.gl;
    let period = match query.period {
        Some(period) => period,
        None => gl.current_period()?.key(),
    };
    Ok(ok(gl.budget_vs_actual(id, &period)?).into_response())
}
