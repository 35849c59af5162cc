use acas_core::{CompanySettings, CreateUserCommand, Role, UpdateVatCodeCommand, User, VatCode};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{created, ok, AppState, Endpoint, Verb};
use crate::{auth::CallerIdentity, error::LedgerResult};

const TAG: &str = "system";

pub(super) fn endpoints() -> Vec<Endpoint> {
    use Verb::*;
    vec![
        Endpoint::new(TAG, Get, "/settings", "Company settings", get_settings),
        Endpoint::new(TAG, Put, "/settings", "Replace company settings", update_settings),
        Endpoint::new(TAG, Get, "/vat-codes", "List VAT codes", list_vat_codes),
        Endpoint::new(TAG, Post, "/vat-codes", "Create a VAT code", create_vat_code),
        Endpoint::new(TAG, Get, "/vat-codes/:code", "Get a VAT code", get_vat_code),
        Endpoint::new(TAG, Put, "/vat-codes/:code", "Update a VAT code", update_vat_code),
        Endpoint::new(TAG, Delete, "/vat-codes/:code", "Delete an unused VAT code", delete_vat_code),
        Endpoint::new(TAG, Get, "/users", "List users", list_users),
        Endpoint::new(TAG, Post, "/users", "Create a user", create_user),
        Endpoint::new(TAG, Get, "/users/:username", "Get a user", get_user),
        Endpoint::new(TAG, Put, "/users/:username/active", "Activate or deactivate a user", set_user_active),
        Endpoint::new(TAG, Get, "/me", "The authenticated caller", whoami),
    ]
}

/// A user without its password hash.
#[derive(Debug, Serialize)]
struct UserView {
    id: Uuid,
    username: String,
    role: Role,
    active: bool,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        UserView {
            id: user.id,
            username: user.username,
            role: user.role,
            active: user.active,
            created_at: user.created_at,
        }
    }
}

async fn get_settings(State(state): State<AppState>) -> LedgerResult<Response> {
    Ok(ok(state.services.system.get_settings()?).into_response())
}

async fn update_settings(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(settings): Json<CompanySettings>,
) -> LedgerResult<Response> {
    caller.require(Role::Admin)?;
    Ok(ok(state.services.system.update_settings(settings)?).into_response())
}

async fn list_vat_codes(State(state): State<AppState>) -> LedgerResult<Response> {
    Ok(ok(state.services.system.list_vat_codes()?).into_response())
}

async fn create_vat_code(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(vat): Json<VatCode>,
) -> LedgerResult<Response> {
    caller.require(Role::Admin)?;
    Ok(created(state.services.system.create_vat_code(vat)?).into_response())
}

async fn get_vat_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> LedgerResult<Response> {
    Ok(ok(state.services.system.get_vat_code(&code)?).into_response())
}

async fn update_vat_code(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(code): Path<String>,
    Json(cmd): Json<UpdateVatCodeCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Admin)?;
    Ok(ok(state.services.system.update_vat_code(&code, cmd)?).into_response())
}

async fn delete_vat_code(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(code): Path<String>,
) -> LedgerResult<Response> {
    caller.require(Role::Admin)?;
    state.services.system.delete_vat_code(&code)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_users(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
) -> LedgerResult<Response> {
    caller.require(Role::Admin)?;
    let users: Vec<UserView> = state
        .services
        .system
        .list_users()?
        .into_iter()
        .map(UserView::from)
        .collect();
    Ok(ok(users).into_response())
}

async fn create_user(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(cmd): Json<CreateUserCommand>,
) -> LedgerResult<Response> {
    caller.require(Role::Admin)?;
    let user = state.services.system.create_user(cmd)?;
    Ok(created(UserView::from(user)).into_response())
}

async fn get_user(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(username): Path<String>,
) -> LedgerResult<Response> {
    caller.require(Role::Admin)?;
    Ok(ok(UserView::from(state.services.system.get_user(&username)?)).into_response())
}

#[derive(Debug, Deserialize)]
struct ActiveRequest {
    active: bool,
}

async fn set_user_active(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(username): Path<String>,
    Json(request): Json<ActiveRequest>,
) -> LedgerResult<Response> {
    caller.require(Role::Admin)?;
    let user = state.services.system.set_user_active(&username, request.active)?;
    Ok(ok(UserView::from(user)).into_response())
}

#[derive(Debug, Serialize)]
struct Caller {
    name: String,
    role: Role,
}

async fn whoami(Extension(caller): Extension<CallerIdentity>) -> Response {
    ok(Caller {
        name: caller.name,
        role: caller.role,
    })
    .into_response()
}
