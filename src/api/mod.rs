//! HTTP API. Every route under `/api/v1` is declared once in an [`Endpoint`]
//! table that both mounts the handler and feeds the OpenAPI document.

use std::{fmt::Display, sync::Arc};

use acas_core::LoginCommand;
use axum::{
    extract::State,
    handler::Handler,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, on, post, MethodFilter, MethodRouter},
    Extension, Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};

use crate::{
    auth::{auth_middleware, AuthState},
    error::{LedgerError, LedgerResult},
    services::Services,
};

mod docs;
mod gl;
mod purchase;
mod sales;
mod stock;
mod system;

pub use docs::openapi;

pub const API_PREFIX: &str = "/api/v1";

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub auth: Arc<AuthState>,
    pub metrics: Option<PrometheusHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    fn filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Put => MethodFilter::PUT,
            Verb::Delete => MethodFilter::DELETE,
        }
    }
}

/// One route of the versioned API.
pub struct Endpoint {
    pub verb: Verb,
    pub path: String,
    pub tag: &'static str,
    pub summary: &'static str,
    handler: MethodRouter<AppState>,
}

impl Endpoint {
    pub(crate) fn new<H, T>(
        tag: &'static str,
        verb: Verb,
        path: &str,
        summary: &'static str,
        handler: H,
    ) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Endpoint {
            verb,
            path: format!("{}{}", API_PREFIX, path),
            tag,
            summary,
            handler: on(verb.filter(), handler),
        }
    }
}

pub fn endpoints() -> Vec<Endpoint> {
    let mut all = gl::endpoints();
    all.extend(sales::endpoints());
    all.extend(purchase::endpoints());
    all.extend(stock::endpoints());
    all.extend(system::endpoints());
    all
}

pub fn router(state: AppState) -> Router {
    let mut api = Router::new();
    for endpoint in endpoints() {
        api = api.route(&endpoint.path, endpoint.handler);
    }
    let api = api
        .layer(middleware::from_fn(auth_middleware))
        .layer(Extension(state.auth.clone()));

    let doc = openapi(&endpoints());
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .route("/auth/login", post(login))
        .route(
            "/api-docs/openapi.json",
            get(move || {
                let doc = doc.clone();
                async move { Json(doc) }
            }),
        )
        .merge(api)
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub page_size: u32,
    pub total: usize,
    pub total_pages: u32,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

pub(crate) fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
        pagination: None,
    })
}

pub(crate) fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageParams {
    fn resolve(&self) -> LedgerResult<(u32, u32)> {
        let page = self.page.unwrap_or(1);
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page < 1 {
            return Err(LedgerError::validation("page must be at least 1"));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(LedgerError::validation(format!(
                "page_size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok((page, page_size))
    }
}

/// One page of `items`. Pages past the end are empty.
pub(crate) fn paginate<T: Serialize>(
    items: Vec<T>,
    params: &PageParams,
) -> LedgerResult<Json<ApiResponse<Vec<T>>>> {
    let (page, page_size) = params.resolve()?;
    let total = items.len();
    let total_pages = ((total as u32) + page_size - 1) / page_size;
    let skip = ((page - 1) as usize).saturating_mul(page_size as usize);
    let data: Vec<T> = items.into_iter().skip(skip).take(page_size as usize).collect();
    Ok(Json(ApiResponse {
        success: true,
        data,
        pagination: Some(PageInfo {
            page,
            page_size,
            total,
            total_pages,
        }),
    }))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatParams {
    pub format: Option<String>,
}

/// JSON by default, a plain-text table with `?format=text`.
pub(crate) fn report<T: Serialize + Display>(value: T, format: &FormatParams) -> Response {
    match format.format.as_deref() {
        Some("text") => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            value.to_string(),
        )
            .into_response(),
        _ => ok(value).into_response(),
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = match &self {
            LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
            LedgerError::Validation(_)
            | LedgerError::Unbalanced { .. }
            | LedgerError::NoPeriod(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::AlreadyExists { .. }
            | LedgerError::Conflict(_)
            | LedgerError::PeriodClosed(_)
            | LedgerError::PeriodNotCurrent { .. }
            | LedgerError::InsufficientStock { .. }
            | LedgerError::CreditLimitExceeded { .. }
            | LedgerError::NotConfigured(_) => StatusCode::CONFLICT,
            LedgerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
            LedgerError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorBody {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> impl IntoResponse {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub role: acas_core::Role,
}

async fn login(
    State(state): State<AppState>,
    Json(cmd): Json<LoginCommand>,
) -> LedgerResult<Json<ApiResponse<LoginResponse>>> {
    let user = state.services.system.authenticate(&cmd.username, &cmd.password)?;
    let token = state.auth.tokens.issue(&user)?;
    tracing::info!(user = %user.username, "Token issued");
    Ok(ok(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth.tokens.ttl_seconds(),
        role: user.role,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginate_bounds() {
        let items: Vec<u32> = (1..=45).collect();
        let Json(page) = paginate(
            items.clone(),
            &PageParams {
                page: Some(3),
                page_size: Some(20),
            },
        )
        .unwrap();
        assert_eq!(page.data, vec![41, 42, 43, 44, 45]);
        let info = page.pagination.unwrap();
        assert_eq!(info.total, 45);
        assert_eq!(info.total_pages, 3);

        let Json(beyond) = paginate(
            items.clone(),
            &PageParams {
                page: Some(9),
                page_size: None,
            },
        )
        .unwrap();
        assert!(beyond.data.is_empty());

        for bad in [
            PageParams { page: Some(0), page_size: None },
            PageParams { page: None, page_size: Some(0) },
            PageParams { page: None, page_size: Some(101) },
        ] {
            assert!(matches!(paginate(items.clone(), &bad), Err(LedgerError::Validation(_))));
        }
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (LedgerError::not_found("account", "9999"), StatusCode::NOT_FOUND),
            (LedgerError::validation("bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (LedgerError::conflict("busy"), StatusCode::CONFLICT),
            (LedgerError::Unauthorized("no".into()), StatusCode::UNAUTHORIZED),
            (LedgerError::Forbidden("no".into()), StatusCode::FORBIDDEN),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
