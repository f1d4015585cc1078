use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::engine::{Installment, QuoteInput, QuoteResult};
use super::persisted::{PersistedSettings, RepairNote};
use super::service::{QuoteService, QuoteServiceError};
use super::settings::SettingsCommand;
use super::store::{RepositoryError, SettingsRepository};

/// Bearer-token check guarding the admin routes. Without a token they are closed.
#[derive(Clone, Default)]
pub struct AdminAccess {
    token: Option<Arc<str>>,
}

impl AdminAccess {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let token: String = token.into();
        if token.trim().is_empty() {
            return Self::disabled();
        }
        Self {
            token: Some(Arc::from(token)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let Some(expected) = self.token.as_deref() else {
            return Err(error_body(
                StatusCode::FORBIDDEN,
                "settings administration is disabled",
            ));
        };

        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        match presented {
            Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => Ok(()),
            _ => {
                warn!("rejected settings administration request");
                Err(error_body(StatusCode::UNAUTHORIZED, "admin token required"))
            }
        }
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

pub(crate) struct RouterState<R> {
    service: Arc<QuoteService<R>>,
    admin: AdminAccess,
}

impl<R> Clone for RouterState<R> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            admin: self.admin.clone(),
        }
    }
}

/// Quote result plus the billed periods.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteView {
    #[serde(flatten)]
    pub quote: QuoteResult,
    pub installments: Vec<Installment>,
}

impl From<QuoteResult> for QuoteView {
    fn from(quote: QuoteResult) -> Self {
        let installments = quote.schedule().collect();
        Self {
            quote,
            installments,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OptionsQuery {
    #[serde(default)]
    ratio: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommandBatch {
    commands: Vec<SettingsCommand>,
}

#[derive(Debug, Serialize)]
struct ImportResponse {
    repairs: Vec<RepairNote>,
    settings: PersistedSettings,
}

/// Router builder exposing quoting and settings endpoints.
pub fn quote_router<R>(service: Arc<QuoteService<R>>, admin: AdminAccess) -> Router
where
    R: SettingsRepository + 'static,
{
    Router::new()
        .route("/api/v1/quotes", post(quote_handler::<R>))
        .route("/api/v1/quotes/options", get(options_handler::<R>))
        .route("/api/v1/settings", get(settings_handler::<R>))
        .route("/api/v1/settings/rates", get(rate_matrix_handler::<R>))
        .route("/api/v1/admin/settings", put(import_handler::<R>))
        .route("/api/v1/admin/settings/commands", post(commands_handler::<R>))
        .route("/api/v1/admin/settings/reset", post(reset_handler::<R>))
        .with_state(RouterState { service, admin })
}

pub(crate) async fn quote_handler<R>(
    State(state): State<RouterState<R>>,
    Json(input): Json<QuoteInput>,
) -> Response
where
    R: SettingsRepository + 'static,
{
    match state.service.quote(input) {
        Ok(quote) => (StatusCode::OK, Json(QuoteView::from(quote))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn options_handler<R>(
    State(state): State<RouterState<R>>,
    Query(query): Query<OptionsQuery>,
) -> Response
where
    R: SettingsRepository + 'static,
{
    match state.service.options(query.ratio) {
        Ok(options) => (StatusCode::OK, Json(options)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn settings_handler<R>(State(state): State<RouterState<R>>) -> Response
where
    R: SettingsRepository + 'static,
{
    (StatusCode::OK, Json(state.service.export())).into_response()
}

pub(crate) async fn rate_matrix_handler<R>(State(state): State<RouterState<R>>) -> Response
where
    R: SettingsRepository + 'static,
{
    (StatusCode::OK, Json(state.service.rate_matrix())).into_response()
}

pub(crate) async fn commands_handler<R>(
    State(state): State<RouterState<R>>,
    headers: HeaderMap,
    Json(batch): Json<CommandBatch>,
) -> Response
where
    R: SettingsRepository + 'static,
{
    if let Err(denied) = state.admin.authorize(&headers) {
        return denied;
    }

    match state.service.apply(batch.commands) {
        Ok(settings) => {
            let document = PersistedSettings::capture(&settings, None);
            (StatusCode::OK, Json(document)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn import_handler<R>(
    State(state): State<RouterState<R>>,
    headers: HeaderMap,
    Json(document): Json<PersistedSettings>,
) -> Response
where
    R: SettingsRepository + 'static,
{
    if let Err(denied) = state.admin.authorize(&headers) {
        return denied;
    }

    match state.service.import(document) {
        Ok(repairs) => {
            let body = ImportResponse {
                repairs,
                settings: state.service.export(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reset_handler<R>(
    State(state): State<RouterState<R>>,
    headers: HeaderMap,
) -> Response
where
    R: SettingsRepository + 'static,
{
    if let Err(denied) = state.admin.authorize(&headers) {
        return denied;
    }

    match state.service.reset() {
        Ok(settings) => {
            let document = PersistedSettings::capture(&settings, None);
            (StatusCode::OK, Json(document)).into_response()
        }
        Err(err) => error_response(err),
    }
}

fn error_response(err: QuoteServiceError) -> Response {
    let status = match &err {
        QuoteServiceError::Quote(_) => StatusCode::UNPROCESSABLE_ENTITY,
        QuoteServiceError::Settings(_) | QuoteServiceError::RateSheet(_) => {
            StatusCode::BAD_REQUEST
        }
        QuoteServiceError::Repository(RepositoryError::Corrupt(_))
        | QuoteServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_body(status, &err.to_string())
}

fn error_body(status: StatusCode, message: &str) -> Response {
    let payload = json!({ "error": message });
    (status, Json(payload)).into_response()
}
