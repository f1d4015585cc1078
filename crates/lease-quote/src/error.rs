use crate::config::ConfigError;
use crate::pricing::{QuoteError, QuoteServiceError, RepositoryError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Document(serde_json::Error),
    Pricing(QuoteServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Document(err) => write!(f, "settings document error: {}", err),
            AppError::Pricing(err) => write!(f, "pricing error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Document(err) => Some(err),
            AppError::Pricing(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Pricing(QuoteServiceError::Quote(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Pricing(QuoteServiceError::Settings(_))
            | AppError::Pricing(QuoteServiceError::RateSheet(_))
            | AppError::Document(_) => StatusCode::BAD_REQUEST,
            AppError::Pricing(QuoteServiceError::Repository(_))
            | AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Document(value)
    }
}

impl From<QuoteServiceError> for AppError {
    fn from(value: QuoteServiceError) -> Self {
        Self::Pricing(value)
    }
}

impl From<QuoteError> for AppError {
    fn from(value: QuoteError) -> Self {
        Self::Pricing(QuoteServiceError::Quote(value))
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Pricing(QuoteServiceError::Repository(value))
    }
}
