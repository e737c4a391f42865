//! HTTP mapping of core errors

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use cf_orchestrator_core::error::{CoreError, GatewayError};
use cf_orchestrator_core::types::ApiErrorResponse;

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

pub type ApiResult<T> = Result<T, ApiError>;

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ApiError {}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self(e)
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        Self(e.into())
    }
}

impl ApiError {
    /// Machine-readable code: the gateway variant for remote failures, the core
    /// variant otherwise.
    pub fn code(&self) -> String {
        match &self.0 {
            CoreError::Gateway(e) => variant_code(e),
            e => variant_code(e),
        }
    }
}

fn variant_code(value: &impl Serialize) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.get("code")?.as_str().map(str::to_string))
        .unwrap_or_else(|| "Unknown".to_string())
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            CoreError::ValidationError(_) | CoreError::DuplicateTemplate(_) => {
                StatusCode::BAD_REQUEST
            }
            CoreError::MissingToken => StatusCode::UNAUTHORIZED,
            CoreError::TemplateNotFound(_) | CoreError::DomainNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Cancelled => StatusCode::CONFLICT,
            CoreError::StorageError(_) | CoreError::SerializationError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            CoreError::Gateway(e) => match e {
                GatewayError::InvalidCredentials { .. } => StatusCode::UNAUTHORIZED,
                GatewayError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
                GatewayError::ZoneNotFound { .. }
                | GatewayError::RecordNotFound { .. }
                | GatewayError::RuleNotFound { .. } => StatusCode::NOT_FOUND,
                GatewayError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
                GatewayError::RateLimited { .. } | GatewayError::QuotaExceeded { .. } => {
                    StatusCode::TOO_MANY_REQUESTS
                }
                GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.0.is_expected() {
            tracing::warn!("[api] {}", self.0);
        } else {
            tracing::error!("[api] {}", self.0);
        }
        HttpResponse::build(self.status_code())
            .json(ApiErrorResponse::new(self.code(), self.0.to_string()))
    }
}
