//! Bulk operation trigger, answered with a progress event stream

use actix_web::web::{self, Bytes};
use actix_web::{HttpRequest, HttpResponse};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use cf_orchestrator_app::AppState;
use cf_orchestrator_core::error::CoreError;
use cf_orchestrator_core::transport::{EVENT_STREAM_CONTENT_TYPE, encode_frame};
use cf_orchestrator_core::types::BulkOperationPayload;

use crate::error::{ApiError, ApiResult};

/// `POST /api/bulk-operations`
///
/// The token is checked before the body is parsed, then payload problems are
/// answered with a JSON error before any work starts. Once streaming, a client
/// disconnect drops the stream and cancels the run.
pub async fn start(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: Bytes,
) -> ApiResult<HttpResponse> {
    let gateway = super::gateway(&state, req.headers())?;
    let payload: BulkOperationPayload = serde_json::from_slice(&body).map_err(|e| {
        ApiError(CoreError::ValidationError(format!("Json deserialize error: {e}")))
    })?;
    tracing::info!(
        "[bulk] Request: action={:?}, {} target(s)",
        payload.action,
        payload.target_domains.len()
    );

    let events = state
        .bulk_service
        .start(gateway, payload, CancellationToken::new())?;
    let body = events.map(|event| encode_frame(&event).map(Bytes::from).map_err(ApiError));

    Ok(HttpResponse::Ok()
        .content_type(EVENT_STREAM_CONTENT_TYPE)
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(body))
}
