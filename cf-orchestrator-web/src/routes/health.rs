use actix_web::HttpResponse;
use chrono::Utc;
use serde_json::json;

use cf_orchestrator_core::types::ApiResponse;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}
