//! Domain listing, single toggles and rule analysis

use actix_web::{HttpRequest, HttpResponse, web};
use serde_json::json;

use cf_orchestrator_app::AppState;
use cf_orchestrator_core::types::ApiResponse;

use super::{RefreshQuery, ToggleBody, gateway};
use crate::error::ApiResult;

/// Cached domains, or a full remote refresh with `?refresh=true`.
pub async fn list(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<RefreshQuery>,
) -> ApiResult<HttpResponse> {
    let domains = if query.refresh {
        let gateway = gateway(&state, req.headers())?;
        state.domain_service.refresh_all(gateway.as_ref()).await?
    } else {
        state.domain_service.list_cached().await
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(domains)))
}

pub async fn set_proxy(
    state: web::Data<AppState>,
    req: HttpRequest,
    zone_id: web::Path<String>,
    body: web::Json<ToggleBody>,
) -> ApiResult<HttpResponse> {
    let gateway = gateway(&state, req.headers())?;
    let records = state
        .domain_service
        .set_proxy(gateway.as_ref(), &zone_id, body.enabled)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(json!({
        "zoneId": zone_id.as_str(),
        "enabled": body.enabled,
        "records": records,
    }))))
}

pub async fn set_under_attack(
    state: web::Data<AppState>,
    req: HttpRequest,
    zone_id: web::Path<String>,
    body: web::Json<ToggleBody>,
) -> ApiResult<HttpResponse> {
    let gateway = gateway(&state, req.headers())?;
    let level = state
        .domain_service
        .set_under_attack(gateway.as_ref(), &zone_id, body.enabled)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(json!({
        "zoneId": zone_id.as_str(),
        "enabled": level.is_under_attack(),
        "securityLevel": level,
    }))))
}

pub async fn set_bot_fight(
    state: web::Data<AppState>,
    req: HttpRequest,
    zone_id: web::Path<String>,
    body: web::Json<ToggleBody>,
) -> ApiResult<HttpResponse> {
    let gateway = gateway(&state, req.headers())?;
    let enabled = state
        .domain_service
        .set_bot_fight(gateway.as_ref(), &zone_id, body.enabled)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(json!({
        "zoneId": zone_id.as_str(),
        "enabled": enabled,
    }))))
}

/// Rule analysis of one zone; cached unless stale or `?refresh=true`.
pub async fn rules(
    state: web::Data<AppState>,
    req: HttpRequest,
    zone_id: web::Path<String>,
    query: web::Query<RefreshQuery>,
) -> ApiResult<HttpResponse> {
    let gateway = gateway(&state, req.headers())?;
    let status = state
        .rule_service
        .analyze(gateway.as_ref(), &zone_id, query.refresh)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(status)))
}
