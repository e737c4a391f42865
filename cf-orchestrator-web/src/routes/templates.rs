//! Rule template CRUD

use actix_web::{HttpResponse, web};
use serde_json::json;

use cf_orchestrator_app::AppState;
use cf_orchestrator_core::types::{ApiResponse, CreateTemplateRequest, UpdateTemplateRequest};

use crate::error::ApiResult;

pub async fn list(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(state.template_service.list().await))
}

pub async fn create(
    state: web::Data<AppState>,
    body: web::Json<CreateTemplateRequest>,
) -> ApiResult<HttpResponse> {
    let template = state.template_service.create(body.into_inner()).await?;
    tracing::info!("[templates] Created {} ({})", template.friendly_id, template.name);
    Ok(HttpResponse::Created().json(ApiResponse::success(template)))
}

pub async fn update(
    state: web::Data<AppState>,
    id: web::Path<String>,
    body: web::Json<UpdateTemplateRequest>,
) -> ApiResult<HttpResponse> {
    let template = state
        .template_service
        .update(&id, body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(template)))
}

pub async fn toggle(state: web::Data<AppState>, id: web::Path<String>) -> ApiResult<HttpResponse> {
    let template = state.template_service.toggle(&id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(template)))
}

pub async fn delete(state: web::Data<AppState>, id: web::Path<String>) -> ApiResult<HttpResponse> {
    state.template_service.delete(&id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(json!({ "id": id.as_str() }))))
}
