//! HTTP routes

mod bulk;
mod domains;
mod health;
mod templates;

use std::sync::Arc;

use actix_web::http::header::{AUTHORIZATION, HeaderMap};
use actix_web::web;
use serde::Deserialize;

use cf_orchestrator_app::AppState;
use cf_orchestrator_core::error::CoreError;
use cf_orchestrator_provider::ZoneGateway;

use crate::error::{ApiError, ApiResult};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config()).service(
        web::scope("/api")
            .route("/health", web::get().to(health::health))
            .route("/bulk-operations", web::post().to(bulk::start))
            .service(
                web::scope("/domains")
                    .route("", web::get().to(domains::list))
                    .route("/{zone_id}/proxy", web::post().to(domains::set_proxy))
                    .route(
                        "/{zone_id}/under-attack",
                        web::post().to(domains::set_under_attack),
                    )
                    .route("/{zone_id}/bot-fight", web::post().to(domains::set_bot_fight))
                    .route("/{zone_id}/rules", web::get().to(domains::rules)),
            )
            .service(
                web::scope("/rule-templates")
                    .route("", web::get().to(templates::list))
                    .route("", web::post().to(templates::create))
                    .route("/{id}", web::put().to(templates::update))
                    .route("/{id}", web::delete().to(templates::delete))
                    .route("/{id}/toggle", web::post().to(templates::toggle)),
            ),
    );
}

/// Malformed bodies get the same error envelope as failed validation.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        ApiError(CoreError::ValidationError(err.to_string())).into()
    })
}

/// `?refresh=true` on read endpoints
#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub refresh: bool,
}

/// `{enabled}` body of the single toggles
#[derive(Debug, Deserialize)]
pub struct ToggleBody {
    pub enabled: bool,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Gateway for the caller's bearer token.
fn gateway(state: &AppState, headers: &HeaderMap) -> ApiResult<Arc<dyn ZoneGateway>> {
    let token = bearer_token(headers).ok_or(ApiError(CoreError::MissingToken))?;
    Ok(state.gateway_for(token)?)
}
