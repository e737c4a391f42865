//! Platform-agnostic application bootstrap for CF Orchestrator.
//!
//! Provides `AppState` (service container), `AppStateBuilder` (adapter
//! injection), the JSON file store adapter and the client-side bulk operation
//! controller.

pub mod adapters;
pub mod controller;

use std::path::PathBuf;
use std::sync::Arc;

use cf_orchestrator_core::config::BulkConfig;
use cf_orchestrator_core::error::{CoreError, CoreResult};
use cf_orchestrator_core::services::{
    BulkOperationService, DomainService, RuleService, ServiceContext, TemplateService,
};
use cf_orchestrator_core::traits::KeyValueStore;
use cf_orchestrator_provider::{create_gateway, ZoneGateway};

use crate::adapters::JsonFileStore;

/// Platform-agnostic application state.
///
/// Holds all services and the `ServiceContext`. Every frontend constructs this
/// once at startup via `AppStateBuilder`.
pub struct AppState {
    /// Service context (holds the cache store and bulk tunables)
    pub ctx: Arc<ServiceContext>,
    /// Domain service
    pub domain_service: DomainService,
    /// Template service
    pub template_service: TemplateService,
    /// Rule service
    pub rule_service: RuleService,
    /// Bulk operation service
    pub bulk_service: Arc<BulkOperationService>,
}

impl AppState {
    /// Gateway for one caller's API token.
    pub fn gateway_for(&self, api_token: &str) -> CoreResult<Arc<dyn ZoneGateway>> {
        if api_token.trim().is_empty() {
            return Err(CoreError::MissingToken);
        }
        Ok(create_gateway(api_token.trim())?)
    }

    /// Log what the cache holds at startup.
    pub async fn log_cache_summary(&self) {
        let domains = self.ctx.cache.load_domains().await;
        let templates = self.ctx.cache.load_templates().await;
        log::info!(
            "Cache loaded: {} domain(s), {} rule template(s)",
            domains.domains.len(),
            templates.templates.len()
        );
    }
}

/// Builder for constructing `AppState` with platform-specific adapters.
///
/// # Required
/// - a store: either `store` or `cache_dir` (JSON files)
///
/// # Optional
/// - `bulk_config`: defaults to `BulkConfig::default()`
pub struct AppStateBuilder {
    store: Option<Arc<dyn KeyValueStore>>,
    cache_dir: Option<PathBuf>,
    bulk_config: Option<BulkConfig>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: None,
            cache_dir: None,
            bulk_config: None,
        }
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a `JsonFileStore` rooted at `dir`; ignored when `store` is set.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn bulk_config(mut self, config: BulkConfig) -> Self {
        self.bulk_config = Some(config);
        self
    }

    /// Build the `AppState`.
    ///
    /// # Errors
    /// Returns `CoreError::ValidationError` if no store was configured, or a
    /// `StorageError` if the cache directory cannot be created.
    pub async fn build(self) -> CoreResult<AppState> {
        let store: Arc<dyn KeyValueStore> = match (self.store, self.cache_dir) {
            (Some(store), _) => store,
            (None, Some(dir)) => Arc::new(JsonFileStore::new(dir).await?),
            (None, None) => {
                return Err(CoreError::ValidationError(
                    "a store or cache_dir is required".to_string(),
                ))
            }
        };

        let ctx = Arc::new(ServiceContext::new(
            store,
            self.bulk_config.unwrap_or_default(),
        ));

        Ok(AppState {
            domain_service: DomainService::new(Arc::clone(&ctx)),
            template_service: TemplateService::new(Arc::clone(&ctx)),
            rule_service: RuleService::new(Arc::clone(&ctx)),
            bulk_service: Arc::new(BulkOperationService::new(Arc::clone(&ctx))),
            ctx,
        })
    }
}

impl Default for AppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
