//! Business logic service layer

mod bulk_operation;
mod domain_service;
mod rule_service;
mod template_service;

pub use bulk_operation::{BulkOperationService, ProgressSink};
pub use domain_service::DomainService;
pub use rule_service::{ApplyOutcome, RemovalOutcome, RuleService, TemplateApplyAction};
pub use template_service::TemplateService;

use std::sync::Arc;

use crate::cache::CacheRepository;
use crate::config::BulkConfig;
use crate::traits::KeyValueStore;

/// Service context - holds every dependency
///
/// The platform layer builds this context and injects its store implementation.
/// The remote gateway is not part of it: it is built per request from the caller's token.
pub struct ServiceContext {
    /// Typed cache over the document store
    pub cache: CacheRepository,
    /// Bulk run tunables
    pub bulk_config: BulkConfig,
}

impl ServiceContext {
    /// Create service context
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, bulk_config: BulkConfig) -> Self {
        Self {
            cache: CacheRepository::new(store),
            bulk_config: bulk_config.validated(),
        }
    }
}
