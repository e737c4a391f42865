//! Type definition module

mod bulk;
mod domain;
mod progress;
mod response;
mod rule_status;
mod template;

pub use bulk::{
    ALL_TEMPLATES, BulkAction, BulkOperationPayload, BulkOperationRequest, BulkOperationResult,
    BulkSummary,
};
pub use domain::{DnsRecordRef, Domain, DomainDnsRecords, SecurityRulesSummary};
pub use progress::{CANCELLED_MESSAGE, Phase, PhaseInfo, ProgressEvent};
pub use response::{ApiErrorDetail, ApiErrorResponse, ApiResponse};
pub use rule_status::{AppliedRule, AppliedRuleStatus, CustomRule, DomainRuleStatus};
pub use template::{
    CreateTemplateRequest, INITIAL_TEMPLATE_VERSION, RuleTemplate, TEMPLATE_ACTIONS,
    UpdateTemplateRequest,
};

// Re-export the public types of the provider library
pub use cf_orchestrator_provider::{
    DnsRecord, FirewallRule, PaginatedResponse, PaginationParams, RuleRequest, Ruleset,
    SecurityLevel, Zone, ZoneStatus,
};
