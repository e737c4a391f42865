use async_trait::async_trait;

use crate::error::{GatewayError, Result};
use crate::types::{
    DnsRecord, FirewallRule, PaginatedResponse, PaginationParams, RuleRequest, Ruleset,
    SecurityLevel, Zone,
};

/// Raw API error (internal)
#[derive(Debug, Clone)]
pub(crate) struct RawApiError {
    /// Cloudflare error code, stringified
    pub code: Option<String>,
    /// Original error message
    pub message: String,
}

impl RawApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

/// Which resource the failing request targeted (internal).
/// Lets the mapper fill in ids on not-found errors.
#[derive(Debug, Clone, Default)]
pub(crate) struct ErrorContext {
    pub zone: Option<String>,
    pub record_id: Option<String>,
    pub rule_id: Option<String>,
}

impl ErrorContext {
    pub fn zone(zone: &str) -> Self {
        Self {
            zone: Some(zone.to_string()),
            ..Self::default()
        }
    }

    pub fn record(zone: &str, record_id: &str) -> Self {
        Self {
            zone: Some(zone.to_string()),
            record_id: Some(record_id.to_string()),
            rule_id: None,
        }
    }

    pub fn rule(zone: &str, rule_id: &str) -> Self {
        Self {
            zone: Some(zone.to_string()),
            record_id: None,
            rule_id: Some(rule_id.to_string()),
        }
    }
}

/// Maps raw API errors onto [`GatewayError`] (internal).
pub(crate) trait ErrorMapper {
    fn map_error(&self, raw: RawApiError, context: ErrorContext) -> GatewayError;

    fn parse_error(&self, detail: impl ToString) -> GatewayError {
        GatewayError::ParseError {
            detail: detail.to_string(),
        }
    }

    fn unknown_error(&self, raw: RawApiError) -> GatewayError {
        GatewayError::Unknown {
            raw_code: raw.code,
            raw_message: raw.message,
        }
    }
}

/// Remote gateway over the Cloudflare API.
///
/// Every call is a plain request/response; rate-limit and transient failures are
/// retried inside the implementation, never by callers.
#[async_trait]
pub trait ZoneGateway: Send + Sync {
    /// Check that the API token is active.
    async fn verify_token(&self) -> Result<bool>;

    /// List one page of zones.
    async fn list_zones(&self, params: &PaginationParams) -> Result<PaginatedResponse<Zone>>;

    /// List every zone, walking all pages.
    async fn list_all_zones(&self) -> Result<Vec<Zone>> {
        let mut params = PaginationParams::default();
        let mut zones = Vec::new();
        loop {
            let page = self.list_zones(&params).await?;
            let has_more = page.has_more && !page.items.is_empty();
            zones.extend(page.items);
            if !has_more {
                break;
            }
            params = params.next_page();
        }
        Ok(zones)
    }

    /// Fetch a single zone by id.
    async fn get_zone(&self, zone_id: &str) -> Result<Zone>;

    /// Reverse lookup: find a zone by its domain name.
    async fn find_zone_by_name(&self, name: &str) -> Result<Option<Zone>>;

    /// List DNS records, optionally filtered by exact name.
    async fn list_dns_records(&self, zone_id: &str, name: Option<&str>) -> Result<Vec<DnsRecord>>;

    /// Toggle the proxy flag of one record.
    async fn set_record_proxied(
        &self,
        zone_id: &str,
        record_id: &str,
        proxied: bool,
    ) -> Result<DnsRecord>;

    /// Read the zone's security level.
    async fn get_security_level(&self, zone_id: &str) -> Result<SecurityLevel>;

    /// Write the zone's security level.
    async fn set_security_level(&self, zone_id: &str, level: SecurityLevel)
    -> Result<SecurityLevel>;

    /// Read bot fight mode.
    async fn get_bot_fight_mode(&self, zone_id: &str) -> Result<bool>;

    /// Write bot fight mode.
    async fn set_bot_fight_mode(&self, zone_id: &str, enabled: bool) -> Result<bool>;

    /// Read the custom firewall entrypoint ruleset; `None` if the zone has never had one.
    async fn get_custom_ruleset(&self, zone_id: &str) -> Result<Option<Ruleset>>;

    /// Add a rule. When `ruleset_id` is `None` the entrypoint is created with this rule.
    async fn create_rule(
        &self,
        zone_id: &str,
        ruleset_id: Option<&str>,
        rule: &RuleRequest,
    ) -> Result<FirewallRule>;

    /// Replace a rule in place.
    async fn update_rule(
        &self,
        zone_id: &str,
        ruleset_id: &str,
        rule_id: &str,
        rule: &RuleRequest,
    ) -> Result<FirewallRule>;

    /// Delete a rule.
    async fn delete_rule(&self, zone_id: &str, ruleset_id: &str, rule_id: &str) -> Result<()>;
}

/// Build a gateway error for a missing token; used by factories before any call.
pub(crate) fn empty_token_error() -> GatewayError {
    GatewayError::InvalidCredentials {
        raw_message: Some("API token is empty".to_string()),
    }
}
