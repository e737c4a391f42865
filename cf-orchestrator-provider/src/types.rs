//! Public gateway types.
//!
//! These are the normalized shapes returned by [`ZoneGateway`](crate::ZoneGateway);
//! the raw Cloudflare wire structs live in `cloudflare::types`.

use serde::{Deserialize, Serialize};

// ============ Pagination ============

/// Pagination parameters for list operations.
///
/// # Default
///
/// `page = 1, page_size = 50` (the Cloudflare zones maximum).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    /// Page number (1-indexed).
    pub page: u32,
    /// Number of items per page.
    pub page_size: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
        }
    }
}

impl PaginationParams {
    /// Clamp pagination values to valid ranges.
    ///
    /// - `page` is clamped to `>= 1`
    /// - `page_size` is clamped to `1..=max_page_size`
    #[must_use]
    pub fn validated(&self, max_page_size: u32) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, max_page_size),
        }
    }

    /// Parameters for the page after this one.
    #[must_use]
    pub fn next_page(&self) -> Self {
        Self {
            page: self.page + 1,
            page_size: self.page_size,
        }
    }
}

/// A page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    /// Items in the current page.
    pub items: Vec<T>,
    /// Current page number.
    pub page: u32,
    /// Page size used for this request.
    pub page_size: u32,
    /// Total number of items across all pages.
    pub total_count: u32,
    /// Whether there are more pages after this one.
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    /// Create a new paginated response, automatically computing [`has_more`](Self::has_more).
    pub fn new(items: Vec<T>, page: u32, page_size: u32, total_count: u32) -> Self {
        let has_more = page.saturating_mul(page_size) < total_count;
        Self {
            items,
            page,
            page_size,
            total_count,
            has_more,
        }
    }
}

// ============ Zones ============

/// Lifecycle status of a zone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZoneStatus {
    /// Nameservers point at Cloudflare.
    Active,
    /// Waiting for nameserver change (`pending` / `initializing`).
    Pending,
    /// Nameservers moved away.
    Moved,
    /// Zone deactivated.
    Deactivated,
    /// Anything the API adds later.
    #[default]
    Unknown,
}

impl ZoneStatus {
    /// Parse the status string returned by the zones API.
    #[must_use]
    pub fn from_api(status: &str) -> Self {
        match status {
            "active" => Self::Active,
            "pending" | "initializing" => Self::Pending,
            "moved" => Self::Moved,
            "deactivated" => Self::Deactivated,
            _ => Self::Unknown,
        }
    }
}

/// A Cloudflare zone (roughly one domain).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    /// Canonical zone id (32 hex chars).
    pub id: String,
    /// Apex domain name.
    pub name: String,
    /// Zone status.
    pub status: ZoneStatus,
    /// Whether Cloudflare is paused for the zone.
    #[serde(default)]
    pub paused: bool,
}

// ============ DNS ============

/// A DNS record, reduced to the fields the console cares about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    /// Record id.
    pub id: String,
    /// Owning zone id.
    pub zone_id: String,
    /// Fully-qualified record name.
    pub name: String,
    /// Record type (`A`, `AAAA`, `CNAME`, ...).
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record content.
    pub content: String,
    /// Whether traffic is proxied through Cloudflare.
    pub proxied: bool,
    /// Whether the record can be proxied at all.
    pub proxiable: bool,
    /// TTL in seconds (1 = automatic).
    pub ttl: u32,
}

impl DnsRecord {
    /// Only address-like records can carry the orange cloud.
    #[must_use]
    pub fn is_proxy_candidate(&self) -> bool {
        matches!(self.record_type.as_str(), "A" | "AAAA" | "CNAME")
    }
}

// ============ Zone settings ============

/// Zone `security_level` setting values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    Off,
    EssentiallyOff,
    Low,
    Medium,
    High,
    UnderAttack,
}

impl SecurityLevel {
    /// Wire value of the setting.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::EssentiallyOff => "essentially_off",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::UnderAttack => "under_attack",
        }
    }

    /// Parse a wire value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(Self::Off),
            "essentially_off" => Some(Self::EssentiallyOff),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "under_attack" => Some(Self::UnderAttack),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_under_attack(&self) -> bool {
        matches!(self, Self::UnderAttack)
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Rulesets ============

/// A rule inside the zone's custom firewall ruleset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRule {
    /// Opaque rule id assigned by Cloudflare.
    pub id: String,
    /// Rule-engine expression.
    pub expression: String,
    /// Action (`block`, `managed_challenge`, `skip`, ...).
    pub action: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Whether the rule is enabled.
    pub enabled: bool,
    /// User-supplied reference, unique within the ruleset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_ref: Option<String>,
    /// Last modification time as reported by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// The zone's `http_request_firewall_custom` entrypoint ruleset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ruleset {
    /// Ruleset id.
    pub id: String,
    /// Ruleset name.
    #[serde(default)]
    pub name: String,
    /// Rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<FirewallRule>,
}

/// Body used to create or update a ruleset rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuleRequest {
    /// Rule-engine expression.
    pub expression: String,
    /// Rule action.
    pub action: String,
    /// Description shown in the dashboard.
    pub description: String,
    /// Whether the rule is enabled.
    pub enabled: bool,
    /// Reference stamped on the rule.
    pub rule_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginated_response_has_more() {
        let resp = PaginatedResponse::new(vec![1, 2, 3], 1, 3, 10);
        assert!(resp.has_more);
        let resp = PaginatedResponse::new(vec![1], 4, 3, 10);
        assert!(!resp.has_more);
    }

    #[test]
    fn pagination_validated_clamps() {
        let p = PaginationParams {
            page: 0,
            page_size: 500,
        }
        .validated(50);
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, 50);
        assert_eq!(p.next_page().page, 2);
    }

    #[test]
    fn zone_status_from_api() {
        assert_eq!(ZoneStatus::from_api("active"), ZoneStatus::Active);
        assert_eq!(ZoneStatus::from_api("initializing"), ZoneStatus::Pending);
        assert_eq!(ZoneStatus::from_api("moved"), ZoneStatus::Moved);
        assert_eq!(ZoneStatus::from_api("weird"), ZoneStatus::Unknown);
    }

    #[test]
    fn security_level_parse_and_display() {
        assert_eq!(
            SecurityLevel::parse("under_attack"),
            Some(SecurityLevel::UnderAttack)
        );
        assert_eq!(SecurityLevel::parse("nope"), None);
        assert_eq!(SecurityLevel::EssentiallyOff.to_string(), "essentially_off");
        assert!(SecurityLevel::UnderAttack.is_under_attack());
        assert!(!SecurityLevel::High.is_under_attack());
    }

    #[test]
    fn security_level_serde_snake_case() {
        let json = serde_json::to_string(&SecurityLevel::UnderAttack).unwrap();
        assert_eq!(json, "\"under_attack\"");
    }

    #[test]
    fn proxy_candidates_are_address_records() {
        let mut record = DnsRecord {
            id: "r1".into(),
            zone_id: "z".into(),
            name: "example.com".into(),
            record_type: "A".into(),
            content: "1.2.3.4".into(),
            proxied: false,
            proxiable: true,
            ttl: 1,
        };
        assert!(record.is_proxy_candidate());
        record.record_type = "TXT".into();
        assert!(!record.is_proxy_candidate());
    }
}
