//! Cloudflare API wire types

use serde::{Deserialize, Serialize};

use crate::types::{DnsRecord, FirewallRule, RuleRequest, Ruleset, Zone, ZoneStatus};

/// Standard Cloudflare response envelope
#[derive(Debug, Deserialize)]
pub struct CloudflareResponse<T> {
    pub success: bool,
    pub result: Option<T>,
    pub errors: Option<Vec<CloudflareError>>,
    pub result_info: Option<CloudflareResultInfo>,
}

impl<T> CloudflareResponse<T> {
    /// First error as `(code, message)`.
    pub fn first_error(&self) -> (String, String) {
        self.errors
            .as_ref()
            .and_then(|errors| {
                errors
                    .first()
                    .map(|e| (e.code.to_string(), e.message.clone()))
            })
            .unwrap_or_else(|| (String::new(), "Unknown error".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct CloudflareError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CloudflareResultInfo {
    #[allow(dead_code)]
    pub page: Option<u32>,
    #[allow(dead_code)]
    pub per_page: Option<u32>,
    pub total_count: Option<u32>,
}

/// Zone
#[derive(Debug, Deserialize)]
pub struct CloudflareZone {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub paused: bool,
}

impl From<CloudflareZone> for Zone {
    fn from(zone: CloudflareZone) -> Self {
        Self {
            status: ZoneStatus::from_api(&zone.status),
            id: zone.id,
            name: zone.name,
            paused: zone.paused,
        }
    }
}

/// DNS record (response)
#[derive(Debug, Deserialize)]
pub struct CloudflareDnsRecord {
    pub id: String,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub proxied: Option<bool>,
    #[serde(default)]
    pub proxiable: Option<bool>,
    #[serde(default)]
    pub ttl: Option<u32>,
}

impl CloudflareDnsRecord {
    pub fn into_record(self, zone_id: &str) -> DnsRecord {
        DnsRecord {
            id: self.id,
            zone_id: self.zone_id.unwrap_or_else(|| zone_id.to_string()),
            name: self.name,
            record_type: self.record_type,
            content: self.content,
            proxied: self.proxied.unwrap_or(false),
            proxiable: self.proxiable.unwrap_or(false),
            ttl: self.ttl.unwrap_or(1),
        }
    }
}

/// Single zone setting (`/settings/{id}`)
#[derive(Debug, Deserialize)]
pub struct CloudflareSetting {
    #[allow(dead_code)]
    pub id: String,
    pub value: serde_json::Value,
}

/// Bot management configuration (only the fields we read)
#[derive(Debug, Deserialize)]
pub struct CloudflareBotManagement {
    #[serde(default)]
    pub fight_mode: Option<bool>,
}

/// Ruleset
#[derive(Debug, Deserialize)]
pub struct CloudflareRuleset {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rules: Option<Vec<CloudflareRule>>,
}

impl From<CloudflareRuleset> for Ruleset {
    fn from(ruleset: CloudflareRuleset) -> Self {
        Self {
            id: ruleset.id,
            name: ruleset.name.unwrap_or_default(),
            rules: ruleset
                .rules
                .unwrap_or_default()
                .into_iter()
                .map(FirewallRule::from)
                .collect(),
        }
    }
}

/// Ruleset rule (response)
#[derive(Debug, Deserialize)]
pub struct CloudflareRule {
    pub id: String,
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(rename = "ref", default)]
    pub rule_ref: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl From<CloudflareRule> for FirewallRule {
    fn from(rule: CloudflareRule) -> Self {
        Self {
            id: rule.id,
            expression: rule.expression,
            action: rule.action,
            description: rule.description.unwrap_or_default(),
            enabled: rule.enabled.unwrap_or(true),
            rule_ref: rule.rule_ref,
            last_updated: rule.last_updated,
        }
    }
}

/// Ruleset rule (request body)
#[derive(Debug, Serialize)]
pub struct CloudflareRuleBody {
    pub expression: String,
    pub action: String,
    pub description: String,
    pub enabled: bool,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub rule_ref: Option<String>,
}

impl From<&RuleRequest> for CloudflareRuleBody {
    fn from(req: &RuleRequest) -> Self {
        Self {
            expression: req.expression.clone(),
            action: req.action.clone(),
            description: req.description.clone(),
            enabled: req.enabled,
            rule_ref: req.rule_ref.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ruleset_envelope_deserializes() {
        let json = r#"{
            "success": true,
            "errors": [],
            "result": {
                "id": "rs1",
                "name": "default",
                "phase": "http_request_firewall_custom",
                "rules": [
                    {"id": "r1", "expression": "ip.src eq 1.1.1.1", "action": "block",
                     "description": "[R01] Block", "enabled": true, "ref": "tpl_R01_v1.0"},
                    {"id": "r2", "expression": "true", "action": "log"}
                ]
            }
        }"#;
        let resp: CloudflareResponse<CloudflareRuleset> = serde_json::from_str(json).unwrap();
        let ruleset = Ruleset::from(resp.result.unwrap());
        assert_eq!(ruleset.rules.len(), 2);
        assert_eq!(ruleset.rules[0].rule_ref.as_deref(), Some("tpl_R01_v1.0"));
        assert!(ruleset.rules[1].enabled);
        assert_eq!(ruleset.rules[1].description, "");
    }

    #[test]
    fn error_envelope_first_error() {
        let json = r#"{
            "success": false,
            "errors": [{"code": 10000, "message": "Authentication error"}],
            "result": null
        }"#;
        let resp: CloudflareResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert_eq!(
            resp.first_error(),
            ("10000".to_string(), "Authentication error".to_string())
        );
    }

    #[test]
    fn rule_body_serializes_ref() {
        let body = CloudflareRuleBody::from(&RuleRequest {
            expression: "true".into(),
            action: "block".into(),
            description: "d".into(),
            enabled: true,
            rule_ref: Some("tpl_R01_v2".into()),
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["ref"], "tpl_R01_v2");
    }

    #[test]
    fn dns_record_defaults() {
        let json = r#"{"id":"d1","type":"A","name":"example.com","content":"1.2.3.4"}"#;
        let raw: CloudflareDnsRecord = serde_json::from_str(json).unwrap();
        let record = raw.into_record("zone1");
        assert_eq!(record.zone_id, "zone1");
        assert!(!record.proxied);
        assert_eq!(record.ttl, 1);
    }
}
