//! Per-domain rule analysis types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::SecurityRulesSummary;

/// State of a template rule deployed on a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedRuleStatus {
    Active,
    Outdated,
}

/// A remote rule traced back to a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedRule {
    pub rule_id: String,
    pub friendly_id: String,
    pub template_id: String,
    pub name: String,
    /// Version recorded on the remote rule
    pub version: String,
    /// Version of the local template
    pub current_version: String,
    pub status: AppliedRuleStatus,
    pub enabled: bool,
}

/// A remote rule not traceable to any known template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomRule {
    pub rule_id: String,
    pub description: String,
    pub action: String,
    pub enabled: bool,
}

/// Rule analysis snapshot of one zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRuleStatus {
    pub zone_id: String,
    pub domain_name: String,
    #[serde(default)]
    pub applied_rules: Vec<AppliedRule>,
    #[serde(default)]
    pub custom_rules: Vec<CustomRule>,
    pub last_analyzed: DateTime<Utc>,
}

impl DomainRuleStatus {
    /// Whether the snapshot is older than `max_age` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.last_analyzed > max_age
    }

    /// Two deployed rules coming from the same template.
    pub fn has_conflicts(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        self.applied_rules
            .iter()
            .any(|rule| !seen.insert(rule.friendly_id.as_str()))
    }

    pub fn summary(&self) -> SecurityRulesSummary {
        let outdated = self
            .applied_rules
            .iter()
            .filter(|r| r.status == AppliedRuleStatus::Outdated)
            .count();
        SecurityRulesSummary {
            total_rules: self.applied_rules.len() + self.custom_rules.len(),
            corporate_rules: self.applied_rules.len(),
            custom_rules: self.custom_rules.len(),
            outdated_rules: outdated,
            has_conflicts: self.has_conflicts(),
            last_analyzed: self.last_analyzed,
        }
    }
}
