//! Rule template type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version assigned to a newly created template
pub const INITIAL_TEMPLATE_VERSION: &str = "1.0";

/// Rule actions a template may carry
pub const TEMPLATE_ACTIONS: &[&str] = &[
    "block",
    "challenge",
    "js_challenge",
    "managed_challenge",
    "log",
    "skip",
];

/// Reusable, versioned security rule definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleTemplate {
    /// Internal stable id
    pub id: String,
    /// Short code such as `R01`
    pub friendly_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub expression: String,
    pub action: String,
    /// Dotted numeric version
    pub version: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl RuleTemplate {
    /// Whether `id` names this template, by internal id or friendly id.
    pub fn matches_id(&self, id: &str) -> bool {
        self.id == id || self.friendly_id.eq_ignore_ascii_case(id)
    }

    /// Description stamped on remote rules created from this template.
    pub fn rule_description(&self) -> String {
        format!("[{}] {}", self.friendly_id, self.name)
    }
}

/// Create template request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    /// Generated (`R01`, `R02`, ...) when omitted
    #[serde(default)]
    pub friendly_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub expression: String,
    pub action: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Update template request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub expression: Option<String>,
    pub action: Option<String>,
    pub enabled: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl UpdateTemplateRequest {
    /// Whether applying this request changes what gets deployed remotely.
    pub fn changes_content(&self, template: &RuleTemplate) -> bool {
        fn differs(new: Option<&String>, old: &str) -> bool {
            new.is_some_and(|v| v != old)
        }
        differs(self.name.as_ref(), &template.name)
            || differs(self.description.as_ref(), &template.description)
            || differs(self.expression.as_ref(), &template.expression)
            || differs(self.action.as_ref(), &template.action)
    }
}
