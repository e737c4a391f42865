//! Bulk operation request and result types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Template id standing for "every template-managed rule" when verifying a clean
pub const ALL_TEMPLATES: &str = "all_templates";

/// Action applied to every target domain of a bulk run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    EnableProxy,
    DisableProxy,
    EnableUnderAttack,
    DisableUnderAttack,
    EnableBotFight,
    DisableBotFight,
    #[serde(rename = "add")]
    AddRules,
    #[serde(rename = "remove")]
    RemoveRules,
    #[serde(rename = "clean")]
    CleanRules,
}

impl BulkAction {
    pub const ALL: [Self; 9] = [
        Self::EnableProxy,
        Self::DisableProxy,
        Self::EnableUnderAttack,
        Self::DisableUnderAttack,
        Self::EnableBotFight,
        Self::DisableBotFight,
        Self::AddRules,
        Self::RemoveRules,
        Self::CleanRules,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EnableProxy => "enable_proxy",
            Self::DisableProxy => "disable_proxy",
            Self::EnableUnderAttack => "enable_under_attack",
            Self::DisableUnderAttack => "disable_under_attack",
            Self::EnableBotFight => "enable_bot_fight",
            Self::DisableBotFight => "disable_bot_fight",
            Self::AddRules => "add",
            Self::RemoveRules => "remove",
            Self::CleanRules => "clean",
        }
    }

    /// Actions operating on the custom firewall ruleset
    pub fn is_rule_action(&self) -> bool {
        matches!(self, Self::AddRules | Self::RemoveRules | Self::CleanRules)
    }

    /// Actions that need `selectedRules`
    pub fn requires_selection(&self) -> bool {
        matches!(self, Self::AddRules | Self::RemoveRules)
    }

    /// Human readable label used in progress descriptions
    pub fn label(&self) -> &'static str {
        match self {
            Self::EnableProxy => "Enabling proxy",
            Self::DisableProxy => "Disabling proxy",
            Self::EnableUnderAttack => "Enabling Under Attack mode",
            Self::DisableUnderAttack => "Disabling Under Attack mode",
            Self::EnableBotFight => "Enabling Bot Fight mode",
            Self::DisableBotFight => "Disabling Bot Fight mode",
            Self::AddRules => "Applying rule templates",
            Self::RemoveRules => "Removing rule templates",
            Self::CleanRules => "Removing all template rules",
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BulkAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| CoreError::ValidationError(format!("Unsupported action: {s}")))
    }
}

/// Bulk operation payload as received on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub target_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_rules: Option<Vec<String>>,
}

impl BulkOperationPayload {
    /// Check the payload before anything is streamed.
    pub fn validate(self) -> Result<BulkOperationRequest, CoreError> {
        let action = self
            .action
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| CoreError::ValidationError("Missing action".to_string()))?
            .parse::<BulkAction>()?;

        if self.target_domains.is_empty() {
            return Err(CoreError::ValidationError(
                "targetDomains must not be empty".to_string(),
            ));
        }
        let targets: Vec<String> = self
            .target_domains
            .iter()
            .map(|t| t.trim().to_string())
            .collect();
        if targets.iter().any(String::is_empty) {
            return Err(CoreError::ValidationError(
                "targetDomains must not contain empty identifiers".to_string(),
            ));
        }

        let selected_rules: Vec<String> = self
            .selected_rules
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if action.requires_selection() && selected_rules.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "selectedRules is required for action {action}"
            )));
        }

        Ok(BulkOperationRequest {
            action,
            targets,
            selected_rules,
        })
    }
}

/// Validated bulk operation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOperationRequest {
    pub action: BulkAction,
    /// Zone ids or domain names, in caller order
    pub targets: Vec<String>,
    /// Template friendly ids or internal ids
    pub selected_rules: Vec<String>,
}

/// Per-domain outcome of a bulk run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationResult {
    pub zone_id: String,
    pub domain_name: String,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Friendly ids affected by a rule action
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_names: Vec<String>,
}

impl BulkOperationResult {
    pub fn succeeded(zone_id: &str, domain_name: &str, message: impl Into<String>) -> Self {
        Self {
            zone_id: zone_id.to_string(),
            domain_name: domain_name.to_string(),
            success: true,
            message: message.into(),
            error: None,
            template_names: Vec::new(),
        }
    }

    pub fn failed(
        zone_id: &str,
        domain_name: &str,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            zone_id: zone_id.to_string(),
            domain_name: domain_name.to_string(),
            success: false,
            message: message.into(),
            error: Some(error.into()),
            template_names: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_templates(mut self, template_names: Vec<String>) -> Self {
        self.template_names = template_names;
        self
    }
}

/// Completion summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

impl BulkSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a BulkOperationResult>) -> Self {
        results.into_iter().fold(Self::default(), |mut acc, r| {
            acc.total += 1;
            if r.success {
                acc.successful += 1;
            } else {
                acc.failed += 1;
            }
            acc
        })
    }
}
