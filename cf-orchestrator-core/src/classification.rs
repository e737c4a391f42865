//! Rule classification
//!
//! Template rules carry a `ref` of the form `tpl_{friendlyId}_v{version}`.
//! [`TemplateMapping`] rebuilds rule id → template from those refs and
//! [`TemplateVersionMap`] holds the current local version per friendly id.
//! A remote rule is either a template instance or custom, never both.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    AppliedRule, AppliedRuleStatus, CustomRule, DomainRuleStatus, FirewallRule, RuleTemplate,
    Ruleset,
};

const REF_PREFIX: &str = "tpl_";
const VERSION_MARKER: &str = "_v";

// ============ Versions ============

/// Compare dotted versions numerically per component (`1.10` > `1.9`, `1.0` == `1`).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = a.trim().split('.').collect();
    let right: Vec<&str> = b.trim().split('.').collect();
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or("0");
        let r = right.get(i).copied().unwrap_or("0");
        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(l), Ok(r)) => l.cmp(&r),
            _ => l.cmp(r),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Next version after `version`: the last numeric component is incremented.
pub fn bump_version(version: &str) -> String {
    let mut parts: Vec<String> = version.trim().split('.').map(str::to_string).collect();
    match parts.last().and_then(|p| p.parse::<u64>().ok()) {
        Some(last) => {
            if let Some(slot) = parts.last_mut() {
                *slot = (last + 1).to_string();
            }
            parts.join(".")
        }
        None => format!("{}.1", version.trim()),
    }
}

// ============ Template refs ============

/// Parsed `tpl_{friendlyId}_v{version}` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    pub friendly_id: String,
    pub version: String,
}

impl TemplateRef {
    pub fn new(friendly_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            friendly_id: friendly_id.into(),
            version: version.into(),
        }
    }

    pub fn for_template(template: &RuleTemplate) -> Self {
        Self::new(&template.friendly_id, &template.version)
    }

    pub fn encode(&self) -> String {
        format!(
            "{REF_PREFIX}{}{VERSION_MARKER}{}",
            self.friendly_id, self.version
        )
    }

    pub fn parse(rule_ref: &str) -> Option<Self> {
        let rest = rule_ref.strip_prefix(REF_PREFIX)?;
        let (friendly_id, version) = rest.rsplit_once(VERSION_MARKER)?;
        if friendly_id.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(friendly_id, version))
    }
}

// ============ Mapping tables ============

/// Remote rule id → template ref, built from a ruleset
#[derive(Debug, Clone, Default)]
pub struct TemplateMapping {
    by_rule: HashMap<String, TemplateRef>,
}

impl TemplateMapping {
    pub fn from_rules<'a>(rules: impl IntoIterator<Item = &'a FirewallRule>) -> Self {
        let by_rule = rules
            .into_iter()
            .filter_map(|rule| {
                let template_ref = TemplateRef::parse(rule.rule_ref.as_deref()?)?;
                Some((rule.id.clone(), template_ref))
            })
            .collect();
        Self { by_rule }
    }

    pub fn from_ruleset(ruleset: Option<&Ruleset>) -> Self {
        ruleset.map_or_else(Self::default, |rs| Self::from_rules(&rs.rules))
    }

    pub fn get(&self, rule_id: &str) -> Option<&TemplateRef> {
        self.by_rule.get(rule_id)
    }

    pub fn is_empty(&self) -> bool {
        self.by_rule.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_rule.len()
    }

    /// Rule ids deployed from `friendly_id`, sorted.
    pub fn rule_ids_for(&self, friendly_id: &str) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .by_rule
            .iter()
            .filter(|(_, r)| r.friendly_id.eq_ignore_ascii_case(friendly_id))
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Highest deployed version of `friendly_id`.
    pub fn deployed_version(&self, friendly_id: &str) -> Option<&str> {
        self.by_rule
            .values()
            .filter(|r| r.friendly_id.eq_ignore_ascii_case(friendly_id))
            .map(|r| r.version.as_str())
            .max_by(|a, b| compare_versions(a, b))
    }

    pub fn contains_template(&self, friendly_id: &str) -> bool {
        self.deployed_version(friendly_id).is_some()
    }

    /// All rule ids that carry a template ref, sorted.
    pub fn rule_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_rule.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

/// Current local template per friendly id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVersion {
    pub template_id: String,
    pub name: String,
    pub current_version: String,
}

/// Friendly id → current template version
#[derive(Debug, Clone, Default)]
pub struct TemplateVersionMap {
    by_friendly_id: HashMap<String, TemplateVersion>,
}

impl TemplateVersionMap {
    pub fn from_templates<'a>(templates: impl IntoIterator<Item = &'a RuleTemplate>) -> Self {
        let by_friendly_id = templates
            .into_iter()
            .map(|t| {
                (
                    t.friendly_id.to_ascii_uppercase(),
                    TemplateVersion {
                        template_id: t.id.clone(),
                        name: t.name.clone(),
                        current_version: t.version.clone(),
                    },
                )
            })
            .collect();
        Self { by_friendly_id }
    }

    pub fn get(&self, friendly_id: &str) -> Option<&TemplateVersion> {
        self.by_friendly_id.get(&friendly_id.to_ascii_uppercase())
    }
}

// ============ Classification ============

/// Classification of a single remote rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RuleClassification {
    Template {
        template_id: String,
        friendly_id: String,
        version: String,
        current_version: String,
        is_outdated: bool,
    },
    Custom,
}

/// Classify `rule_id`. Rules whose ref names an unknown template are custom.
pub fn classify(
    rule_id: &str,
    mapping: &TemplateMapping,
    versions: &TemplateVersionMap,
) -> RuleClassification {
    let Some(template_ref) = mapping.get(rule_id) else {
        return RuleClassification::Custom;
    };
    let Some(current) = versions.get(&template_ref.friendly_id) else {
        return RuleClassification::Custom;
    };
    RuleClassification::Template {
        template_id: current.template_id.clone(),
        friendly_id: template_ref.friendly_id.clone(),
        version: template_ref.version.clone(),
        current_version: current.current_version.clone(),
        is_outdated: compare_versions(&template_ref.version, &current.current_version)
            == Ordering::Less,
    }
}

/// Builds [`DomainRuleStatus`] snapshots from remote rulesets
pub struct RuleAnalyzer<'a> {
    versions: &'a TemplateVersionMap,
}

impl<'a> RuleAnalyzer<'a> {
    pub fn new(versions: &'a TemplateVersionMap) -> Self {
        Self { versions }
    }

    pub fn analyze(
        &self,
        zone_id: &str,
        domain_name: &str,
        ruleset: Option<&Ruleset>,
        analyzed_at: DateTime<Utc>,
    ) -> DomainRuleStatus {
        let mapping = TemplateMapping::from_ruleset(ruleset);
        let mut applied_rules = Vec::new();
        let mut custom_rules = Vec::new();

        for rule in ruleset.map(|rs| rs.rules.as_slice()).unwrap_or_default() {
            match classify(&rule.id, &mapping, self.versions) {
                RuleClassification::Template {
                    template_id,
                    friendly_id,
                    version,
                    current_version,
                    is_outdated,
                } => {
                    let name = self
                        .versions
                        .get(&friendly_id)
                        .map(|v| v.name.clone())
                        .unwrap_or_default();
                    applied_rules.push(AppliedRule {
                        rule_id: rule.id.clone(),
                        friendly_id,
                        template_id,
                        name,
                        version,
                        current_version,
                        status: if is_outdated {
                            AppliedRuleStatus::Outdated
                        } else {
                            AppliedRuleStatus::Active
                        },
                        enabled: rule.enabled,
                    });
                }
                RuleClassification::Custom => custom_rules.push(CustomRule {
                    rule_id: rule.id.clone(),
                    description: rule.description.clone(),
                    action: rule.action.clone(),
                    enabled: rule.enabled,
                }),
            }
        }

        DomainRuleStatus {
            zone_id: zone_id.to_string(),
            domain_name: domain_name.to_string(),
            applied_rules,
            custom_rules,
            last_analyzed: analyzed_at,
        }
    }
}
