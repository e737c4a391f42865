//! Firewall rule deployment and analysis service

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use cf_orchestrator_provider::ZoneGateway;

use crate::classification::{compare_versions, RuleAnalyzer, TemplateMapping, TemplateRef};
use crate::error::CoreResult;
use crate::services::{ServiceContext, TemplateService};
use crate::types::{DomainRuleStatus, FirewallRule, RuleRequest, RuleTemplate, Ruleset};

/// What `apply_template` did on a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateApplyAction {
    Created,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutcome {
    pub friendly_id: String,
    pub rule_id: String,
    pub action: TemplateApplyAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalOutcome {
    /// Friendly ids that had at least one rule deleted
    pub removed_templates: Vec<String>,
    pub rules_deleted: usize,
}

/// Firewall rule deployment and analysis service
pub struct RuleService {
    ctx: Arc<ServiceContext>,
    templates: TemplateService,
}

impl RuleService {
    /// Create rule service instance
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            templates: TemplateService::new(ctx.clone()),
            ctx,
        }
    }

    /// Rule analysis of a zone. Cached snapshots younger than the staleness window are
    /// returned as-is unless `force` is set.
    pub async fn analyze(
        &self,
        gateway: &dyn ZoneGateway,
        zone_id: &str,
        force: bool,
    ) -> CoreResult<DomainRuleStatus> {
        if !force {
            if let Some(cached) = self.ctx.cache.find_rule_status(zone_id).await {
                let max_age = self.ctx.bulk_config.rule_status_max_age();
                if !cached.is_stale(Utc::now(), max_age) {
                    log::debug!("[rules] Using cached analysis for {zone_id}");
                    return Ok(cached);
                }
            }
        }

        let domain_name = match self.ctx.cache.find_domain(zone_id).await {
            Some(domain) => domain.name,
            None => gateway.get_zone(zone_id).await?.name,
        };
        let ruleset = gateway.get_custom_ruleset(zone_id).await?;
        let versions = self.templates.version_map().await;
        let status =
            RuleAnalyzer::new(&versions).analyze(
                zone_id,
                &domain_name,
                ruleset.as_ref(),
                Utc::now(),
            );

        self.ctx.cache.save_rule_status(status.clone()).await?;
        let summary = status.summary();
        self.ctx
            .cache
            .update_domain(zone_id, |d| d.security_rules = Some(summary))
            .await?;

        log::debug!(
            "[rules] Analyzed {domain_name}: {} template rule(s), {} custom",
            status.applied_rules.len(),
            status.custom_rules.len()
        );
        Ok(status)
    }

    /// Deploy one template. Current rules are skipped, older ones updated in place.
    pub async fn apply_template(
        &self,
        gateway: &dyn ZoneGateway,
        zone_id: &str,
        template: &RuleTemplate,
    ) -> CoreResult<ApplyOutcome> {
        let mut ruleset = gateway.get_custom_ruleset(zone_id).await?;
        apply_to_ruleset(gateway, zone_id, &mut ruleset, template).await
    }

    /// Deploy several templates in order, reading the ruleset once.
    pub async fn apply_templates(
        &self,
        gateway: &dyn ZoneGateway,
        zone_id: &str,
        templates: &[RuleTemplate],
    ) -> CoreResult<Vec<ApplyOutcome>> {
        let mut ruleset = gateway.get_custom_ruleset(zone_id).await?;
        let mut outcomes = Vec::with_capacity(templates.len());
        for template in templates {
            outcomes.push(apply_to_ruleset(gateway, zone_id, &mut ruleset, template).await?);
        }
        Ok(outcomes)
    }

    /// Delete every rule deployed from the given templates.
    pub async fn remove_templates(
        &self,
        gateway: &dyn ZoneGateway,
        zone_id: &str,
        friendly_ids: &[String],
    ) -> CoreResult<RemovalOutcome> {
        let Some(ruleset) = gateway.get_custom_ruleset(zone_id).await? else {
            return Ok(RemovalOutcome::default());
        };
        let mapping = TemplateMapping::from_rules(&ruleset.rules);

        let mut outcome = RemovalOutcome::default();
        for friendly_id in friendly_ids {
            let rule_ids = mapping.rule_ids_for(friendly_id);
            if rule_ids.is_empty() {
                continue;
            }
            for rule_id in &rule_ids {
                gateway.delete_rule(zone_id, &ruleset.id, rule_id).await?;
                outcome.rules_deleted += 1;
            }
            outcome.removed_templates.push(friendly_id.clone());
        }
        Ok(outcome)
    }

    /// Delete every template-managed rule. Custom rules stay.
    pub async fn clean_templates(
        &self,
        gateway: &dyn ZoneGateway,
        zone_id: &str,
    ) -> CoreResult<RemovalOutcome> {
        let Some(ruleset) = gateway.get_custom_ruleset(zone_id).await? else {
            return Ok(RemovalOutcome::default());
        };
        let mapping = TemplateMapping::from_rules(&ruleset.rules);

        let mut outcome = RemovalOutcome::default();
        for rule_id in mapping.rule_ids() {
            gateway.delete_rule(zone_id, &ruleset.id, rule_id).await?;
            outcome.rules_deleted += 1;
            if let Some(template_ref) = mapping.get(rule_id) {
                if !outcome.removed_templates.contains(&template_ref.friendly_id) {
                    outcome
                        .removed_templates
                        .push(template_ref.friendly_id.clone());
                }
            }
        }
        Ok(outcome)
    }

    /// Template refs currently deployed on a zone.
    pub async fn deployed(
        &self,
        gateway: &dyn ZoneGateway,
        zone_id: &str,
    ) -> CoreResult<TemplateMapping> {
        let ruleset = gateway.get_custom_ruleset(zone_id).await?;
        Ok(TemplateMapping::from_ruleset(ruleset.as_ref()))
    }
}

async fn apply_to_ruleset(
    gateway: &dyn ZoneGateway,
    zone_id: &str,
    ruleset: &mut Option<Ruleset>,
    template: &RuleTemplate,
) -> CoreResult<ApplyOutcome> {
    let template_ref = TemplateRef::for_template(template);
    let request = RuleRequest {
        expression: template.expression.clone(),
        action: template.action.clone(),
        description: template.rule_description(),
        enabled: template.enabled,
        rule_ref: Some(template_ref.encode()),
    };

    let existing = ruleset.as_ref().and_then(|rs| {
        let mapping = TemplateMapping::from_rules(&rs.rules);
        let rule_id = mapping.rule_ids_for(&template.friendly_id).first()?.to_string();
        let version = mapping.get(&rule_id)?.version.clone();
        Some((rs.id.clone(), rule_id, version))
    });

    let outcome = match existing {
        Some((_, rule_id, version))
            if compare_versions(&version, &template.version) != Ordering::Less =>
        {
            log::debug!(
                "[rules] {} already at {version} on {zone_id}, skipping",
                template.friendly_id
            );
            ApplyOutcome {
                friendly_id: template.friendly_id.clone(),
                rule_id,
                action: TemplateApplyAction::Skipped,
            }
        }
        Some((ruleset_id, rule_id, version)) => {
            let rule = gateway
                .update_rule(zone_id, &ruleset_id, &rule_id, &request)
                .await?;
            log::info!(
                "[rules] Updated {} on {zone_id}: {version} -> {}",
                template.friendly_id,
                template.version
            );
            replace_rule(ruleset, rule.clone());
            ApplyOutcome {
                friendly_id: template.friendly_id.clone(),
                rule_id: rule.id,
                action: TemplateApplyAction::Updated,
            }
        }
        None => {
            let ruleset_id = ruleset.as_ref().map(|rs| rs.id.clone());
            let rule = gateway
                .create_rule(zone_id, ruleset_id.as_deref(), &request)
                .await?;
            log::info!(
                "[rules] Created {} v{} on {zone_id}",
                template.friendly_id,
                template.version
            );
            if ruleset.is_none() {
                // The entrypoint was just created; read it back for its id
                *ruleset = gateway.get_custom_ruleset(zone_id).await?;
            } else {
                replace_rule(ruleset, rule.clone());
            }
            ApplyOutcome {
                friendly_id: template.friendly_id.clone(),
                rule_id: rule.id,
                action: TemplateApplyAction::Created,
            }
        }
    };
    Ok(outcome)
}

/// Keep the local copy of the ruleset in sync after a write.
fn replace_rule(ruleset: &mut Option<Ruleset>, rule: FirewallRule) {
    if let Some(rs) = ruleset {
        match rs.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => rs.rules.push(rule),
        }
    }
}
