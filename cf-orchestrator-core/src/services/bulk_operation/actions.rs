//! Per-domain work of each phase: apply, verify, refresh

use std::cmp::Ordering;
use std::collections::BTreeSet;

use cf_orchestrator_provider::{is_zone_id, ZoneGateway};

use crate::classification::{compare_versions, TemplateMapping};
use crate::error::{CoreError, CoreResult};
use crate::services::TemplateApplyAction;
use crate::types::{
    BulkAction, BulkOperationRequest, BulkOperationResult, DnsRecordRef, RuleTemplate,
    ALL_TEMPLATES,
};

use super::BulkOperationService;

/// Error recorded when phase 2 never sees the expected state
pub(crate) const VERIFICATION_TIMEOUT: &str = "Verification timeout";

/// A target domain after identifier resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub zone_id: String,
    pub domain_name: String,
}

impl Target {
    /// Identifier that could not be resolved; it stays as-is and fails on first use.
    fn unresolved(identifier: &str) -> Self {
        Self {
            zone_id: identifier.to_string(),
            domain_name: identifier.to_string(),
        }
    }
}

/// Remote state phase 2 expects to read back
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expectation {
    Proxy {
        records: Vec<DnsRecordRef>,
        proxied: bool,
    },
    UnderAttack(bool),
    BotFight(bool),
    /// `(friendly_id, version)`; at least one must be deployed at that version or newer
    TemplatesPresent(Vec<(String, String)>),
    /// At least one must be gone. `[ALL_TEMPLATES]` means no template rule may remain.
    TemplatesAbsent(Vec<String>),
}

/// Template selection resolved once per run
#[derive(Debug, Clone, Default)]
pub(crate) struct ActionPlan {
    /// Known templates for `add`
    pub templates: Vec<RuleTemplate>,
    /// Friendly ids for `remove`
    pub friendly_ids: Vec<String>,
}

/// Phase-1 outcome of one domain
#[derive(Debug, Clone)]
pub(crate) struct DomainRun {
    pub target: Target,
    pub result: BulkOperationResult,
    pub expectation: Option<Expectation>,
}

/// Outcome of the verification loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verification {
    Confirmed,
    Mismatch,
    Cancelled,
}

struct Applied {
    message: String,
    template_names: Vec<String>,
    expectation: Expectation,
}

impl BulkOperationService {
    /// Turn caller identifiers into zone id + name, in input order.
    pub(crate) async fn resolve_targets(
        &self,
        gateway: &dyn ZoneGateway,
        identifiers: &[String],
    ) -> Vec<Target> {
        let mut targets = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            if is_zone_id(identifier) {
                let domain_name = self
                    .domains
                    .cached_name(identifier)
                    .await
                    .unwrap_or_else(|| identifier.clone());
                targets.push(Target {
                    zone_id: identifier.clone(),
                    domain_name,
                });
                continue;
            }

            match self.domains.resolve_zone_id(gateway, identifier).await {
                Ok(Some(zone)) => targets.push(Target {
                    zone_id: zone.id,
                    domain_name: zone.name,
                }),
                Ok(None) => {
                    log::warn!("[bulk] No zone found for {identifier}, passing it through");
                    targets.push(Target::unresolved(identifier));
                }
                Err(e) => {
                    log::warn!("[bulk] Failed to resolve {identifier}, passing it through: {e}");
                    targets.push(Target::unresolved(identifier));
                }
            }
        }
        targets
    }

    pub(crate) async fn plan(&self, request: &BulkOperationRequest) -> ActionPlan {
        match request.action {
            BulkAction::AddRules => ActionPlan {
                templates: self.templates.resolve_selection(&request.selected_rules).await,
                friendly_ids: Vec::new(),
            },
            BulkAction::RemoveRules => {
                let known = self.templates.resolve_selection(&request.selected_rules).await;
                let mut friendly_ids: Vec<String> = Vec::new();
                for id in &request.selected_rules {
                    // rules of deleted templates can still be removed by friendly id
                    let friendly_id = known
                        .iter()
                        .find(|t| t.matches_id(id))
                        .map_or_else(|| id.clone(), |t| t.friendly_id.clone());
                    if !friendly_ids.contains(&friendly_id) {
                        friendly_ids.push(friendly_id);
                    }
                }
                ActionPlan {
                    templates: known,
                    friendly_ids,
                }
            }
            _ => ActionPlan::default(),
        }
    }

    /// Phase 1 for one domain. Errors become a failed result, never a panic or abort.
    pub(crate) async fn apply(
        &self,
        gateway: &dyn ZoneGateway,
        action: BulkAction,
        plan: &ActionPlan,
        target: Target,
    ) -> DomainRun {
        match self.apply_action(gateway, action, plan, &target.zone_id).await {
            Ok(applied) => DomainRun {
                result: BulkOperationResult::succeeded(
                    &target.zone_id,
                    &target.domain_name,
                    applied.message,
                )
                .with_templates(applied.template_names),
                expectation: Some(applied.expectation),
                target,
            },
            Err(e) => {
                if e.is_expected() {
                    log::warn!("[bulk] {action} failed for {}: {e}", target.domain_name);
                } else {
                    log::error!("[bulk] {action} failed for {}: {e}", target.domain_name);
                }
                DomainRun {
                    result: BulkOperationResult::failed(
                        &target.zone_id,
                        &target.domain_name,
                        format!("{} failed", action.label()),
                        e.to_string(),
                    ),
                    expectation: None,
                    target,
                }
            }
        }
    }

    async fn apply_action(
        &self,
        gateway: &dyn ZoneGateway,
        action: BulkAction,
        plan: &ActionPlan,
        zone_id: &str,
    ) -> CoreResult<Applied> {
        let applied = match action {
            BulkAction::EnableProxy | BulkAction::DisableProxy => {
                let proxied = action == BulkAction::EnableProxy;
                let records = self.domains.set_proxy(gateway, zone_id, proxied).await?;
                Applied {
                    message: format!(
                        "Proxy {} on {} record(s)",
                        on_off(proxied),
                        records.len()
                    ),
                    template_names: Vec::new(),
                    expectation: Expectation::Proxy { records, proxied },
                }
            }
            BulkAction::EnableUnderAttack | BulkAction::DisableUnderAttack => {
                let enabled = action == BulkAction::EnableUnderAttack;
                let level = self.domains.set_under_attack(gateway, zone_id, enabled).await?;
                Applied {
                    message: format!(
                        "Under Attack mode {} (security level {level})",
                        on_off(enabled)
                    ),
                    template_names: Vec::new(),
                    expectation: Expectation::UnderAttack(enabled),
                }
            }
            BulkAction::EnableBotFight | BulkAction::DisableBotFight => {
                let enabled = action == BulkAction::EnableBotFight;
                self.domains.set_bot_fight(gateway, zone_id, enabled).await?;
                Applied {
                    message: format!("Bot Fight mode {}", on_off(enabled)),
                    template_names: Vec::new(),
                    expectation: Expectation::BotFight(enabled),
                }
            }
            BulkAction::AddRules => {
                if plan.templates.is_empty() {
                    return Err(CoreError::ValidationError(
                        "None of the selected templates exist".to_string(),
                    ));
                }
                let outcomes = self
                    .rules
                    .apply_templates(gateway, zone_id, &plan.templates)
                    .await?;
                let count = |kind: TemplateApplyAction| {
                    outcomes.iter().filter(|o| o.action == kind).count()
                };
                Applied {
                    message: format!(
                        "Applied {} template(s): {} created, {} updated, {} skipped",
                        outcomes.len(),
                        count(TemplateApplyAction::Created),
                        count(TemplateApplyAction::Updated),
                        count(TemplateApplyAction::Skipped)
                    ),
                    template_names: plan.templates.iter().map(|t| t.friendly_id.clone()).collect(),
                    expectation: Expectation::TemplatesPresent(
                        plan.templates
                            .iter()
                            .map(|t| (t.friendly_id.clone(), t.version.clone()))
                            .collect(),
                    ),
                }
            }
            BulkAction::RemoveRules => {
                let outcome = self
                    .rules
                    .remove_templates(gateway, zone_id, &plan.friendly_ids)
                    .await?;
                let message = if outcome.removed_templates.is_empty() {
                    "None of the selected templates were applied".to_string()
                } else {
                    format!(
                        "Removed {} template(s), {} rule(s)",
                        outcome.removed_templates.len(),
                        outcome.rules_deleted
                    )
                };
                Applied {
                    message,
                    expectation: Expectation::TemplatesAbsent(outcome.removed_templates.clone()),
                    template_names: outcome.removed_templates,
                }
            }
            BulkAction::CleanRules => {
                let outcome = self.rules.clean_templates(gateway, zone_id).await?;
                Applied {
                    message: format!("Removed {} template rule(s)", outcome.rules_deleted),
                    template_names: outcome.removed_templates,
                    expectation: Expectation::TemplatesAbsent(vec![ALL_TEMPLATES.to_string()]),
                }
            }
        };
        Ok(applied)
    }

    /// Phase 2 for one domain: read back until the expectation holds or attempts run out.
    pub(crate) async fn verify(
        &self,
        gateway: &dyn ZoneGateway,
        run: &DomainRun,
        cancel: &tokio_util::sync::CancellationToken,
    ) -> Verification {
        let Some(expectation) = &run.expectation else {
            return Verification::Mismatch;
        };
        let attempts = self.ctx.bulk_config.verify_attempts;

        for attempt in 1..=attempts {
            match check(self, gateway, &run.target.zone_id, expectation).await {
                Ok(true) => return Verification::Confirmed,
                Ok(false) => log::debug!(
                    "[bulk] {} not verified yet (attempt {attempt}/{attempts})",
                    run.target.domain_name
                ),
                Err(e) => log::warn!(
                    "[bulk] Verification read failed for {} (attempt {attempt}/{attempts}): {e}",
                    run.target.domain_name
                ),
            }
            if attempt < attempts
                && !super::pause(self.ctx.bulk_config.verify_delay, cancel).await
            {
                return Verification::Cancelled;
            }
        }
        Verification::Mismatch
    }

    /// Phase 3 for one domain.
    pub(crate) async fn refresh(
        &self,
        gateway: &dyn ZoneGateway,
        action: BulkAction,
        zone_id: &str,
    ) -> CoreResult<()> {
        self.domains.refresh_domain(gateway, zone_id).await?;
        if action.is_rule_action() {
            self.rules.analyze(gateway, zone_id, true).await?;
        }
        Ok(())
    }
}

async fn check(
    service: &BulkOperationService,
    gateway: &dyn ZoneGateway,
    zone_id: &str,
    expectation: &Expectation,
) -> CoreResult<bool> {
    let matched = match expectation {
        Expectation::Proxy { records, proxied } => {
            let names: BTreeSet<&str> = records.iter().map(|r| r.name.as_str()).collect();
            let mut current = Vec::new();
            for name in names {
                current.extend(gateway.list_dns_records(zone_id, Some(name)).await?);
            }
            records.iter().all(|expected| {
                current
                    .iter()
                    .any(|r| r.id == expected.id && r.proxied == *proxied)
            })
        }
        Expectation::UnderAttack(enabled) => {
            gateway.get_security_level(zone_id).await?.is_under_attack() == *enabled
        }
        Expectation::BotFight(enabled) => gateway.get_bot_fight_mode(zone_id).await? == *enabled,
        Expectation::TemplatesPresent(expected) => {
            let mapping = service.rules.deployed(gateway, zone_id).await?;
            expected.is_empty()
                || expected.iter().any(|(friendly_id, version)| {
                    mapping
                        .deployed_version(friendly_id)
                        .is_some_and(|v| compare_versions(v, version) != Ordering::Less)
                })
        }
        Expectation::TemplatesAbsent(expected) => {
            if expected.is_empty() {
                return Ok(true);
            }
            let mapping: TemplateMapping = service.rules.deployed(gateway, zone_id).await?;
            if expected.iter().any(|id| id == ALL_TEMPLATES) {
                mapping.is_empty()
            } else {
                expected.iter().any(|id| !mapping.contains_template(id))
            }
        }
    };
    Ok(matched)
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}
