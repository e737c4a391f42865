//! Test helpers
//!
//! An in-memory gateway plus fixture factories.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

use cf_orchestrator_provider::{
    normalize_domain_name, www_name, DnsRecord, FirewallRule, GatewayError, PaginatedResponse,
    PaginationParams, Result, RuleRequest, Ruleset, SecurityLevel, Zone, ZoneGateway, ZoneStatus,
};

use crate::cache::TemplateCache;
use crate::config::BulkConfig;
use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::traits::{InMemoryStore, KeyValueStore};
use crate::types::{Domain, RuleTemplate};

// ===== Fixtures =====

/// A valid-looking zone id.
pub fn zone_id(n: u32) -> String {
    format!("{n:032x}")
}

pub fn domain(zone_id: &str, name: &str) -> Domain {
    Domain::from_zone(Zone {
        id: zone_id.to_string(),
        name: name.to_string(),
        status: ZoneStatus::Active,
        paused: false,
    })
}

pub fn template(friendly_id: &str, version: &str) -> RuleTemplate {
    let now = Utc::now();
    RuleTemplate {
        id: format!("id-{}", friendly_id.to_ascii_lowercase()),
        friendly_id: friendly_id.to_string(),
        name: format!("Template {friendly_id}"),
        description: String::new(),
        expression: format!("(http.request.uri.path contains \"/{friendly_id}\")"),
        action: "block".to_string(),
        version: version.to_string(),
        enabled: true,
        tags: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn remote_rule(id: &str, rule_ref: Option<&str>) -> FirewallRule {
    FirewallRule {
        id: id.to_string(),
        expression: "true".to_string(),
        action: "block".to_string(),
        description: String::new(),
        enabled: true,
        rule_ref: rule_ref.map(str::to_string),
        last_updated: None,
    }
}

/// Defaults with millisecond delays.
pub fn fast_config() -> BulkConfig {
    BulkConfig {
        batch_delay: Duration::from_millis(1),
        verify_delay: Duration::from_millis(1),
        ..BulkConfig::default()
    }
}

pub fn context() -> Arc<ServiceContext> {
    Arc::new(ServiceContext::new(
        Arc::new(InMemoryStore::new()),
        fast_config(),
    ))
}

pub async fn context_with_templates(templates: Vec<RuleTemplate>) -> Arc<ServiceContext> {
    let ctx = context();
    ctx.cache
        .save_templates(&TemplateCache {
            templates,
            last_updated: Some(Utc::now()),
        })
        .await
        .unwrap();
    ctx
}

pub fn context_with_store(store: Arc<dyn KeyValueStore>) -> Arc<ServiceContext> {
    Arc::new(ServiceContext::new(store, fast_config()))
}

// ===== Stores =====

/// In-memory store that yields to the scheduler around every access, so
/// concurrent read-modify-write cycles interleave. Saves can be made to fail.
#[derive(Default)]
pub struct YieldingStore {
    inner: InMemoryStore,
    failing_saves: AtomicBool,
}

impl YieldingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_saves(&self, fail: bool) {
        self.failing_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for YieldingStore {
    async fn load(&self, key: &str) -> CoreResult<Option<serde_json::Value>> {
        tokio::task::yield_now().await;
        let value = self.inner.load(key).await;
        tokio::task::yield_now().await;
        value
    }

    async fn save(&self, key: &str, value: &serde_json::Value) -> CoreResult<()> {
        tokio::task::yield_now().await;
        if self.failing_saves.load(Ordering::SeqCst) {
            return Err(CoreError::StorageError("disk full".to_string()));
        }
        self.inner.save(key, value).await
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.inner.delete(key).await
    }
}

// ===== MockGateway =====

#[derive(Default)]
struct GatewayState {
    zones: Vec<Zone>,
    records: HashMap<String, Vec<DnsRecord>>,
    levels: HashMap<String, SecurityLevel>,
    bot_fight: HashMap<String, bool>,
    rulesets: HashMap<String, Ruleset>,
    /// Writes fail with a network error
    failing_writes: HashSet<String>,
    /// Writes report success but change nothing
    dropped_writes: HashSet<String>,
    /// `get_zone` fails
    failing_refresh: HashSet<String>,
    cancel_on_touch: HashMap<String, CancellationToken>,
    cancel_on_call: HashMap<(String, String), CancellationToken>,
    calls: Vec<String>,
    next_id: u64,
}

impl GatewayState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn check_write(&self, zone_id: &str) -> Result<bool> {
        if self.failing_writes.contains(zone_id) {
            return Err(GatewayError::NetworkError {
                detail: "connection reset".to_string(),
            });
        }
        Ok(!self.dropped_writes.contains(zone_id))
    }

    fn ruleset_mut(&mut self, zone_id: &str, ruleset_id: &str) -> Result<&mut Ruleset> {
        self.rulesets
            .get_mut(zone_id)
            .filter(|rs| rs.id == ruleset_id)
            .ok_or_else(|| GatewayError::InvalidParameter {
                param: "ruleset_id".to_string(),
                detail: format!("unknown ruleset {ruleset_id}"),
            })
    }
}

/// In-memory stand-in for the Cloudflare API.
///
/// Unknown zones answer `ZoneNotFound`. Every call is logged by method name.
pub struct MockGateway {
    state: RwLock<GatewayState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(GatewayState::default()),
        }
    }

    /// Zone with a proxied-off `A` apex record and `www` CNAME.
    pub fn with_zone(self, zone_id: &str, name: &str) -> Self {
        let zone = self.with_bare_zone(zone_id, name);
        {
            let mut state = zone.state.try_write().unwrap();
            let apex = record(&mut state, zone_id, &normalize_domain_name(name), "A", "192.0.2.1");
            let www = record(&mut state, zone_id, &www_name(name), "CNAME", name);
            state
                .records
                .insert(zone_id.to_string(), vec![apex, www]);
        }
        zone
    }

    /// Zone without DNS records.
    pub fn with_bare_zone(self, zone_id: &str, name: &str) -> Self {
        {
            let mut state = self.state.try_write().unwrap();
            state.zones.push(Zone {
                id: zone_id.to_string(),
                name: normalize_domain_name(name),
                status: ZoneStatus::Active,
                paused: false,
            });
            state.levels.insert(zone_id.to_string(), SecurityLevel::Medium);
            state.bot_fight.insert(zone_id.to_string(), false);
        }
        self
    }

    pub async fn set_level(&self, zone_id: &str, level: SecurityLevel) {
        self.state
            .write()
            .await
            .levels
            .insert(zone_id.to_string(), level);
    }

    pub async fn seed_rules(&self, zone_id: &str, rules: Vec<FirewallRule>) {
        self.state.write().await.rulesets.insert(
            zone_id.to_string(),
            Ruleset {
                id: format!("rs-{zone_id}"),
                name: "default".to_string(),
                rules,
            },
        );
    }

    pub async fn rules(&self, zone_id: &str) -> Vec<FirewallRule> {
        self.state
            .read()
            .await
            .rulesets
            .get(zone_id)
            .map(|rs| rs.rules.clone())
            .unwrap_or_default()
    }

    pub async fn call_count(&self, method: &str) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|c| *c == method)
            .count()
    }

    pub async fn fail_writes(&self, zone_id: &str) {
        self.state
            .write()
            .await
            .failing_writes
            .insert(zone_id.to_string());
    }

    pub async fn drop_writes(&self, zone_id: &str) {
        self.state
            .write()
            .await
            .dropped_writes
            .insert(zone_id.to_string());
    }

    pub async fn fail_refresh(&self, zone_id: &str) {
        self.state
            .write()
            .await
            .failing_refresh
            .insert(zone_id.to_string());
    }

    /// Cancel `token` on the first call that touches `zone_id`.
    pub async fn cancel_when_touched(&self, zone_id: &str, token: CancellationToken) {
        self.state
            .write()
            .await
            .cancel_on_touch
            .insert(zone_id.to_string(), token);
    }

    /// Cancel `token` on the first `method` call for `zone_id`. The call itself still succeeds.
    pub async fn cancel_when_called(&self, method: &str, zone_id: &str, token: CancellationToken) {
        self.state
            .write()
            .await
            .cancel_on_call
            .insert((method.to_string(), zone_id.to_string()), token);
    }

    async fn enter(
        &self,
        method: &str,
        zone_id: &str,
    ) -> Result<RwLockWriteGuard<'_, GatewayState>> {
        let mut state = self.state.write().await;
        state.calls.push(method.to_string());
        if let Some(token) = state.cancel_on_touch.get(zone_id) {
            token.cancel();
        }
        if let Some(token) = state
            .cancel_on_call
            .get(&(method.to_string(), zone_id.to_string()))
        {
            token.cancel();
        }
        if !state.zones.iter().any(|z| z.id == zone_id) {
            return Err(GatewayError::ZoneNotFound {
                zone: zone_id.to_string(),
                raw_message: None,
            });
        }
        Ok(state)
    }
}

fn record(
    state: &mut GatewayState,
    zone_id: &str,
    name: &str,
    kind: &str,
    content: &str,
) -> DnsRecord {
    DnsRecord {
        id: state.next_id("rec"),
        zone_id: zone_id.to_string(),
        name: name.to_string(),
        record_type: kind.to_string(),
        content: content.to_string(),
        proxied: false,
        proxiable: true,
        ttl: 1,
    }
}

fn apply_request(rule: &mut FirewallRule, request: &RuleRequest) {
    rule.expression.clone_from(&request.expression);
    rule.action.clone_from(&request.action);
    rule.description.clone_from(&request.description);
    rule.enabled = request.enabled;
    rule.rule_ref.clone_from(&request.rule_ref);
    rule.last_updated = Some(Utc::now().to_rfc3339());
}

#[async_trait]
impl ZoneGateway for MockGateway {
    async fn verify_token(&self) -> Result<bool> {
        Ok(true)
    }

    async fn list_zones(&self, params: &PaginationParams) -> Result<PaginatedResponse<Zone>> {
        let mut state = self.state.write().await;
        state.calls.push("list_zones".to_string());
        let total = u32::try_from(state.zones.len()).unwrap_or(u32::MAX);
        Ok(PaginatedResponse::new(
            state.zones.clone(),
            params.page,
            total.max(1),
            total,
        ))
    }

    async fn get_zone(&self, zone_id: &str) -> Result<Zone> {
        let state = self.enter("get_zone", zone_id).await?;
        if state.failing_refresh.contains(zone_id) {
            return Err(GatewayError::Timeout {
                detail: "zone lookup timed out".to_string(),
            });
        }
        state
            .zones
            .iter()
            .find(|z| z.id == zone_id)
            .cloned()
            .ok_or_else(|| GatewayError::ZoneNotFound {
                zone: zone_id.to_string(),
                raw_message: None,
            })
    }

    async fn find_zone_by_name(&self, name: &str) -> Result<Option<Zone>> {
        let mut state = self.state.write().await;
        state.calls.push("find_zone_by_name".to_string());
        let name = normalize_domain_name(name);
        Ok(state.zones.iter().find(|z| z.name == name).cloned())
    }

    async fn list_dns_records(&self, zone_id: &str, name: Option<&str>) -> Result<Vec<DnsRecord>> {
        let state = self.enter("list_dns_records", zone_id).await?;
        Ok(state
            .records
            .get(zone_id)
            .into_iter()
            .flatten()
            .filter(|r| name.is_none_or(|n| r.name == n))
            .cloned()
            .collect())
    }

    async fn set_record_proxied(
        &self,
        zone_id: &str,
        record_id: &str,
        proxied: bool,
    ) -> Result<DnsRecord> {
        let mut state = self.enter("set_record_proxied", zone_id).await?;
        let applies = state.check_write(zone_id)?;
        let record = state
            .records
            .get_mut(zone_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
            .ok_or_else(|| GatewayError::RecordNotFound {
                record_id: record_id.to_string(),
                raw_message: None,
            })?;
        let mut reported = record.clone();
        reported.proxied = proxied;
        if applies {
            record.proxied = proxied;
        }
        Ok(reported)
    }

    async fn get_security_level(&self, zone_id: &str) -> Result<SecurityLevel> {
        let state = self.enter("get_security_level", zone_id).await?;
        Ok(state
            .levels
            .get(zone_id)
            .copied()
            .unwrap_or(SecurityLevel::Medium))
    }

    async fn set_security_level(
        &self,
        zone_id: &str,
        level: SecurityLevel,
    ) -> Result<SecurityLevel> {
        let mut state = self.enter("set_security_level", zone_id).await?;
        if state.check_write(zone_id)? {
            state.levels.insert(zone_id.to_string(), level);
        }
        Ok(level)
    }

    async fn get_bot_fight_mode(&self, zone_id: &str) -> Result<bool> {
        let state = self.enter("get_bot_fight_mode", zone_id).await?;
        Ok(state.bot_fight.get(zone_id).copied().unwrap_or(false))
    }

    async fn set_bot_fight_mode(&self, zone_id: &str, enabled: bool) -> Result<bool> {
        let mut state = self.enter("set_bot_fight_mode", zone_id).await?;
        if state.check_write(zone_id)? {
            state.bot_fight.insert(zone_id.to_string(), enabled);
        }
        Ok(enabled)
    }

    async fn get_custom_ruleset(&self, zone_id: &str) -> Result<Option<Ruleset>> {
        let state = self.enter("get_custom_ruleset", zone_id).await?;
        Ok(state.rulesets.get(zone_id).cloned())
    }

    async fn create_rule(
        &self,
        zone_id: &str,
        ruleset_id: Option<&str>,
        rule: &RuleRequest,
    ) -> Result<FirewallRule> {
        let mut state = self.enter("create_rule", zone_id).await?;
        let applies = state.check_write(zone_id)?;
        let mut created = remote_rule(&state.next_id("rule"), None);
        apply_request(&mut created, rule);
        if !applies {
            return Ok(created);
        }

        match ruleset_id {
            Some(id) => state.ruleset_mut(zone_id, id)?.rules.push(created.clone()),
            None => {
                if state.rulesets.contains_key(zone_id) {
                    return Err(GatewayError::InvalidParameter {
                        param: "ruleset_id".to_string(),
                        detail: "entrypoint ruleset already exists".to_string(),
                    });
                }
                state.rulesets.insert(
                    zone_id.to_string(),
                    Ruleset {
                        id: format!("rs-{zone_id}"),
                        name: "default".to_string(),
                        rules: vec![created.clone()],
                    },
                );
            }
        }
        Ok(created)
    }

    async fn update_rule(
        &self,
        zone_id: &str,
        ruleset_id: &str,
        rule_id: &str,
        rule: &RuleRequest,
    ) -> Result<FirewallRule> {
        let mut state = self.enter("update_rule", zone_id).await?;
        let applies = state.check_write(zone_id)?;
        let ruleset = state.ruleset_mut(zone_id, ruleset_id)?;
        let existing = ruleset
            .rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| GatewayError::RuleNotFound {
                rule_id: rule_id.to_string(),
                raw_message: None,
            })?;
        let mut updated = existing.clone();
        apply_request(&mut updated, rule);
        if applies {
            *existing = updated.clone();
        }
        Ok(updated)
    }

    async fn delete_rule(&self, zone_id: &str, ruleset_id: &str, rule_id: &str) -> Result<()> {
        let mut state = self.enter("delete_rule", zone_id).await?;
        let applies = state.check_write(zone_id)?;
        let ruleset = state.ruleset_mut(zone_id, ruleset_id)?;
        let Some(index) = ruleset.rules.iter().position(|r| r.id == rule_id) else {
            return Err(GatewayError::RuleNotFound {
                rule_id: rule_id.to_string(),
                raw_message: None,
            });
        };
        if applies {
            ruleset.rules.remove(index);
        }
        Ok(())
    }
}
