//! Typed access to the cached documents
//!
//! Three documents live in the [`KeyValueStore`]: `domains`, `domain-rules`
//! and `rule-templates`. Reads never fail: a missing or unreadable document
//! yields an empty default. Writes overwrite the whole document.
//!
//! Read-modify-write of a document is serialized per document within one
//! repository (and its clones); the bulk orchestrator updates the `domains`
//! document from several domains of a batch at once.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::CoreResult;
use crate::traits::KeyValueStore;
use crate::types::{Domain, DomainRuleStatus, RuleTemplate};

pub const DOMAINS_KEY: &str = "domains";
pub const DOMAIN_RULES_KEY: &str = "domain-rules";
pub const RULE_TEMPLATES_KEY: &str = "rule-templates";

/// `domains` document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCache {
    #[serde(default)]
    pub domains: Vec<Domain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl DomainCache {
    pub fn find(&self, zone_id: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.zone_id == zone_id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Domain> {
        self.domains
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Replace the domain with the same zone id, or append it.
    pub fn upsert(&mut self, domain: Domain) {
        match self.domains.iter_mut().find(|d| d.zone_id == domain.zone_id) {
            Some(existing) => *existing = domain,
            None => self.domains.push(domain),
        }
        self.last_updated = Some(Utc::now());
    }
}

/// `domain-rules` document, keyed by zone id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleStatusCache {
    #[serde(default)]
    pub entries: HashMap<String, DomainRuleStatus>,
}

/// `rule-templates` document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCache {
    #[serde(default)]
    pub templates: Vec<RuleTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Writer locks, one per document
#[derive(Default)]
struct DocumentLocks {
    domains: Mutex<()>,
    domain_rules: Mutex<()>,
    templates: Mutex<()>,
}

/// Typed repository over a [`KeyValueStore`]
#[derive(Clone)]
pub struct CacheRepository {
    store: Arc<dyn KeyValueStore>,
    locks: Arc<DocumentLocks>,
}

impl CacheRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            locks: Arc::new(DocumentLocks::default()),
        }
    }

    /// Hold while loading, modifying and saving the `domains` document.
    ///
    /// `upsert_domain` and `update_domain` take it themselves; do not call
    /// them while holding the guard.
    pub async fn lock_domains(&self) -> MutexGuard<'_, ()> {
        self.locks.domains.lock().await
    }

    /// Hold while loading, modifying and saving the `rule-templates` document.
    pub async fn lock_templates(&self) -> MutexGuard<'_, ()> {
        self.locks.templates.lock().await
    }

    async fn load_document<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.store.load(key).await {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                log::warn!("[cache] Document {key} is corrupt, using empty default: {e}");
                T::default()
            }),
            Ok(None) => T::default(),
            Err(e) => {
                log::warn!("[cache] Failed to read {key}, using empty default: {e}");
                T::default()
            }
        }
    }

    async fn save_document<T: Serialize>(&self, key: &str, document: &T) -> CoreResult<()> {
        let value = serde_json::to_value(document)?;
        self.store.save(key, &value).await
    }

    // ===== domains =====

    pub async fn load_domains(&self) -> DomainCache {
        self.load_document(DOMAINS_KEY).await
    }

    pub async fn save_domains(&self, cache: &DomainCache) -> CoreResult<()> {
        self.save_document(DOMAINS_KEY, cache).await
    }

    pub async fn find_domain(&self, zone_id: &str) -> Option<Domain> {
        self.load_domains().await.find(zone_id).cloned()
    }

    /// Read-modify-write of a single domain.
    pub async fn upsert_domain(&self, domain: Domain) -> CoreResult<()> {
        let _guard = self.lock_domains().await;
        let mut cache = self.load_domains().await;
        cache.upsert(domain);
        self.save_domains(&cache).await
    }

    /// Apply `update` to a cached domain in place. Returns `false` when it is not cached.
    pub async fn update_domain<F>(&self, zone_id: &str, update: F) -> CoreResult<bool>
    where
        F: FnOnce(&mut Domain) + Send,
    {
        let _guard = self.lock_domains().await;
        let mut cache = self.load_domains().await;
        let Some(domain) = cache.domains.iter_mut().find(|d| d.zone_id == zone_id) else {
            return Ok(false);
        };
        update(domain);
        cache.last_updated = Some(Utc::now());
        self.save_domains(&cache).await?;
        Ok(true)
    }

    // ===== domain-rules =====

    pub async fn load_rule_statuses(&self) -> RuleStatusCache {
        self.load_document(DOMAIN_RULES_KEY).await
    }

    pub async fn find_rule_status(&self, zone_id: &str) -> Option<DomainRuleStatus> {
        self.load_rule_statuses().await.entries.remove(zone_id)
    }

    pub async fn save_rule_status(&self, status: DomainRuleStatus) -> CoreResult<()> {
        let _guard = self.locks.domain_rules.lock().await;
        let mut cache = self.load_rule_statuses().await;
        cache.entries.insert(status.zone_id.clone(), status);
        self.save_document(DOMAIN_RULES_KEY, &cache).await
    }

    // ===== rule-templates =====

    pub async fn load_templates(&self) -> TemplateCache {
        self.load_document(RULE_TEMPLATES_KEY).await
    }

    pub async fn save_templates(&self, cache: &TemplateCache) -> CoreResult<()> {
        self.save_document(RULE_TEMPLATES_KEY, cache).await
    }
}
