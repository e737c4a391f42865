//! Domain management service

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};

use cf_orchestrator_provider::{normalize_domain_name, www_name, GatewayError, ZoneGateway};

use crate::error::{CoreError, CoreResult};
use crate::services::ServiceContext;
use crate::types::{DnsRecordRef, Domain, DomainDnsRecords, SecurityLevel, Zone};

/// Zones snapshotted concurrently during a full refresh
const REFRESH_CONCURRENCY: usize = 5;

/// Domain management service
pub struct DomainService {
    ctx: Arc<ServiceContext>,
}

impl DomainService {
    /// Create domain service instance
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Domains as last cached
    pub async fn list_cached(&self) -> Vec<Domain> {
        self.ctx.cache.load_domains().await.domains
    }

    /// Re-fetch every zone of the account and replace the domain cache.
    ///
    /// Rule summaries from the previous cache are carried over.
    pub async fn refresh_all(&self, gateway: &dyn ZoneGateway) -> CoreResult<Vec<Domain>> {
        let zones = gateway.list_all_zones().await?;
        log::info!("[domains] Refreshing {} zones", zones.len());

        let mut domains: Vec<Domain> = stream::iter(zones)
            .map(|zone| self.snapshot(gateway, zone))
            .buffered(REFRESH_CONCURRENCY)
            .try_collect()
            .await?;

        let _guard = self.ctx.cache.lock_domains().await;
        let mut cache = self.ctx.cache.load_domains().await;
        for domain in &mut domains {
            if let Some(previous) = cache.find(&domain.zone_id) {
                domain.security_rules = previous.security_rules.clone();
            }
        }
        cache.domains.clone_from(&domains);
        cache.last_updated = Some(Utc::now());
        self.ctx.cache.save_domains(&cache).await?;
        Ok(domains)
    }

    /// Re-fetch a single zone and overwrite its cache entry.
    pub async fn refresh_domain(
        &self,
        gateway: &dyn ZoneGateway,
        zone_id: &str,
    ) -> CoreResult<Domain> {
        let zone = gateway.get_zone(zone_id).await?;
        let mut domain = self.snapshot(gateway, zone).await?;
        if let Some(previous) = self.ctx.cache.find_domain(zone_id).await {
            domain.security_rules = previous.security_rules;
        }
        self.ctx.cache.upsert_domain(domain.clone()).await?;
        Ok(domain)
    }

    /// Zone plus apex/`www` records, security level and Bot Fight mode.
    pub async fn snapshot(&self, gateway: &dyn ZoneGateway, zone: Zone) -> CoreResult<Domain> {
        let records = proxy_records(gateway, &zone.id, &zone.name).await?;
        let level = gateway.get_security_level(&zone.id).await?;
        let bot_fight = match gateway.get_bot_fight_mode(&zone.id).await {
            Ok(enabled) => enabled,
            // Not every plan exposes bot management
            Err(e @ GatewayError::PermissionDenied { .. }) => {
                log::debug!("[domains] Bot management unavailable for {}: {e}", zone.name);
                false
            }
            Err(e) => return Err(e.into()),
        };

        let mut domain = Domain::from_zone(zone);
        domain.dns_records = records;
        domain.under_attack_mode = level.is_under_attack();
        domain.bot_fight_mode = bot_fight;
        domain.last_synced = Some(Utc::now());
        Ok(domain)
    }

    /// Toggle the proxy flag on the apex and `www` records.
    ///
    /// Returns the records that were touched, as reported back by the API.
    pub async fn set_proxy(
        &self,
        gateway: &dyn ZoneGateway,
        zone_id: &str,
        enabled: bool,
    ) -> CoreResult<Vec<DnsRecordRef>> {
        let zone = gateway.get_zone(zone_id).await?;
        let records = proxy_records(gateway, zone_id, &zone.name).await?;
        if records.root.is_none() && records.www.is_none() {
            return Err(CoreError::ValidationError(format!(
                "No A/AAAA/CNAME records found for {} or www.{}",
                zone.name, zone.name
            )));
        }

        let mut touched = Vec::new();
        let mut updated = DomainDnsRecords::default();
        for (slot, record) in [
            (&mut updated.root, records.root),
            (&mut updated.www, records.www),
        ] {
            let Some(record) = record else { continue };
            let result = gateway
                .set_record_proxied(zone_id, &record.id, enabled)
                .await?;
            let record = DnsRecordRef::from(&result);
            touched.push(record.clone());
            *slot = Some(record);
        }

        self.update_cached(zone_id, |d| d.dns_records = updated).await;
        log::info!(
            "[domains] Proxy {} on {} record(s) of {}",
            if enabled { "enabled" } else { "disabled" },
            touched.len(),
            zone.name
        );
        Ok(touched)
    }

    /// Switch Under Attack mode. Disabling restores the configured fallback level.
    pub async fn set_under_attack(
        &self,
        gateway: &dyn ZoneGateway,
        zone_id: &str,
        enabled: bool,
    ) -> CoreResult<SecurityLevel> {
        let target = if enabled {
            SecurityLevel::UnderAttack
        } else {
            self.ctx.bulk_config.under_attack_fallback
        };
        let level = gateway.set_security_level(zone_id, target).await?;
        self.update_cached(zone_id, |d| d.under_attack_mode = level.is_under_attack()).await;
        Ok(level)
    }

    pub async fn set_bot_fight(
        &self,
        gateway: &dyn ZoneGateway,
        zone_id: &str,
        enabled: bool,
    ) -> CoreResult<bool> {
        let enabled = gateway.set_bot_fight_mode(zone_id, enabled).await?;
        self.update_cached(zone_id, |d| d.bot_fight_mode = enabled).await;
        Ok(enabled)
    }

    /// Mirror a remote change into the cached domain.
    ///
    /// The remote change has already happened, so a failed write is only logged.
    async fn update_cached<F>(&self, zone_id: &str, update: F)
    where
        F: FnOnce(&mut Domain) + Send,
    {
        if let Err(e) = self.ctx.cache.update_domain(zone_id, update).await {
            log::warn!("[domains] Failed to update cached domain {zone_id}: {e}");
        }
    }

    /// Domain name for a zone id, from the cache.
    pub async fn cached_name(&self, zone_id: &str) -> Option<String> {
        self.ctx
            .cache
            .find_domain(zone_id)
            .await
            .map(|d| d.name)
    }

    /// Zone id for a domain name: cache first, then the remote lookup.
    pub async fn resolve_zone_id(
        &self,
        gateway: &dyn ZoneGateway,
        name: &str,
    ) -> CoreResult<Option<Zone>> {
        let name = normalize_domain_name(name);
        if let Some(domain) = self.ctx.cache.load_domains().await.find_by_name(&name) {
            return Ok(Some(Zone {
                id: domain.zone_id.clone(),
                name: domain.name.clone(),
                status: domain.status,
                paused: domain.paused,
            }));
        }
        Ok(gateway.find_zone_by_name(&name).await?)
    }
}

/// First proxy-capable record for the apex and for `www`.
async fn proxy_records(
    gateway: &dyn ZoneGateway,
    zone_id: &str,
    zone_name: &str,
) -> CoreResult<DomainDnsRecords> {
    let apex = normalize_domain_name(zone_name);
    let www = www_name(zone_name);
    let (root_records, www_records) = futures::try_join!(
        gateway.list_dns_records(zone_id, Some(&apex)),
        gateway.list_dns_records(zone_id, Some(&www)),
    )?;

    let pick = |records: &[cf_orchestrator_provider::DnsRecord], name: &str| {
        records
            .iter()
            .find(|r| r.is_proxy_candidate() && normalize_domain_name(&r.name) == name)
            .map(DnsRecordRef::from)
    };
    Ok(DomainDnsRecords {
        root: pick(&root_records, &apex),
        www: pick(&www_records, &www),
    })
}
