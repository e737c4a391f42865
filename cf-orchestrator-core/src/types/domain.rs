//! Domain name related type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cf_orchestrator_provider::{DnsRecord, Zone, ZoneStatus};

/// A proxied-capable DNS record held in the domain snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecordRef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    pub proxied: bool,
}

impl From<&DnsRecord> for DnsRecordRef {
    fn from(record: &DnsRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            record_type: record.record_type.clone(),
            content: record.content.clone(),
            proxied: record.proxied,
        }
    }
}

/// Apex and `www` records of a zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDnsRecords {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<DnsRecordRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub www: Option<DnsRecordRef>,
}

impl DomainDnsRecords {
    /// Records present in the snapshot, apex first.
    pub fn iter(&self) -> impl Iterator<Item = &DnsRecordRef> {
        self.root.iter().chain(self.www.iter())
    }
}

/// Summary of the custom firewall rules deployed on a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRulesSummary {
    pub total_rules: usize,
    /// Rules created from a known template
    pub corporate_rules: usize,
    pub custom_rules: usize,
    pub outdated_rules: usize,
    pub has_conflicts: bool,
    pub last_analyzed: DateTime<Utc>,
}

/// Cached view of one zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub zone_id: String,
    pub name: String,
    pub status: ZoneStatus,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub dns_records: DomainDnsRecords,
    #[serde(default)]
    pub under_attack_mode: bool,
    #[serde(default)]
    pub bot_fight_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_rules: Option<SecurityRulesSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<DateTime<Utc>>,
}

impl Domain {
    /// Bare domain from a zone, before any settings are fetched.
    #[must_use]
    pub fn from_zone(zone: Zone) -> Self {
        Self {
            zone_id: zone.id,
            name: zone.name,
            status: zone.status,
            paused: zone.paused,
            dns_records: DomainDnsRecords::default(),
            under_attack_mode: false,
            bot_fight_mode: false,
            security_rules: None,
            last_synced: None,
        }
    }

    /// Proxy state across the snapshot records: `Some(true)` only when every record is proxied.
    pub fn proxy_enabled(&self) -> Option<bool> {
        let mut records = self.dns_records.iter().peekable();
        records.peek()?;
        Some(records.all(|r| r.proxied))
    }
}
