//! `ZoneGateway` implementation for Cloudflare

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use crate::error::Result;
use crate::traits::{ErrorContext, ErrorMapper, ZoneGateway};
use crate::types::{
    DnsRecord, FirewallRule, PaginatedResponse, PaginationParams, RuleRequest, Ruleset,
    SecurityLevel, Zone,
};

use super::{
    CUSTOM_RULES_PHASE, CloudflareBotManagement, CloudflareDnsRecord, CloudflareGateway,
    CloudflareRuleBody, CloudflareRuleset, CloudflareSetting, CloudflareZone,
    MAX_PAGE_SIZE_RECORDS, MAX_PAGE_SIZE_ZONES,
};

type Body = serde_json::Value;

impl CloudflareGateway {
    fn entrypoint_path(zone_id: &str) -> String {
        format!("/zones/{zone_id}/rulesets/phases/{CUSTOM_RULES_PHASE}/entrypoint")
    }

    /// Rule endpoints answer with the whole ruleset; pick out the rule we touched.
    fn pick_rule(
        &self,
        ruleset: CloudflareRuleset,
        rule_id: Option<&str>,
        rule_ref: Option<&str>,
    ) -> Result<FirewallRule> {
        let rules = ruleset.rules.unwrap_or_default();
        let found = rules
            .iter()
            .position(|r| rule_id.is_some_and(|id| r.id == id))
            .or_else(|| {
                rules
                    .iter()
                    .position(|r| rule_ref.is_some() && r.rule_ref.as_deref() == rule_ref)
            })
            .or_else(|| rules.len().checked_sub(1));

        let mut rules = rules;
        match found {
            Some(index) => Ok(FirewallRule::from(rules.swap_remove(index))),
            None => Err(self.parse_error("ruleset response contains no rules")),
        }
    }

    fn setting_to_level(&self, setting: &CloudflareSetting) -> Result<SecurityLevel> {
        setting
            .value
            .as_str()
            .and_then(SecurityLevel::parse)
            .ok_or_else(|| {
                self.parse_error(format!(
                    "unexpected security_level value: {}",
                    setting.value
                ))
            })
    }
}

#[async_trait]
impl ZoneGateway for CloudflareGateway {
    async fn verify_token(&self) -> Result<bool> {
        #[derive(Deserialize)]
        struct VerifyResponse {
            status: String,
        }

        let resp: VerifyResponse = self
            .request::<VerifyResponse, Body>(
                Method::GET,
                "/user/tokens/verify",
                None,
                ErrorContext::default(),
            )
            .await?;
        Ok(resp.status == "active")
    }

    async fn list_zones(&self, params: &PaginationParams) -> Result<PaginatedResponse<Zone>> {
        let params = params.validated(MAX_PAGE_SIZE_ZONES);
        let path = format!("/zones?page={}&per_page={}", params.page, params.page_size);
        let (zones, total_count) = self
            .get_list::<CloudflareZone>(&path, ErrorContext::default())
            .await?;
        Ok(PaginatedResponse::new(
            zones.into_iter().map(Zone::from).collect(),
            params.page,
            params.page_size,
            total_count,
        ))
    }

    async fn get_zone(&self, zone_id: &str) -> Result<Zone> {
        let zone: CloudflareZone = self
            .request::<CloudflareZone, Body>(
                Method::GET,
                &format!("/zones/{zone_id}"),
                None,
                ErrorContext::zone(zone_id),
            )
            .await?;
        Ok(zone.into())
    }

    async fn find_zone_by_name(&self, name: &str) -> Result<Option<Zone>> {
        let path = format!("/zones?name={}", urlencoding::encode(name));
        let (zones, _) = self
            .get_list::<CloudflareZone>(&path, ErrorContext::zone(name))
            .await?;
        Ok(zones
            .into_iter()
            .find(|z| z.name.eq_ignore_ascii_case(name))
            .map(Zone::from))
    }

    async fn list_dns_records(&self, zone_id: &str, name: Option<&str>) -> Result<Vec<DnsRecord>> {
        let mut records = Vec::new();
        let mut page = 1_u32;
        loop {
            let mut path = format!(
                "/zones/{zone_id}/dns_records?page={page}&per_page={MAX_PAGE_SIZE_RECORDS}"
            );
            if let Some(name) = name {
                path.push_str(&format!("&name={}", urlencoding::encode(name)));
            }
            let (batch, total_count) = self
                .get_list::<CloudflareDnsRecord>(&path, ErrorContext::zone(zone_id))
                .await?;
            let fetched = batch.len();
            records.extend(batch.into_iter().map(|r| r.into_record(zone_id)));

            if fetched == 0 || page.saturating_mul(MAX_PAGE_SIZE_RECORDS) >= total_count {
                break;
            }
            page += 1;
        }
        Ok(records)
    }

    async fn set_record_proxied(
        &self,
        zone_id: &str,
        record_id: &str,
        proxied: bool,
    ) -> Result<DnsRecord> {
        let record: CloudflareDnsRecord = self
            .request(
                Method::PATCH,
                &format!("/zones/{zone_id}/dns_records/{record_id}"),
                Some(&json!({ "proxied": proxied })),
                ErrorContext::record(zone_id, record_id),
            )
            .await?;
        Ok(record.into_record(zone_id))
    }

    async fn get_security_level(&self, zone_id: &str) -> Result<SecurityLevel> {
        let setting: CloudflareSetting = self
            .request::<CloudflareSetting, Body>(
                Method::GET,
                &format!("/zones/{zone_id}/settings/security_level"),
                None,
                ErrorContext::zone(zone_id),
            )
            .await?;
        self.setting_to_level(&setting)
    }

    async fn set_security_level(
        &self,
        zone_id: &str,
        level: SecurityLevel,
    ) -> Result<SecurityLevel> {
        let setting: CloudflareSetting = self
            .request(
                Method::PATCH,
                &format!("/zones/{zone_id}/settings/security_level"),
                Some(&json!({ "value": level.as_str() })),
                ErrorContext::zone(zone_id),
            )
            .await?;
        self.setting_to_level(&setting)
    }

    async fn get_bot_fight_mode(&self, zone_id: &str) -> Result<bool> {
        let config: CloudflareBotManagement = self
            .request::<CloudflareBotManagement, Body>(
                Method::GET,
                &format!("/zones/{zone_id}/bot_management"),
                None,
                ErrorContext::zone(zone_id),
            )
            .await?;
        Ok(config.fight_mode.unwrap_or(false))
    }

    async fn set_bot_fight_mode(&self, zone_id: &str, enabled: bool) -> Result<bool> {
        let config: CloudflareBotManagement = self
            .request(
                Method::PUT,
                &format!("/zones/{zone_id}/bot_management"),
                Some(&json!({ "fight_mode": enabled })),
                ErrorContext::zone(zone_id),
            )
            .await?;
        Ok(config.fight_mode.unwrap_or(enabled))
    }

    async fn get_custom_ruleset(&self, zone_id: &str) -> Result<Option<Ruleset>> {
        let ruleset = self
            .get_optional::<CloudflareRuleset>(
                &Self::entrypoint_path(zone_id),
                ErrorContext::zone(zone_id),
            )
            .await?;
        Ok(ruleset.map(Ruleset::from))
    }

    async fn create_rule(
        &self,
        zone_id: &str,
        ruleset_id: Option<&str>,
        rule: &RuleRequest,
    ) -> Result<FirewallRule> {
        let body = CloudflareRuleBody::from(rule);
        let ruleset: CloudflareRuleset = match ruleset_id {
            Some(ruleset_id) => {
                self.request(
                    Method::POST,
                    &format!("/zones/{zone_id}/rulesets/{ruleset_id}/rules"),
                    Some(&body),
                    ErrorContext::zone(zone_id),
                )
                .await?
            }
            None => {
                log::info!("[cloudflare] Creating custom ruleset entrypoint for zone {zone_id}");
                self.request(
                    Method::PUT,
                    &Self::entrypoint_path(zone_id),
                    Some(&json!({ "rules": [body] })),
                    ErrorContext::zone(zone_id),
                )
                .await?
            }
        };
        self.pick_rule(ruleset, None, rule.rule_ref.as_deref())
    }

    async fn update_rule(
        &self,
        zone_id: &str,
        ruleset_id: &str,
        rule_id: &str,
        rule: &RuleRequest,
    ) -> Result<FirewallRule> {
        let ruleset: CloudflareRuleset = self
            .request(
                Method::PATCH,
                &format!("/zones/{zone_id}/rulesets/{ruleset_id}/rules/{rule_id}"),
                Some(&CloudflareRuleBody::from(rule)),
                ErrorContext::rule(zone_id, rule_id),
            )
            .await?;
        self.pick_rule(ruleset, Some(rule_id), rule.rule_ref.as_deref())
    }

    async fn delete_rule(&self, zone_id: &str, ruleset_id: &str, rule_id: &str) -> Result<()> {
        self.delete_path(
            &format!("/zones/{zone_id}/rulesets/{ruleset_id}/rules/{rule_id}"),
            ErrorContext::rule(zone_id, rule_id),
        )
        .await
    }
}
