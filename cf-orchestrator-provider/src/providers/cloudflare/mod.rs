//! Cloudflare gateway client

mod error;
mod gateway;
mod http;
mod types;

use reqwest::Client;

use crate::error::Result;
use crate::providers::common::create_http_client;
use crate::traits::empty_token_error;

pub(crate) use types::{
    CloudflareBotManagement, CloudflareDnsRecord, CloudflareResponse, CloudflareRuleBody,
    CloudflareRuleset, CloudflareSetting, CloudflareZone,
};

pub(crate) const CF_API_BASE: &str = "https://api.cloudflare.com/client/v4";
/// Zones API page size limit
pub(crate) const MAX_PAGE_SIZE_ZONES: u32 = 50;
/// DNS records API page size limit
pub(crate) const MAX_PAGE_SIZE_RECORDS: u32 = 100;
/// Phase of the zone-level custom firewall ruleset
pub(crate) const CUSTOM_RULES_PHASE: &str = "http_request_firewall_custom";
/// Retries for transient failures (429, 5xx, timeouts)
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Cloudflare API client
pub struct CloudflareGateway {
    pub(crate) client: Client,
    pub(crate) api_token: String,
    pub(crate) base_url: String,
    pub(crate) max_retries: u32,
}

impl CloudflareGateway {
    /// Create a client for the given API token.
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(empty_token_error());
        }
        Ok(Self {
            client: create_http_client()?,
            api_token,
            base_url: CF_API_BASE.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Point the client at another API root (staging, local mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the transient-failure retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}
