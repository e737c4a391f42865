//! Shared helpers for the remote client

use std::time::Duration;

use reqwest::Client;

use crate::error::{GatewayError, Result};

// ============ HTTP Client ============

/// Connect timeout (seconds)
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Whole-request timeout (seconds)
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Build an HTTP client with the default timeouts.
pub fn create_http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| GatewayError::NetworkError {
            detail: format!("Failed to create HTTP client: {e}"),
        })
}

// ============ Domain names ============

/// Strip the trailing dot and lowercase a domain name.
pub fn normalize_domain_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// `www.<zone>` for a zone apex.
pub fn www_name(zone_name: &str) -> String {
    format!("www.{}", normalize_domain_name(zone_name))
}

/// Whether `candidate` looks like a canonical Cloudflare zone id (32 lowercase hex chars).
pub fn is_zone_id(candidate: &str) -> bool {
    candidate.len() == 32
        && candidate
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
