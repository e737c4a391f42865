//! # cf-orchestrator-provider
//!
//! Typed gateway over the Cloudflare v4 API, covering exactly what the
//! orchestrator needs:
//!
//! | Area | Operations |
//! |------|------------|
//! | Zones | paginated listing, lookup by id or name |
//! | DNS | list records, toggle the proxy flag |
//! | Zone settings | `security_level` (under attack mode), bot fight mode |
//! | Custom firewall rules | read the entrypoint ruleset, create/update/delete rules |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cf_orchestrator_provider::{create_gateway, SecurityLevel, ZoneGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = create_gateway("your-token")?;
//!
//!     for zone in gateway.list_all_zones().await? {
//!         let level = gateway.get_security_level(&zone.id).await?;
//!         println!("{} -> {level}", zone.name);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`Result<T, GatewayError>`](GatewayError). Transient
//! failures (`NetworkError`, `Timeout`, `RateLimited`) are retried with
//! exponential backoff inside the client, honoring `Retry-After` on HTTP 429.

mod error;
mod http_client;
mod providers;
mod traits;
mod types;
mod utils;

use std::sync::Arc;

pub use error::{GatewayError, Result};
pub use providers::CloudflareGateway;
pub use providers::common::{is_zone_id, normalize_domain_name, www_name};
pub use traits::ZoneGateway;
pub use types::{
    DnsRecord, FirewallRule, PaginatedResponse, PaginationParams, RuleRequest, Ruleset,
    SecurityLevel, Zone, ZoneStatus,
};
pub use utils::log_sanitizer;

/// Build a shareable gateway for an API token.
///
/// The token is passed through as-is; an empty token is rejected before any
/// request is made.
pub fn create_gateway(api_token: &str) -> Result<Arc<dyn ZoneGateway>> {
    log::debug!(
        "[cloudflare] Creating gateway for token {}",
        log_sanitizer::mask_token(api_token)
    );
    Ok(Arc::new(CloudflareGateway::new(api_token)?))
}
