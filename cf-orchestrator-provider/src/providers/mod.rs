//! Remote API implementations

/// Shared helpers used by the Cloudflare client.
pub mod common;

mod cloudflare;

pub use cloudflare::CloudflareGateway;
