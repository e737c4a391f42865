//! Shared helpers for live API tests

#![allow(dead_code)]

use std::sync::Arc;

use cf_orchestrator_provider::{ZoneGateway, create_gateway};

/// Skip the test when a required env var is missing.
#[macro_export]
macro_rules! skip_if_no_credentials {
    ($($var:expr),+) => {
        $(
            if std::env::var($var).is_err() {
                eprintln!("skipping: env var {} is not set", $var);
                return;
            }
        )+
    };
}

/// Assert `Ok` and unwrap, failing the test otherwise.
#[macro_export]
macro_rules! require_ok {
    ($expr:expr $(,)?) => {{
        let res = $expr;
        assert!(res.is_ok(), "expected Ok(..), got {res:?}");
        let Ok(val) = res else {
            return;
        };
        val
    }};
}

/// Gateway built from `CLOUDFLARE_API_TOKEN`.
pub fn gateway() -> Option<Arc<dyn ZoneGateway>> {
    let token = std::env::var("CLOUDFLARE_API_TOKEN").ok()?;
    create_gateway(&token).ok()
}

/// Zone id to test against, from `CLOUDFLARE_TEST_ZONE_ID`.
pub fn test_zone_id() -> Option<String> {
    std::env::var("CLOUDFLARE_TEST_ZONE_ID").ok()
}
