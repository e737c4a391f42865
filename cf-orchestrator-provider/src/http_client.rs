//! Shared HTTP execution with rate-limit aware retries.
//!
//! The Cloudflare client builds each `RequestBuilder` itself; this module sends
//! it, classifies transport-level failures and retries the transient ones.

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use crate::error::GatewayError;
use crate::utils::log_sanitizer::truncate_for_log;

/// Upper bound for a server-provided `Retry-After`.
const MAX_RETRY_AFTER_SECS: u64 = 30;
/// Upper bound for exponential backoff.
const MAX_BACKOFF_MS: u64 = 10_000;

/// HTTP helper functions
pub struct HttpUtils;

impl HttpUtils {
    /// Send a request and return `(status, body)`.
    ///
    /// 429 becomes [`GatewayError::RateLimited`] and 502-504 become
    /// [`GatewayError::NetworkError`]; every other status is handed back to the
    /// caller, which owns envelope parsing.
    pub async fn execute_request(
        request_builder: RequestBuilder,
        method: &str,
        url: &str,
    ) -> Result<(u16, String), GatewayError> {
        log::debug!("[cloudflare] {method} {url}");

        let response = request_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout {
                    detail: e.to_string(),
                }
            } else {
                GatewayError::NetworkError {
                    detail: e.to_string(),
                }
            }
        })?;

        let status_code = response.status().as_u16();
        log::debug!("[cloudflare] Response Status: {status_code}");

        // Read before the body consumes the response
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if status_code == 429 {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[cloudflare] Rate limited (HTTP 429), retry_after={retry_after:?}");
            return Err(GatewayError::RateLimited {
                retry_after,
                raw_message: Some(body),
            });
        }

        if matches!(status_code, 502..=504) {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[cloudflare] Upstream error (HTTP {status_code})");
            return Err(GatewayError::NetworkError {
                detail: format!("HTTP {status_code}: {}", truncate_for_log(&body)),
            });
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| GatewayError::NetworkError {
                detail: format!("Failed to read response body: {e}"),
            })?;

        log::debug!(
            "[cloudflare] Response Body: {}",
            truncate_for_log(&response_text)
        );

        Ok((status_code, response_text))
    }

    /// Parse a JSON body into `T`, logging the (truncated) raw text on failure.
    pub fn parse_json<T>(response_text: &str) -> Result<T, GatewayError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(response_text).map_err(|e| {
            log::error!("[cloudflare] JSON parse failed: {e}");
            log::error!(
                "[cloudflare] Raw response: {}",
                truncate_for_log(response_text)
            );
            GatewayError::ParseError {
                detail: e.to_string(),
            }
        })
    }

    /// [`execute_request`](Self::execute_request) with up to `max_retries` retries.
    ///
    /// Only [`GatewayError::is_retryable`] errors are retried. A `Retry-After`
    /// hint wins over backoff; otherwise 100ms, 200ms, 400ms, ... capped at 10s.
    pub async fn execute_request_with_retry(
        request_builder: RequestBuilder,
        method: &str,
        url: &str,
        max_retries: u32,
    ) -> Result<(u16, String), GatewayError> {
        if max_retries == 0 {
            return Self::execute_request(request_builder, method, url).await;
        }

        let mut last_error = None;

        for attempt in 0..=max_retries {
            // RequestBuilder is single-use
            let Some(req) = request_builder.try_clone() else {
                log::warn!("[cloudflare] Cannot clone request, disabling retry");
                return Self::execute_request(request_builder, method, url).await;
            };

            match Self::execute_request(req, method, url).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < max_retries && e.is_retryable() => {
                    let delay = retry_delay(&e, attempt);
                    log::warn!(
                        "[cloudflare] {method} {url} failed (attempt {}/{}), retry in {:.1}s: {e}",
                        attempt + 1,
                        max_retries,
                        delay.as_secs_f32(),
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::NetworkError {
            detail: "All retries exhausted with no error captured".to_string(),
        }))
    }
}

/// Delay before the next attempt.
fn retry_delay(error: &GatewayError, attempt: u32) -> Duration {
    if let GatewayError::RateLimited {
        retry_after: Some(secs),
        ..
    } = error
    {
        Duration::from_secs((*secs).min(MAX_RETRY_AFTER_SECS))
    } else {
        backoff_delay(attempt)
    }
}

/// 100ms * 2^attempt, capped.
fn backoff_delay(attempt: u32) -> Duration {
    let capped_attempt = attempt.min(20);
    let delay_ms = 100_u64.saturating_mul(1_u64 << capped_attempt);
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}
