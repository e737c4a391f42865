//! Cloudflare HTTP request methods

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{GatewayError, Result};
use crate::http_client::HttpUtils;
use crate::traits::{ErrorContext, ErrorMapper, RawApiError};
use crate::utils::log_sanitizer::truncate_for_log;

use super::{CloudflareGateway, CloudflareResponse};

impl CloudflareGateway {
    /// Send a request and decode the envelope, without judging `success`.
    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(u16, CloudflareResponse<T>)> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.api_token);

        if let Some(body) = body {
            let body_json = serde_json::to_string(body).map_err(|e| {
                GatewayError::SerializationError {
                    detail: e.to_string(),
                }
            })?;
            log::debug!("[cloudflare] Request Body: {}", truncate_for_log(&body_json));
            request = request
                .header("Content-Type", "application/json")
                .body(body_json);
        }

        let (status, text) =
            HttpUtils::execute_request_with_retry(request, method.as_str(), &url, self.max_retries)
                .await?;
        let envelope = HttpUtils::parse_json::<CloudflareResponse<T>>(&text)?;
        Ok((status, envelope))
    }

    /// Turn a failed envelope into a mapped error.
    fn envelope_error<T>(
        &self,
        status: u16,
        envelope: &CloudflareResponse<T>,
        context: ErrorContext,
    ) -> GatewayError {
        let (code, message) = envelope.first_error();
        let raw = if code.is_empty() {
            RawApiError::new(message)
        } else {
            RawApiError::with_code(code, message)
        };
        let err = self.map_error_with_status(raw, status, context);
        if err.is_expected() {
            log::warn!("[cloudflare] API error: {err}");
        } else {
            log::error!("[cloudflare] API error: {err}");
        }
        err
    }

    /// Request expecting a `result` payload.
    pub(crate) async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        context: ErrorContext,
    ) -> Result<T> {
        let (status, envelope) = self.send::<T, B>(method, path, body).await?;
        if !envelope.success {
            return Err(self.envelope_error(status, &envelope, context));
        }
        envelope
            .result
            .ok_or_else(|| self.parse_error("response is missing the result field"))
    }

    /// GET that treats HTTP 404 as `None` (e.g. a phase entrypoint that was never created).
    pub(crate) async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        context: ErrorContext,
    ) -> Result<Option<T>> {
        let (status, envelope) = self
            .send::<T, serde_json::Value>(Method::GET, path, None)
            .await?;
        if status == 404 {
            log::debug!("[cloudflare] {path} not found, treating as empty");
            return Ok(None);
        }
        if !envelope.success {
            return Err(self.envelope_error(status, &envelope, context));
        }
        Ok(envelope.result)
    }

    /// GET returning a list plus the total count from `result_info`.
    pub(crate) async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        context: ErrorContext,
    ) -> Result<(Vec<T>, u32)> {
        let (status, envelope) = self
            .send::<Vec<T>, serde_json::Value>(Method::GET, path, None)
            .await?;
        if !envelope.success {
            return Err(self.envelope_error(status, &envelope, context));
        }
        let total_count = envelope
            .result_info
            .as_ref()
            .and_then(|info| info.total_count)
            .unwrap_or(0);
        Ok((envelope.result.unwrap_or_default(), total_count))
    }

    /// DELETE, ignoring the result payload.
    pub(crate) async fn delete_path(&self, path: &str, context: ErrorContext) -> Result<()> {
        let (status, envelope) = self
            .send::<serde_json::Value, serde_json::Value>(Method::DELETE, path, None)
            .await?;
        if !envelope.success {
            return Err(self.envelope_error(status, &envelope, context));
        }
        Ok(())
    }
}
