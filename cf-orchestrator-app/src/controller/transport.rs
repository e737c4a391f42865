//! How the controller reaches the server

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::StatusCode;

use cf_orchestrator_core::error::{CoreError, CoreResult, GatewayError};
use cf_orchestrator_core::transport::SseFrameDecoder;
use cf_orchestrator_core::types::{ApiErrorResponse, BulkOperationPayload, ProgressEvent};

/// Decoded progress events of one run
pub type EventStream = BoxStream<'static, CoreResult<ProgressEvent>>;

/// Opens a bulk run and yields its events.
///
/// Dropping the returned stream must close the underlying connection.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    async fn open(&self, payload: &BulkOperationPayload) -> CoreResult<EventStream>;
}

const BULK_OPERATIONS_PATH: &str = "/api/bulk-operations";

/// [`BulkTransport`] over the server's SSE endpoint
pub struct HttpBulkTransport {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpBulkTransport {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, api_token)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        }
    }
}

#[async_trait]
impl BulkTransport for HttpBulkTransport {
    async fn open(&self, payload: &BulkOperationPayload) -> CoreResult<EventStream> {
        let url = format!("{}{BULK_OPERATIONS_PATH}", self.base_url);
        log::debug!("[controller] POST {url}");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(payload)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(rejection(status, &body));
        }

        Ok(decode_events(Box::pin(response.bytes_stream())))
    }
}

/// Turn a byte stream into events; a body error ends the stream after reporting it.
pub fn decode_events<S, B>(body: S) -> EventStream
where
    S: Stream<Item = reqwest::Result<B>> + Unpin + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    struct Decoding<S> {
        body: S,
        decoder: SseFrameDecoder,
        ready: VecDeque<CoreResult<ProgressEvent>>,
        finished: bool,
    }

    let state = Decoding {
        body,
        decoder: SseFrameDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => state.ready.extend(state.decoder.push(chunk.as_ref())),
                Some(Err(e)) => {
                    state.finished = true;
                    state.ready.push_back(Err(network_error(e)));
                }
                None => {
                    state.finished = true;
                    state.ready.extend(state.decoder.finish());
                }
            }
        }
    })
    .boxed()
}

fn network_error(e: reqwest::Error) -> CoreError {
    let detail = e.to_string();
    if e.is_timeout() {
        CoreError::Gateway(GatewayError::Timeout { detail })
    } else {
        CoreError::Gateway(GatewayError::NetworkError { detail })
    }
}

/// Map a non-2xx answer of the trigger endpoint.
fn rejection(status: StatusCode, body: &str) -> CoreError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|r| r.error.message)
        .unwrap_or_else(|_| format!("HTTP {status}"));
    match status {
        StatusCode::BAD_REQUEST => CoreError::ValidationError(message),
        StatusCode::UNAUTHORIZED => CoreError::Gateway(GatewayError::InvalidCredentials {
            raw_message: Some(message),
        }),
        _ => CoreError::Gateway(GatewayError::Unknown {
            raw_code: Some(status.as_u16().to_string()),
            raw_message: message,
        }),
    }
}
