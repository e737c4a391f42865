//! Server-sent events framing for progress streams
//!
//! Each event travels as a single `data: <json>\n\n` frame.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::{CoreError, CoreResult};
use crate::types::ProgressEvent;

/// `Content-Type` of a progress stream
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

const DATA_PREFIX: &str = "data:";

/// Encode one event as an SSE frame.
pub fn encode_frame(event: &ProgressEvent) -> CoreResult<String> {
    let json = serde_json::to_string(event)?;
    Ok(format!("{DATA_PREFIX} {json}\n\n"))
}

/// Receiving half of a bulk run.
///
/// Yields events in order and ends after the terminal event. Dropping the
/// stream before that cancels the run.
pub struct ProgressStream {
    rx: mpsc::Receiver<ProgressEvent>,
    _cancel_on_drop: DropGuard,
}

impl ProgressStream {
    pub fn new(rx: mpsc::Receiver<ProgressEvent>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            _cancel_on_drop: cancel.drop_guard(),
        }
    }
}

impl Stream for ProgressStream {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Reassembles SSE frames from arbitrary byte chunks.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    buffer: Vec<u8>,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<CoreResult<ProgressEvent>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((end, separator_len)) = find_frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + separator_len).collect();
            if let Some(event) = parse_frame(&frame[..end]) {
                events.push(event);
            }
        }
        events
    }

    /// Parse whatever is left once the connection closes.
    pub fn finish(&mut self) -> Option<CoreResult<ProgressEvent>> {
        let rest = std::mem::take(&mut self.buffer);
        parse_frame(&rest)
    }
}

/// Position of the first blank line and its length (`\n\n` or `\r\n\r\n`).
fn find_frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Join the `data:` lines of a frame; comments and other fields are ignored.
fn parse_frame(frame: &[u8]) -> Option<CoreResult<ProgressEvent>> {
    let text = match std::str::from_utf8(frame) {
        Ok(text) => text,
        Err(e) => {
            return Some(Err(CoreError::SerializationError(format!(
                "Invalid UTF-8 in event stream: {e}"
            ))))
        }
    };

    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();
    if data.is_empty() {
        return None;
    }
    Some(serde_json::from_str(&data.join("\n")).map_err(CoreError::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BulkSummary, Phase, PhaseInfo};
    use futures::StreamExt;

    fn complete() -> ProgressEvent {
        ProgressEvent::Complete {
            progress: 100,
            summary: BulkSummary {
                total: 1,
                successful: 1,
                failed: 0,
            },
        }
    }

    #[test]
    fn frame_format() {
        let frame = encode_frame(&ProgressEvent::cancelled(0)).unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        assert_eq!(frame.matches('\n').count(), 2);
    }

    #[test]
    fn decoder_handles_split_chunks() {
        let first = ProgressEvent::PhaseUpdate {
            progress: 0,
            phase: PhaseInfo::new(Phase::ApiCalls, "Applying", 0),
        };
        let mut bytes = encode_frame(&first).unwrap().into_bytes();
        bytes.extend(encode_frame(&complete()).unwrap().into_bytes());

        let mut decoder = SseFrameDecoder::new();
        let mut events = Vec::new();
        for chunk in bytes.chunks(7) {
            events.extend(decoder.push(chunk).into_iter().map(Result::unwrap));
        }
        assert_eq!(events, vec![first, complete()]);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn decoder_skips_comments_and_accepts_crlf() {
        let json = serde_json::to_string(&complete()).unwrap();
        let raw = format!(": keep-alive\r\n\r\nevent: message\r\ndata: {json}\r\n\r\n");
        let events = SseFrameDecoder::new().push(raw.as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap(), &complete());
    }

    #[test]
    fn decoder_reports_bad_json() {
        let events = SseFrameDecoder::new().push(b"data: {not json}\n\n");
        assert!(matches!(events[0], Err(CoreError::SerializationError(_))));
    }

    #[test]
    fn finish_parses_unterminated_frame() {
        let json = serde_json::to_string(&complete()).unwrap();
        let mut decoder = SseFrameDecoder::new();
        assert!(decoder.push(format!("data: {json}").as_bytes()).is_empty());
        assert_eq!(decoder.finish().unwrap().unwrap(), complete());
    }

    #[tokio::test]
    async fn dropping_stream_cancels_token() {
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(4);
        let mut stream = ProgressStream::new(rx, token.clone());

        tx.send(complete()).await.unwrap();
        assert_eq!(stream.next().await, Some(complete()));
        assert!(!token.is_cancelled());

        drop(stream);
        assert!(token.is_cancelled());
        assert!(tx.send(complete()).await.is_err());
    }

    #[tokio::test]
    async fn stream_ends_when_sender_closes() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = ProgressStream::new(rx, CancellationToken::new());
        drop(tx);
        assert_eq!(stream.next().await, None);
    }
}
