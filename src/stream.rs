use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, error};

use crate::{
    error::{ApiError, ApiResult},
    metrics::API_FAILURES,
    notify::{Notifier, BACKEND_UNREACHABLE},
};

pub type ChunkStream = Pin<Box<dyn Stream<Item = ApiResult<Vec<u8>>> + Send>>;

/// Splits a `text/event-stream` body into event payloads.
///
/// Only `data:` fields are kept; multi-line data is joined with `\n` and an
/// event ends at a blank line. Comments and other fields are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every event completed by this chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            let line = line.strip_suffix('\r').unwrap_or(&line);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }

            if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }

        events
    }

    /// Flush an event left open when the body ended without a blank line.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending.is_empty() {
            if let Some(event) = self.push(b"\n").pop() {
                return Some(event);
            }
        }
        if self.data.is_empty() {
            None
        } else {
            let event = self.data.join("\n");
            self.data.clear();
            Some(event)
        }
    }
}

/// Handle over a streamed chat reply.
///
/// A body error after the stream opened is reported on the notifier once;
/// later errors from the same stream are returned silently.
pub struct ChatStream {
    chunks: ChunkStream,
    decoder: SseDecoder,
    ready: VecDeque<String>,
    done: bool,
    notifier: Option<Arc<dyn Notifier>>,
    operation: &'static str,
    reported: bool,
}

impl std::fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStream")
            .field("ready", &self.ready.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl ChatStream {
    pub fn new(chunks: ChunkStream) -> Self {
        Self {
            chunks,
            decoder: SseDecoder::new(),
            ready: VecDeque::new(),
            done: false,
            notifier: None,
            operation: "stream_chat",
            reported: false,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>, operation: &'static str) -> Self {
        self.notifier = Some(notifier);
        self.operation = operation;
        self
    }

    pub fn from_response(response: reqwest::Response, notifier: Arc<dyn Notifier>) -> Self {
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ApiError::from));
        Self::new(Box::pin(chunks)).with_notifier(notifier, "stream_chat")
    }

    fn report(&mut self, err: ApiError) -> ApiError {
        if !self.reported {
            self.reported = true;
            error!(operation = self.operation, error = %err, "Chat stream failed");
            API_FAILURES.with_label_values(&[self.operation]).inc();
            if let Some(notifier) = &self.notifier {
                notifier.error(BACKEND_UNREACHABLE);
            }
        }
        err
    }

    /// Next raw body chunk, bypassing event decoding.
    pub async fn next_chunk(&mut self) -> Option<ApiResult<Vec<u8>>> {
        match self.chunks.next().await {
            Some(Err(err)) => Some(Err(self.report(err))),
            other => other,
        }
    }

    /// Next decoded event payload, or `None` once the body is exhausted.
    pub async fn next_event(&mut self) -> Option<ApiResult<String>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => {
                    let events = self.decoder.push(&chunk);
                    debug!(bytes = chunk.len(), events = events.len(), "Stream chunk");
                    self.ready.extend(events);
                }
                Some(Err(err)) => return Some(Err(self.report(err))),
                None => {
                    self.done = true;
                    self.ready.extend(self.decoder.finish());
                }
            }
        }
    }

    /// Drain the stream and concatenate every event payload.
    pub async fn collect_text(mut self) -> ApiResult<String> {
        let mut text = String::new();
        while let Some(event) = self.next_event().await {
            text.push_str(&event?);
        }
        Ok(text)
    }
}
