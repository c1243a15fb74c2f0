//! Server-Sent Events consumption
//!
//! [`SseDecoder`] turns raw body chunks into frames, and [`EventStream`]
//! turns frames into typed [`StreamEvent`]s. Frames whose data does not
//! decode are logged and dropped; they never surface as errors.

use crate::error::{SdkError, SdkResult};
use agent_race_core::StreamEvent;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::Response;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, warn};

/// One dispatched SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the last `event:` field, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Incremental SSE parser.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; bytes are
/// buffered until a full line is available. LF and CRLF endings are
/// accepted.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" | "retry" => {}
            other => debug!("Ignoring unknown SSE field {}", other),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

/// Typed stream of agent run events.
///
/// Yields `Err(SdkError::StreamInterrupted)` once if the transport fails
/// and then ends. A clean end of the body simply ends the stream; whether a
/// `complete` event was seen is up to the consumer.
pub struct EventStream {
    inner: BoxStream<'static, SdkResult<StreamEvent>>,
}

impl EventStream {
    /// Wrap an open `text/event-stream` response.
    pub fn from_response(response: Response) -> Self {
        let bytes = Box::pin(response.bytes_stream());
        let state = (
            bytes,
            SseDecoder::new(),
            VecDeque::<SdkResult<StreamEvent>>::new(),
            false,
        );

        let inner = stream::unfold(state, |(mut bytes, mut decoder, mut pending, mut done)| async move {
            loop {
                if let Some(item) = pending.pop_front() {
                    return Some((item, (bytes, decoder, pending, done)));
                }
                if done {
                    return None;
                }
                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        for frame in decoder.push(&chunk) {
                            match StreamEvent::decode(frame.event.as_deref(), &frame.data) {
                                Ok(event) => pending.push_back(Ok(event)),
                                Err(e) => warn!(
                                    event = frame.event.as_deref().unwrap_or("message"),
                                    "Dropping undecodable stream frame: {}", e
                                ),
                            }
                        }
                    }
                    Some(Err(e)) => {
                        done = true;
                        pending.push_back(Err(SdkError::StreamInterrupted(e.to_string())));
                    }
                    None => done = true,
                }
            }
        });

        Self {
            inner: inner.boxed(),
        }
    }

    /// Build a stream from already known items, e.g. a recorded run or an
    /// in-process backend.
    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = SdkResult<StreamEvent>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            inner: stream::iter(events).boxed(),
        }
    }

    /// Wrap any stream of events.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = SdkResult<StreamEvent>> + Send + 'static,
    {
        Self {
            inner: stream.boxed(),
        }
    }
}

impl Stream for EventStream {
    type Item = SdkResult<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream").finish_non_exhaustive()
    }
}
