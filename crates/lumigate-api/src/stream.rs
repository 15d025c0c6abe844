//! Server-sent event stream from the bridge.
//!
//! Opens one long-lived GET on the secured channel and streams parsed
//! resource events through a [`tokio::sync::broadcast`] channel. There is
//! no reconnection: when the bridge closes the connection or the caller
//! cancels, the buffer is dropped, the task ends and subscribers see the
//! channel close. Callers own reconnection policy.
//!
//! # Example
//!
//! ```rust,ignore
//! use lumigate_api::stream::EventStream;
//!
//! let mut stream = EventStream::open(&session, &credentials.token).await?;
//!
//! while let Some(event) = stream.recv().await {
//!     println!("{} {} {}", event.change, event.kind, event.id);
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::{APPLICATION_KEY_HEADER, token_header};
use crate::error::Error;
use crate::session::Session;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub const EVENT_STREAM_PATH: &str = "eventstream/clip/v2";

// ── Records ──────────────────────────────────────────────────────────

/// One blank-line-delimited record: `event:`, `data:` and `id:` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamRecord {
    pub event: Option<String>,
    /// Multiple `data:` lines are joined with `\n`.
    pub data: String,
    pub id: Option<String>,
}

impl StreamRecord {
    /// Parse one record's text. `None` for comment-only or empty records.
    pub fn parse(text: &str) -> Option<Self> {
        let mut record = Self::default();
        let mut has_data = false;

        for line in text.lines() {
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
                None => (line, ""),
            };
            match field {
                "event" => record.event = Some(value.to_owned()),
                "id" => record.id = Some(value.to_owned()),
                "data" => {
                    if has_data {
                        record.data.push('\n');
                    }
                    record.data.push_str(value);
                    has_data = true;
                }
                _ => {}
            }
        }

        has_data.then_some(record)
    }
}

// ── Incremental parser ───────────────────────────────────────────────

/// Rolling buffer that turns arbitrary chunks into complete records.
///
/// A trailing partial record stays in the buffer until the chunk that
/// completes it arrives.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    buffer: Vec<u8>,
}

impl EventStreamParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every record it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamRecord> {
        // CR never appears unescaped inside a JSON payload, so dropping it
        // folds CRLF framing into LF framing even across chunk boundaries.
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut records = Vec::new();
        while let Some(pos) = find_separator(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..pos + 2).collect();
            let text = String::from_utf8_lossy(&raw[..pos]);
            if let Some(record) = StreamRecord::parse(&text) {
                records.push(record);
            }
        }
        records
    }

    /// Bytes held back waiting for the rest of a record.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

fn find_separator(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

// ── Events ───────────────────────────────────────────────────────────

/// A single resource change published by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Resource id the change applies to.
    pub id: String,
    /// Resource type, e.g. `light`, `zigbee_connectivity`.
    pub kind: String,
    /// Envelope type: `update`, `add`, `delete` or `error`.
    pub change: String,
    /// Record `id:` field, when the bridge sent one.
    pub sequence_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// The full resource fragment as sent.
    pub data: serde_json::Value,
}

/// `data:` payload: an array of these.
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(default)]
    creationtime: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    change: String,
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

/// Decode one record's payload into individual events, in order.
pub fn decode_record(record: &StreamRecord) -> Result<Vec<StreamEvent>, Error> {
    let envelopes: Vec<EventEnvelope> =
        serde_json::from_str(&record.data).map_err(|e| Error::decode(&e, record.data.clone()))?;

    let mut events = Vec::new();
    for envelope in envelopes {
        for item in envelope.data {
            events.push(StreamEvent {
                id: item["id"].as_str().unwrap_or_default().to_owned(),
                kind: item["type"].as_str().unwrap_or("unknown").to_owned(),
                change: envelope.change.clone(),
                sequence_id: record.id.clone(),
                created_at: envelope.creationtime,
                data: item,
            });
        }
    }
    Ok(events)
}

/// Parse a chunk and broadcast every event it completes.
///
/// Returns how many events were published.
pub fn publish_chunk(
    parser: &mut EventStreamParser,
    chunk: &[u8],
    event_tx: &broadcast::Sender<Arc<StreamEvent>>,
) -> usize {
    let mut published = 0;
    for record in parser.feed(chunk) {
        match decode_record(&record) {
            Ok(events) => {
                for event in events {
                    // Ignore send errors -- just means no active subscribers right now
                    let _ = event_tx.send(Arc::new(event));
                    published += 1;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, event = ?record.event, "Failed to decode stream record");
            }
        }
    }
    published
}

// ── EventStream ──────────────────────────────────────────────────────

/// Handle to a running event stream.
///
/// Drop or [`cancel`](Self::cancel) to stop the background task.
pub struct EventStream {
    event_rx: broadcast::Receiver<Arc<StreamEvent>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl EventStream {
    /// Open the stream and spawn the reader.
    ///
    /// The request itself is awaited so authentication and status
    /// failures surface here rather than as a silently closed channel.
    pub async fn open(session: &Session, token: &SecretString) -> Result<Self, Error> {
        let url = session.secure_url(EVENT_STREAM_PATH)?;
        tracing::info!(url = %url, "Opening event stream");

        // No timeout: the subscription lives as long as the bridge keeps it open.
        let resp = session
            .secure()
            .get(url)
            .header(APPLICATION_KEY_HEADER, token_header(token)?)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::from_status(status, &body));
        }

        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            read_loop(resp, event_tx, task_cancel).await;
        });

        Ok(Self {
            event_rx,
            cancel,
            task: Some(task),
        })
    }

    /// Get a new receiver. It sees events published after this call;
    /// receivers see `Closed` once the stream ends.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StreamEvent>> {
        self.event_rx.resubscribe()
    }

    /// Next event on the primary receiver, which has been attached since
    /// the stream opened. `None` once the stream has ended and drained.
    pub async fn recv(&mut self) -> Option<Arc<StreamEvent>> {
        loop {
            match self.event_rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream consumer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stop reading. The buffer is discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait until the reader task has ended (disconnect or cancel).
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Reader ───────────────────────────────────────────────────────────

async fn read_loop(
    resp: reqwest::Response,
    event_tx: broadcast::Sender<Arc<StreamEvent>>,
    cancel: CancellationToken,
) {
    let mut parser = EventStreamParser::new();
    let mut body = resp.bytes_stream();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("Event stream cancelled");
                break;
            }
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    publish_chunk(&mut parser, &bytes, &event_tx);
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Event stream read failed");
                    break;
                }
                None => {
                    tracing::info!("Event stream ended by bridge");
                    break;
                }
            }
        }
    }

    if parser.pending() > 0 {
        tracing::debug!(bytes = parser.pending(), "Discarding partial record");
    }
    parser.clear();
}

// ── Tests ────────────────────────────────────────────────────────────
