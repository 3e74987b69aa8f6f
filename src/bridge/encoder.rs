//! Response frame encoding and the per-connection writer handle.
//!
//! # Responsibilities
//! - Encode the first event of an exchange as a head frame
//!   (status line, headers, blank line, body)
//! - Encode every later event as a bare continuation frame (body only)
//! - Hand frames to the connection's single writer in emission order
//!
//! # Data Flow
//! ```text
//! PseudoResponse events (in order)
//!     → ExchangeEncoder (head on first, continuation after)
//!     → FrameWriter (bounded queue)
//!     → writer task (one per connection)
//!     → one outbound message per frame
//! ```

use axum::http::header;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::bridge::error::SessionError;
use crate::bridge::response::PseudoResponse;

/// Content type written on head frames whose event carries none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Which part of an exchange a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Head,
    Continuation,
}

impl FrameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameKind::Head => "head",
            FrameKind::Continuation => "continuation",
        }
    }
}

/// One encoded outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Bytes,
}

/// Encodes the event sequence of a single exchange.
///
/// A fresh encoder is created per exchange; it remembers whether the head
/// frame has been produced.
#[derive(Debug, Default)]
pub struct ExchangeEncoder {
    frames: usize,
}

impl ExchangeEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames encoded so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn encode(&mut self, event: &PseudoResponse) -> Frame {
        let frame = if self.frames == 0 {
            Frame {
                kind: FrameKind::Head,
                payload: encode_head(event),
            }
        } else {
            Frame {
                kind: FrameKind::Continuation,
                payload: event.body.clone(),
            }
        };
        self.frames += 1;
        frame
    }
}

fn encode_head(event: &PseudoResponse) -> Bytes {
    let content_type = event
        .content_type
        .as_deref()
        .or_else(|| {
            event
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
        })
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    let mut buf = BytesMut::with_capacity(64 + event.body.len());
    buf.put_slice(event.status.to_string().as_bytes());
    buf.put_slice(b"\r\n");

    buf.put_slice(header::CONTENT_TYPE.as_str().as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(content_type.as_bytes());
    buf.put_slice(b"\r\n");

    for (name, value) in event.headers.iter() {
        if name == header::CONTENT_TYPE {
            continue;
        }
        buf.put_slice(name.as_str().as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(b"\r\n");
    buf.put_slice(&event.body);
    buf.freeze()
}

/// Handle to a connection's single outbound writer.
///
/// Cloneable and usable from any task; frames from one handle arrive at the
/// writer in the order they were sent.
#[derive(Debug, Clone)]
pub struct FrameWriter {
    tx: mpsc::Sender<Bytes>,
}

impl FrameWriter {
    /// Create a writer handle and the receiving end the writer task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a frame, waiting for room if the writer is behind.
    pub async fn send(&self, frame: Frame) -> Result<(), SessionError> {
        self.tx
            .send(frame.payload)
            .await
            .map_err(|_| SessionError::WriterClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    #[test]
    fn test_first_event_is_head() {
        let mut encoder = ExchangeEncoder::new();
        let frame = encoder.encode(&PseudoResponse::ok("text/plain", "CXF in Action"));
        assert_eq!(frame.kind, FrameKind::Head);
        assert_eq!(
            frame.payload.as_ref(),
            b"200\r\ncontent-type: text/plain\r\n\r\nCXF in Action"
        );
    }

    #[test]
    fn test_later_events_are_body_only() {
        let mut encoder = ExchangeEncoder::new();
        encoder.encode(&PseudoResponse::ok("application/octet-stream", "Today: x"));

        // Status and headers on later events are dropped.
        let later = PseudoResponse::ok("text/plain", "2")
            .with_header(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let frame = encoder.encode(&later);
        assert_eq!(frame.kind, FrameKind::Continuation);
        assert_eq!(frame.payload.as_ref(), b"2");
        assert_eq!(encoder.frames(), 2);
    }

    #[test]
    fn test_head_headers_and_default_content_type() {
        let mut encoder = ExchangeEncoder::new();
        let event = PseudoResponse::new(StatusCode::METHOD_NOT_ALLOWED)
            .with_header(header::ALLOW, HeaderValue::from_static("GET"));
        let frame = encoder.encode(&event);
        assert_eq!(
            frame.payload.as_ref(),
            b"405\r\ncontent-type: application/octet-stream\r\nallow: GET\r\n\r\n"
        );
    }

    #[test]
    fn test_head_round_trips_through_parser() {
        let mut encoder = ExchangeEncoder::new();
        let event = PseudoResponse::ok("application/xml", "<Book/>");
        let parsed = PseudoResponse::from_frame(encoder.encode(&event).payload);
        assert_eq!(parsed.status, 200);
        assert_eq!(parsed.content_type.as_deref(), Some("application/xml"));
        assert_eq!(parsed.body, event.body);
    }

    #[tokio::test]
    async fn test_writer_preserves_order() {
        let (writer, mut rx) = FrameWriter::channel(8);
        let mut encoder = ExchangeEncoder::new();
        for body in ["a", "b", "c"] {
            writer
                .send(encoder.encode(&PseudoResponse::ok("text/plain", body)))
                .await
                .unwrap();
        }
        rx.recv().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().as_ref(), b"b");
        assert_eq!(rx.recv().await.unwrap().as_ref(), b"c");
    }

    #[tokio::test]
    async fn test_writer_reports_closed_connection() {
        let (writer, rx) = FrameWriter::channel(1);
        drop(rx);
        assert!(writer.is_closed());
        let err = writer
            .send(ExchangeEncoder::new().encode(&PseudoResponse::chunk("x")))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::WriterClosed));
    }
}
