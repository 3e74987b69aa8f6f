//! Pseudo-response events and outbound frame parsing.
//!
//! A pipeline answers one request with an ordered sequence of
//! [`PseudoResponse`] events. Only the first (the head) carries a
//! meaningful status and headers; the rest are continuations.
//!
//! The parsing half of this module is used by clients reading frames back
//! off the connection.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use bytes::Bytes;

/// Status sentinel carried by continuation frames.
pub const CONTINUATION_STATUS: u16 = 0;

/// One response event of an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl PseudoResponse {
    /// A head event with the given status and no body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status: status.as_u16(),
            content_type: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// 200 OK with a typed body.
    pub fn ok(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK)
            .with_content_type(content_type)
            .with_body(body)
    }

    /// A continuation event: body only.
    pub fn chunk(body: impl Into<Bytes>) -> Self {
        Self {
            status: CONTINUATION_STATUS,
            content_type: None,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// A plain-text error head.
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status)
            .with_content_type("text/plain")
            .with_body(message.into())
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_continuation(&self) -> bool {
        self.status == CONTINUATION_STATUS
    }

    /// The body as UTF-8 text, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse an outbound frame back into an event.
    ///
    /// A frame is a head frame when it starts with an all-digit status line
    /// terminated by CRLF. Anything else is a continuation whose whole
    /// payload is the body.
    pub fn from_frame(frame: Bytes) -> Self {
        parse_head(&frame).unwrap_or_else(|| Self::chunk(frame))
    }
}

fn parse_head(frame: &Bytes) -> Option<PseudoResponse> {
    let mut lines = LineCursor::new(frame);

    let status_line = lines.next_line()?;
    if status_line.is_empty() || !status_line.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let status: u16 = std::str::from_utf8(status_line).ok()?.parse().ok()?;

    let mut response = PseudoResponse {
        status,
        content_type: None,
        headers: HeaderMap::new(),
        body: Bytes::new(),
    };
    loop {
        let line = lines.next_line()?;
        if line.is_empty() {
            break;
        }
        let colon = line.iter().position(|&b| b == b':')?;
        let name = HeaderName::from_bytes(&line[..colon]).ok()?;
        let value = HeaderValue::from_bytes(line[colon + 1..].trim_ascii()).ok()?;
        if name == header::CONTENT_TYPE {
            response.content_type = value.to_str().ok().map(str::to_string);
        }
        response.headers.insert(name, value);
    }
    response.body = frame.slice(lines.offset..);
    Some(response)
}

struct LineCursor<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> LineCursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Next CRLF-terminated line; `None` if no terminator remains.
    fn next_line(&mut self) -> Option<&'a [u8]> {
        let rest = &self.buf[self.offset..];
        let pos = rest.windows(2).position(|w| w == b"\r\n")?;
        self.offset += pos + 2;
        Some(&rest[..pos])
    }
}
