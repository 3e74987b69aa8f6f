//! Pseudo-request decoding.
//!
//! # Responsibilities
//! - Normalize binary and text messages into one byte sequence
//! - Parse the request line (`METHOD SP PATH`)
//! - Parse `Name: Value` header lines up to the blank line
//! - Take the remainder verbatim as the body
//!
//! # Grammar
//! ```text
//! request-line = method SP path [SP HTTP-version] CRLF
//! headers      = *( field-name ":" SP field-value CRLF ) CRLF
//! body         = *OCTET
//! ```
//!
//! A bare `METHOD SP PATH` with no header block is a complete request.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::uri::PathAndQuery;
use axum::http::Method;
use bytes::Bytes;
use thiserror::Error;

const CRLF: &[u8] = b"\r\n";

/// Media range assumed when a request carries no `Accept` header.
pub const DEFAULT_ACCEPT: &str = "*/*";

/// A message as delivered by the connection, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Binary(Bytes),
    Text(String),
}

impl InboundMessage {
    /// The message as raw bytes. Text framing is its UTF-8 rendering.
    pub fn into_bytes(self) -> Bytes {
        match self {
            InboundMessage::Binary(bytes) => bytes,
            InboundMessage::Text(text) => Bytes::from(text),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            InboundMessage::Binary(bytes) => bytes.len(),
            InboundMessage::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Framing label for logs and metrics.
    pub fn framing(&self) -> &'static str {
        match self {
            InboundMessage::Binary(_) => "binary",
            InboundMessage::Text(_) => "text",
        }
    }
}

/// Errors produced while decoding an inbound message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty message")]
    Empty,

    #[error("message of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("request line is not valid UTF-8")]
    NonUtf8RequestLine,

    #[error("malformed request line: {0:?}")]
    RequestLine(String),

    #[error("invalid method token: {0:?}")]
    Method(String),

    #[error("invalid request path: {0:?}")]
    Path(String),

    #[error("malformed header line: {0:?}")]
    HeaderLine(String),

    #[error("invalid header name: {0:?}")]
    HeaderName(String),

    #[error("invalid value for header {0}")]
    HeaderValue(String),
}

/// An HTTP-shaped request decoded from one connection message.
///
/// Immutable once decoded. Header names are case-insensitive and a repeated
/// header line replaces the earlier value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PseudoRequest {
    method: Method,
    target: PathAndQuery,
    headers: HeaderMap,
    body: Bytes,
}

impl PseudoRequest {
    /// Build a request directly, bypassing the wire grammar.
    pub fn new(method: Method, target: PathAndQuery, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            target,
            headers,
            body,
        }
    }

    /// Decode an inbound message, enforcing a size limit first.
    pub fn decode_message(message: InboundMessage, limit: usize) -> Result<Self, DecodeError> {
        if message.len() > limit {
            return Err(DecodeError::TooLarge {
                size: message.len(),
                limit,
            });
        }
        Self::decode(message.into_bytes())
    }

    /// Decode a raw message.
    pub fn decode(raw: Bytes) -> Result<Self, DecodeError> {
        if raw.is_empty() {
            return Err(DecodeError::Empty);
        }

        let (line, mut rest) = split_line(&raw, 0);
        let (method, target) = parse_request_line(&raw[line])?;

        let mut headers = HeaderMap::new();
        let mut body = Bytes::new();
        while let Some(offset) = rest {
            let (line, next) = split_line(&raw, offset);
            if line.is_empty() {
                // Blank line: everything after it is the body, untouched.
                if let Some(start) = next {
                    body = raw.slice(start..);
                }
                break;
            }
            let (name, value) = parse_header_line(&raw[line])?;
            headers.insert(name, value);
            rest = next;
        }

        Ok(Self {
            method,
            target,
            headers,
            body,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path component, without the query string.
    pub fn path(&self) -> &str {
        self.target.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.target.query()
    }

    pub fn target(&self) -> &PathAndQuery {
        &self.target
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header lookup by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Accept` header, or `*/*` when absent.
    pub fn accept(&self) -> &str {
        self.headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_ACCEPT)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Returns the byte range of the line starting at `offset` (without CRLF)
/// and the offset of the following line, if a CRLF terminated it.
fn split_line(raw: &[u8], offset: usize) -> (std::ops::Range<usize>, Option<usize>) {
    match raw[offset..].windows(CRLF.len()).position(|w| w == CRLF) {
        Some(pos) => (offset..offset + pos, Some(offset + pos + CRLF.len())),
        None => (offset..raw.len(), None),
    }
}

fn parse_request_line(line: &[u8]) -> Result<(Method, PathAndQuery), DecodeError> {
    let line = std::str::from_utf8(line).map_err(|_| DecodeError::NonUtf8RequestLine)?;

    let mut parts = line.split(' ');
    let (method, path) = match (parts.next(), parts.next()) {
        (Some(m), Some(p)) if !m.is_empty() && !p.is_empty() => (m, p),
        _ => return Err(DecodeError::RequestLine(line.to_string())),
    };
    match (parts.next(), parts.next()) {
        (None, _) => {}
        (Some(version), None) if version.starts_with("HTTP/") => {}
        _ => return Err(DecodeError::RequestLine(line.to_string())),
    }

    let method =
        Method::from_bytes(method.as_bytes()).map_err(|_| DecodeError::Method(method.to_string()))?;

    if !path.starts_with('/') {
        return Err(DecodeError::Path(path.to_string()));
    }
    let target = PathAndQuery::try_from(path).map_err(|_| DecodeError::Path(path.to_string()))?;

    Ok((method, target))
}

fn parse_header_line(line: &[u8]) -> Result<(HeaderName, HeaderValue), DecodeError> {
    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| DecodeError::HeaderLine(String::from_utf8_lossy(line).into_owned()))?;

    let (name, value) = (&line[..colon], &line[colon + 1..]);
    let name = HeaderName::from_bytes(name)
        .map_err(|_| DecodeError::HeaderName(String::from_utf8_lossy(name).into_owned()))?;

    let value = value.trim_ascii();
    let value =
        HeaderValue::from_bytes(value).map_err(|_| DecodeError::HeaderValue(name.to_string()))?;

    Ok((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_request_line() {
        let req = PseudoRequest::decode(Bytes::from_static(b"GET /websocket/web/bookstore/booknames"))
            .unwrap();
        assert_eq!(req.method(), Method::GET);
        assert_eq!(req.path(), "/websocket/web/bookstore/booknames");
        assert!(req.headers().is_empty());
        assert!(req.body().is_empty());
        assert_eq!(req.accept(), DEFAULT_ACCEPT);
    }

    #[test]
    fn test_headers_and_body() {
        let req = PseudoRequest::decode(Bytes::from_static(
            b"POST /base/booksplain\r\nContent-Type: text/plain\r\n\r\n123",
        ))
        .unwrap();
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.content_type(), Some("text/plain"));
        assert_eq!(req.body().as_ref(), b"123");
    }

    #[test]
    fn test_body_is_verbatim() {
        let req = PseudoRequest::decode(Bytes::from_static(
            b"POST /base/x\r\nA: 1\r\n\r\nline1\r\n\r\nline2\n",
        ))
        .unwrap();
        assert_eq!(req.body().as_ref(), b"line1\r\n\r\nline2\n");
    }

    #[test]
    fn test_trailing_blank_line_without_body() {
        let req = PseudoRequest::decode(Bytes::from_static(
            b"GET /base/bookstream\r\nAccept: application/json\r\n\r\n",
        ))
        .unwrap();
        assert_eq!(req.accept(), "application/json");
        assert!(req.body().is_empty());
    }

    #[test]
    fn test_request_line_then_blank_line() {
        let req = PseudoRequest::decode(Bytes::from_static(b"GET /base\r\n\r\nabc")).unwrap();
        assert!(req.headers().is_empty());
        assert_eq!(req.body().as_ref(), b"abc");
    }

    #[test]
    fn test_headers_without_terminating_blank_line() {
        let req = PseudoRequest::decode(Bytes::from_static(b"GET /base\r\nX-One: 1")).unwrap();
        assert_eq!(req.header("x-one"), Some("1"));
        assert!(req.body().is_empty());
    }

    #[test]
    fn test_header_names_case_insensitive_last_wins() {
        let req = PseudoRequest::decode(Bytes::from_static(
            b"GET /base\r\nX-Tag: first\r\nx-tag: second\r\n\r\n",
        ))
        .unwrap();
        assert_eq!(req.header("X-TAG"), Some("second"));
        assert_eq!(req.headers().get_all("x-tag").iter().count(), 1);
    }

    #[test]
    fn test_binary_and_text_decode_identically() {
        let raw = "POST /base/booksplain\r\nContent-Type: text/plain\r\n\r\n123";
        let from_text =
            PseudoRequest::decode_message(InboundMessage::Text(raw.to_string()), 1024).unwrap();
        let from_binary = PseudoRequest::decode_message(
            InboundMessage::Binary(Bytes::copy_from_slice(raw.as_bytes())),
            1024,
        )
        .unwrap();
        assert_eq!(from_text, from_binary);
    }

    #[test]
    fn test_optional_http_version() {
        let req = PseudoRequest::decode(Bytes::from_static(b"GET /base/x?a=1 HTTP/1.1")).unwrap();
        assert_eq!(req.path(), "/base/x");
        assert_eq!(req.query(), Some("a=1"));
    }

    #[test]
    fn test_malformed_request_lines() {
        for raw in [
            &b"GET"[..],
            b"GET ",
            b" /base",
            b"GET /base extra",
            b"GET base/x",
            b"G\x01T /base",
        ] {
            assert!(
                PseudoRequest::decode(Bytes::copy_from_slice(raw)).is_err(),
                "{:?} should not decode",
                String::from_utf8_lossy(raw)
            );
        }
        assert_eq!(PseudoRequest::decode(Bytes::new()), Err(DecodeError::Empty));
    }

    #[test]
    fn test_malformed_header_line() {
        let err = PseudoRequest::decode(Bytes::from_static(b"GET /base\r\nno-colon\r\n\r\n"))
            .unwrap_err();
        assert_eq!(err, DecodeError::HeaderLine("no-colon".to_string()));
    }

    #[test]
    fn test_size_limit() {
        let err = PseudoRequest::decode_message(InboundMessage::Text("GET /base".into()), 4)
            .unwrap_err();
        assert_eq!(err, DecodeError::TooLarge { size: 9, limit: 4 });
    }
}
