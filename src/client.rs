//! Client library for bridge connections.
//!
//! # Example
//! ```no_run
//! # async fn demo() -> Result<(), ws_bridge::client::ClientError> {
//! use ws_bridge::client::{BridgeClient, RequestBuilder};
//!
//! let mut client = BridgeClient::connect("ws://localhost:8080/websocket/web/bookstore").await?;
//! client
//!     .send(&RequestBuilder::get("/websocket/web/bookstore/booknames"))
//!     .await?;
//! let response = client.next_response().await?;
//! assert_eq!(response.status, 200);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};

use crate::bridge::response::PseudoResponse;

/// Client-side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("connection closed by server")]
    Closed,

    #[error("no frame received within {0:?}")]
    Timeout(Duration),
}

/// How a request message is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    #[default]
    Binary,
    Text,
}

/// Renders a request message in the bridge's inbound grammar.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: String,
    target: String,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl RequestBuilder {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new("GET", target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new("POST", target)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// The message bytes. A request with neither headers nor body is just
    /// its request line.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_slice(self.method.as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(self.target.as_bytes());
        if self.headers.is_empty() && self.body.is_empty() {
            return buf.freeze();
        }
        buf.put_slice(b"\r\n");
        for (name, value) in &self.headers {
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");
        buf.put_slice(&self.body);
        buf.freeze()
    }
}

/// One bridge connection.
pub struct BridgeClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl BridgeClient {
    /// Open a connection to `url`, e.g. `ws://host:port/base/path`.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _) = connect_async(url).await?;
        tracing::debug!(url, "Bridge client connected");
        Ok(Self { stream })
    }

    /// Send a request as a binary message.
    pub async fn send(&mut self, request: &RequestBuilder) -> Result<(), ClientError> {
        self.send_framed(request, Framing::Binary).await
    }

    pub async fn send_framed(&mut self, request: &RequestBuilder, framing: Framing) -> Result<(), ClientError> {
        let message = request.encode();
        match framing {
            Framing::Binary => self.send_binary(message).await,
            Framing::Text => {
                self.send_text(String::from_utf8_lossy(&message).into_owned())
                    .await
            }
        }
    }

    /// Send an arbitrary binary message.
    pub async fn send_binary(&mut self, message: impl Into<Bytes>) -> Result<(), ClientError> {
        self.stream.send(Message::binary(message.into())).await?;
        Ok(())
    }

    /// Send an arbitrary text message.
    pub async fn send_text(&mut self, message: impl Into<String>) -> Result<(), ClientError> {
        self.stream.send(Message::text(message.into())).await?;
        Ok(())
    }

    /// Wait for the next frame.
    pub async fn next_response(&mut self) -> Result<PseudoResponse, ClientError> {
        while let Some(message) = self.stream.next().await {
            match message? {
                Message::Binary(bytes) => return Ok(PseudoResponse::from_frame(bytes)),
                Message::Text(text) => {
                    return Ok(PseudoResponse::from_frame(Bytes::copy_from_slice(text.as_bytes())))
                }
                Message::Close(_) => return Err(ClientError::Closed),
                _ => continue,
            }
        }
        Err(ClientError::Closed)
    }

    /// Wait for the next frame, at most `timeout`.
    pub async fn next_response_within(&mut self, timeout: Duration) -> Result<PseudoResponse, ClientError> {
        tokio::time::timeout(timeout, self.next_response())
            .await
            .map_err(|_| ClientError::Timeout(timeout))?
    }

    /// Collect `count` frames, each within `timeout` of the previous one.
    pub async fn collect(&mut self, count: usize, timeout: Duration) -> Result<Vec<PseudoResponse>, ClientError> {
        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            frames.push(self.next_response_within(timeout).await?);
        }
        Ok(frames)
    }

    /// Close the connection with a normal close handshake.
    pub async fn close(mut self) -> Result<(), ClientError> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
