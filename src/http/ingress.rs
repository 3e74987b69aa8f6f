//! Plain HTTP ingress.
//!
//! Ordinary requests go through the same `Invoker` as bridge exchanges. The
//! head event supplies status, content type and headers; the response body
//! is the head body followed by every continuation body, streamed as the
//! pipeline produces them.

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{header, uri::PathAndQuery, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::bridge::response::PseudoResponse;
use crate::bridge::request::PseudoRequest;
use crate::http::server::AppState;
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::pipeline::{ExchangeContext, ResponseStream};

/// Serve one plain HTTP request through the pipeline.
pub async fn handle(state: AppState, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();

    let body = match axum::body::to_bytes(body, state.config.session.max_message_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Request body rejected");
            metrics::record_http_request(method.as_str(), StatusCode::PAYLOAD_TOO_LARGE.as_u16());
            return (StatusCode::PAYLOAD_TOO_LARGE, "request body too large").into_response();
        }
    };

    let target = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    let request = PseudoRequest::new(parts.method, target, parts.headers, body);

    tracing::debug!(method = %method, path = %request.path(), "Plain HTTP request");

    let cancel = state.sessions.child_token();
    let context = ExchangeContext::new(ConnectionId::new(), 1, cancel.clone());
    let mut events = state.invoker.invoke(request, context);

    let head = match events.next().await {
        Some(head) => head,
        None => PseudoResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "empty response"),
    };
    metrics::record_http_request(method.as_str(), head.status);

    into_response(head, events, cancel)
}

/// Build a streamed response; dropping the body cancels the exchange.
fn into_response(head: PseudoResponse, rest: ResponseStream, cancel: CancellationToken) -> Response {
    let PseudoResponse {
        status,
        content_type,
        headers: head_headers,
        body: head_body,
    } = head;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let guard = cancel.drop_guard();

    let bodies = stream::once(async move { head_body })
        .chain(rest.map(|event| event.body))
        .boxed();
    let chunks = stream::unfold((bodies, guard), |(mut bodies, guard)| async move {
        let chunk = bodies.next().await?;
        Some((Ok::<_, Infallible>(chunk), (bodies, guard)))
    });

    let mut response = Response::new(Body::from_stream(chunks));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in head_headers.iter() {
        headers.append(name.clone(), value.clone());
    }
    if let Some(content_type) = content_type.as_deref() {
        match HeaderValue::from_str(content_type) {
            Ok(value) => {
                headers.insert(header::CONTENT_TYPE, value);
            }
            Err(_) => tracing::warn!(content_type, "Invalid content type from pipeline"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderName;

    #[tokio::test]
    async fn test_head_and_continuations_form_body() {
        let head = PseudoResponse::ok("text/plain", "a")
            .with_header(HeaderName::from_static("x-book"), HeaderValue::from_static("1"));
        let rest = stream::iter(vec![PseudoResponse::chunk("b"), PseudoResponse::chunk("c")]).boxed();

        let response = into_response(head, rest, CancellationToken::new());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(response.headers()["x-book"], "1");

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"abc");
    }

    #[tokio::test]
    async fn test_repeated_head_headers_all_kept() {
        let mut head = PseudoResponse::ok("text/plain", "");
        head.headers.append("x-book", HeaderValue::from_static("1"));
        head.headers.append("x-book", HeaderValue::from_static("2"));

        let response = into_response(head, stream::empty::<PseudoResponse>().boxed(), CancellationToken::new());
        let values: Vec<_> = response.headers().get_all("x-book").iter().collect();
        assert_eq!(values, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_continuation_head_is_server_error_and_drop_cancels() {
        let cancel = CancellationToken::new();
        let rest = stream::pending::<PseudoResponse>().boxed();
        let response = into_response(PseudoResponse::chunk(""), rest, cancel.clone());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        drop(response);
        assert!(cancel.is_cancelled());
    }
}
