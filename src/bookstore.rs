//! Demo resource set served under `/websocket/web/bookstore`.
//!
//! Exercises every response shape the bridge carries: a single text value,
//! a negotiated XML/JSON document, an echoed body, and two streams that keep
//! producing after the head frame.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use serde::Serialize;

use crate::bridge::response::PseudoResponse;
use crate::config::EndpointConfig;
use crate::pipeline::{stream, ResourceRequest, Resources, ResponseStream};

pub const BASE_PATH: &str = "/websocket/web/bookstore";

const BOOK_NAME: &str = "CXF in Action";
const BOOK_ID: u64 = 123;
const STREAM_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Book {
    pub id: u64,
    pub name: String,
}

impl Book {
    fn lookup(id: u64) -> Self {
        let name = if id == BOOK_ID {
            BOOK_NAME.to_string()
        } else {
            format!("CXF Book {id}")
        };
        Self { id, name }
    }

    fn to_xml(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <Book><id>{}</id><name>{}</name></Book>",
            self.id, self.name
        )
    }

    fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct Envelope<'a> {
            #[serde(rename = "Book")]
            book: &'a Book,
        }
        // Serializing two plain fields cannot fail.
        serde_json::to_string(&Envelope { book: self }).unwrap_or_default()
    }
}

/// The endpoint binding the bookstore is reachable through.
pub fn endpoint() -> EndpointConfig {
    EndpointConfig {
        name: "bookstore".to_string(),
        base_path: BASE_PATH.to_string(),
    }
}

/// Build the bookstore resources.
pub fn resources() -> Resources {
    Resources::new()
        .route_producing(
            Method::GET,
            &format!("{BASE_PATH}/booknames"),
            &["text/plain"],
            |_: ResourceRequest| stream::single(PseudoResponse::ok("text/plain", BOOK_NAME)),
        )
        .route_producing(
            Method::GET,
            &format!("{BASE_PATH}/booknames/servletstream"),
            &["text/plain"],
            book_name_stream,
        )
        .route_producing(
            Method::GET,
            &format!("{BASE_PATH}/books/{{id}}"),
            &["application/xml", "application/json"],
            get_book,
        )
        .route_producing(
            Method::POST,
            &format!("{BASE_PATH}/booksplain"),
            &["text/plain"],
            |req: ResourceRequest| {
                stream::single(PseudoResponse::ok("text/plain", req.request.body().clone()))
            },
        )
        .route_producing(
            Method::GET,
            &format!("{BASE_PATH}/bookbought"),
            &["application/octet-stream"],
            book_bought,
        )
        .route_producing(
            Method::GET,
            &format!("{BASE_PATH}/bookstream"),
            &["application/json"],
            book_stream,
        )
}

fn get_book(req: ResourceRequest) -> ResponseStream {
    let Some(id) = req.params.get("id").and_then(|id| id.parse::<u64>().ok()) else {
        return stream::single(PseudoResponse::error(StatusCode::NOT_FOUND, "no such book"));
    };
    let book = Book::lookup(id);
    let response = match req.media_type.as_deref() {
        Some("application/json") => PseudoResponse::ok("application/json", book.to_json()),
        _ => PseudoResponse::ok("application/xml", book.to_xml()),
    };
    stream::single(response)
}

/// The book name written through a producer task rather than returned.
fn book_name_stream(req: ResourceRequest) -> ResponseStream {
    stream::channel(&req.context, 1, |emitter| async move {
        let _ = emitter.emit(PseudoResponse::ok("text/plain", BOOK_NAME)).await;
    })
}

/// A dated head followed by 2, 4, 8, 16, 32 over time.
fn book_bought(req: ResourceRequest) -> ResponseStream {
    stream::channel(&req.context, 4, |emitter| async move {
        let head = PseudoResponse::ok("application/octet-stream", format!("Today: {}", today()));
        if emitter.emit(head).await.is_err() {
            return;
        }
        let mut value = 2u32;
        for _ in 0..5 {
            tokio::time::sleep(STREAM_INTERVAL).await;
            if emitter.emit(PseudoResponse::chunk(value.to_string())).await.is_err() {
                return;
            }
            value *= 2;
        }
    })
}

/// Five JSON book documents, one per event.
fn book_stream(req: ResourceRequest) -> ResponseStream {
    stream::channel(&req.context, 4, |emitter| async move {
        for id in 1..=5u64 {
            let json = Book {
                id,
                name: format!("WebSocket{id}"),
            }
            .to_json();
            let event = if id == 1 {
                PseudoResponse::ok("application/json", json)
            } else {
                PseudoResponse::chunk(json)
            };
            if emitter.emit(event).await.is_err() {
                return;
            }
            tokio::time::sleep(STREAM_INTERVAL).await;
        }
    })
}

/// Current UTC date as `YYYY-MM-DD`.
fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
