//! End-to-end bridge scenarios over real WebSocket connections.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use ws_bridge::bookstore;
use ws_bridge::client::{BridgeClient, ClientError, Framing, RequestBuilder};

mod common;

const WAIT: Duration = Duration::from_secs(3);

fn path(rest: &str) -> String {
    format!("{}/{}", bookstore::BASE_PATH, rest)
}

#[tokio::test]
async fn test_book_exchanges_over_one_connection() {
    let addr: SocketAddr = "127.0.0.1:28381".parse().unwrap();
    let shutdown = common::start_bookstore(addr).await;
    let mut client = BridgeClient::connect(&common::ws_url(addr)).await.unwrap();

    // Binary then text framing of the same request.
    for framing in [Framing::Binary, Framing::Text] {
        client
            .send_framed(&RequestBuilder::get(path("booknames")), framing)
            .await
            .unwrap();
        let response = client.next_response_within(WAIT).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("text/plain"));
        assert_eq!(response.text(), "CXF in Action");
    }

    client.send(&RequestBuilder::get(path("books/123"))).await.unwrap();
    let response = client.next_response_within(WAIT).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type.as_deref(), Some("application/xml"));
    let xml = response.text();
    assert!(xml.starts_with("<?xml ") && xml.ends_with("</Book>"));

    for framing in [Framing::Binary, Framing::Text] {
        let request = RequestBuilder::post(path("booksplain"))
            .header("Content-Type", "text/plain")
            .body("123");
        client.send_framed(&request, framing).await.unwrap();
        let response = client.next_response_within(WAIT).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type.as_deref(), Some("text/plain"));
        assert_eq!(response.text(), "123");
    }

    client.close().await.unwrap();
    shutdown.trigger();
}

#[tokio::test]
async fn test_continuous_stream_output() {
    let addr: SocketAddr = "127.0.0.1:28382".parse().unwrap();
    let shutdown = common::start_bookstore(addr).await;
    let mut client = BridgeClient::connect(&common::ws_url(addr)).await.unwrap();

    client.send(&RequestBuilder::get(path("bookbought"))).await.unwrap();
    let frames = client.collect(6, WAIT).await.unwrap();

    assert_eq!(frames[0].status, 200);
    assert_eq!(frames[0].content_type.as_deref(), Some("application/octet-stream"));
    assert!(frames[0].text().starts_with("Today:"));
    let mut expected = 2;
    for frame in &frames[1..] {
        // Later frames carry neither status nor headers.
        assert_eq!(frame.status, 0);
        assert!(frame.headers.is_empty());
        assert_eq!(frame.text().parse::<u32>().unwrap(), expected);
        expected *= 2;
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_json_book_stream() {
    let addr: SocketAddr = "127.0.0.1:28383".parse().unwrap();
    let shutdown = common::start_bookstore(addr).await;
    let mut client = BridgeClient::connect(&common::ws_url(addr)).await.unwrap();

    let request = RequestBuilder::get(path("bookstream")).header("Accept", "application/json");
    client.send(&request).await.unwrap();
    let frames = client.collect(5, WAIT).await.unwrap();

    assert_eq!(frames[0].status, 200);
    assert_eq!(frames[0].content_type.as_deref(), Some("application/json"));
    for (i, frame) in frames.iter().enumerate() {
        let id = i + 1;
        if i > 0 {
            assert_eq!(frame.status, 0);
        }
        assert_eq!(
            frame.text(),
            format!("{{\"Book\":{{\"id\":{id},\"name\":\"WebSocket{id}\"}}}}")
        );
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_servlet_stream_single_frame() {
    let addr: SocketAddr = "127.0.0.1:28384".parse().unwrap();
    let shutdown = common::start_bookstore(addr).await;
    let mut client = BridgeClient::connect(&common::ws_url(addr)).await.unwrap();

    client
        .send(&RequestBuilder::get(path("booknames/servletstream")))
        .await
        .unwrap();
    let response = client.next_response_within(WAIT).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type.as_deref(), Some("text/plain"));
    assert_eq!(response.text(), "CXF in Action");

    // Exactly one frame for this exchange.
    assert!(matches!(
        client.next_response_within(Duration::from_millis(300)).await,
        Err(ClientError::Timeout(_))
    ));

    shutdown.trigger();
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let addr: SocketAddr = "127.0.0.1:28385".parse().unwrap();
    let shutdown = common::start_bookstore(addr).await;
    let mut client = BridgeClient::connect(&common::ws_url(addr)).await.unwrap();

    client.send(&RequestBuilder::post(path("booknames"))).await.unwrap();
    let response = client.next_response_within(WAIT).await.unwrap();
    assert_eq!(response.status, 405);

    shutdown.trigger();
}

#[tokio::test]
async fn test_path_outside_scope_is_400_and_connection_survives() {
    let addr: SocketAddr = "127.0.0.1:28386".parse().unwrap();
    let shutdown = common::start_bookstore(addr).await;
    let mut client = BridgeClient::connect(&common::ws_url(addr)).await.unwrap();

    client
        .send(&RequestBuilder::get("/websocket/bookstore2"))
        .await
        .unwrap();
    let response = client.next_response_within(WAIT).await.unwrap();
    assert_eq!(response.status, 400);

    client.send_binary("NOT A REQUEST LINE AT ALL").await.unwrap();
    let response = client.next_response_within(WAIT).await.unwrap();
    assert_eq!(response.status, 400);

    client.send(&RequestBuilder::get(path("booknames"))).await.unwrap();
    let response = client.next_response_within(WAIT).await.unwrap();
    assert_eq!(response.status, 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_connection_limit_refuses_upgrade() {
    let addr: SocketAddr = "127.0.0.1:28387".parse().unwrap();
    let mut config = common::bookstore_config(addr);
    config.listener.max_connections = 1;
    let shutdown = common::start_bridge(config, Arc::new(bookstore::resources())).await;

    let _first = BridgeClient::connect(&common::ws_url(addr)).await.unwrap();
    let second = BridgeClient::connect(&common::ws_url(addr)).await;
    match second {
        Err(ClientError::WebSocket(tokio_tungstenite::tungstenite::Error::Http(response))) => {
            assert_eq!(response.status(), 503);
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("second connection should be refused"),
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_closes_live_sessions() {
    let addr: SocketAddr = "127.0.0.1:28388".parse().unwrap();
    let shutdown = common::start_bookstore(addr).await;
    let mut client = BridgeClient::connect(&common::ws_url(addr)).await.unwrap();

    client.send(&RequestBuilder::get(path("booknames"))).await.unwrap();
    assert_eq!(client.next_response_within(WAIT).await.unwrap().status, 200);

    shutdown.trigger();
    let after = client.next_response_within(WAIT).await;
    assert!(
        matches!(after, Err(ClientError::Closed) | Err(ClientError::WebSocket(_))),
        "expected the session to close, got {after:?}"
    );
}

#[tokio::test]
async fn test_admin_lists_sessions() {
    let addr: SocketAddr = "127.0.0.1:28389".parse().unwrap();
    let admin_addr = "127.0.0.1:28390";
    let mut config = common::bookstore_config(addr);
    config.admin.enabled = true;
    config.admin.bind_address = admin_addr.to_string();
    let shutdown = common::start_bridge(config, Arc::new(bookstore::resources())).await;

    let mut client = BridgeClient::connect(&common::ws_url(addr)).await.unwrap();
    client.send(&RequestBuilder::get(path("booknames"))).await.unwrap();
    client.next_response_within(WAIT).await.unwrap();
    // The exchange is counted once its stream has ended.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let sessions: serde_json::Value = reqwest::get(format!("http://{admin_addr}/admin/sessions"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["base_path"], bookstore::BASE_PATH);
    assert_eq!(sessions[0]["exchanges"], 1);

    let status: serde_json::Value = reqwest::get(format!("http://{admin_addr}/admin/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["active_connections"], 1);

    shutdown.trigger();
}
