//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_connections_total` (counter): bridge connections opened
//! - `bridge_connections_active` (gauge): current bridge connections
//! - `bridge_exchanges_total` (counter): completed exchanges by head status
//! - `bridge_exchange_duration_seconds` (histogram): exchange lifetime
//! - `bridge_frames_total` (counter): outbound frames by kind
//! - `bridge_rejected_total` (counter): requests answered by the bridge itself
//! - `bridge_http_requests_total` (counter): plain HTTP ingress requests

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::bridge::encoder::FrameKind;

/// Install the Prometheus exporter with an HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_connection_opened(active: u64) {
    counter!("bridge_connections_total").increment(1);
    gauge!("bridge_connections_active").set(active as f64);
}

pub fn record_connection_closed(active: u64) {
    gauge!("bridge_connections_active").set(active as f64);
}

pub fn record_frame(kind: FrameKind) {
    counter!("bridge_frames_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_exchange(status: u16, start: Instant) {
    counter!("bridge_exchanges_total", "status" => status.to_string()).increment(1);
    histogram!("bridge_exchange_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rejected(reason: &'static str) {
    counter!("bridge_rejected_total", "reason" => reason).increment(1);
}

pub fn record_http_request(method: &str, status: u16) {
    counter!(
        "bridge_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
