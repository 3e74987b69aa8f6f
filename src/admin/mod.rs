//! Read-only admin API.
//!
//! Served on its own listener when `admin.enabled` is set:
//! - `GET /admin/status`: version and connection counts
//! - `GET /admin/sessions`: one entry per live bridge session

pub mod handlers;

use axum::{routing::get, Router};

use crate::net::connection::ConnectionTracker;
use self::handlers::*;

pub fn setup_admin_router(connections: ConnectionTracker) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/sessions", get(get_sessions))
        .with_state(connections)
}
