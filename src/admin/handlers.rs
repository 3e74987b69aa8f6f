use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::net::connection::ConnectionTracker;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub active_connections: u64,
    pub max_connections: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatus {
    pub connection_id: String,
    pub base_path: String,
    pub state: String,
    pub exchanges: u64,
    pub open_secs: u64,
}

pub async fn get_status(State(connections): State<ConnectionTracker>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        active_connections: connections.active_count(),
        max_connections: connections.max_connections(),
    })
}

pub async fn get_sessions(State(connections): State<ConnectionTracker>) -> Json<Vec<SessionStatus>> {
    let sessions = connections
        .sessions()
        .into_iter()
        .map(|s| SessionStatus {
            connection_id: s.id.to_string(),
            base_path: s.base_path,
            state: s.state.as_str().to_string(),
            exchanges: s.exchanges,
            open_secs: s.opened_at.elapsed().as_secs(),
        })
        .collect();
    Json(sessions)
}
