//! Node HTTP server.
//!
//! Two route families share one listener:
//!
//! | Route | Served by |
//! |---|---|
//! | `GET/PUT/DELETE /{key}` | the coordinator (quorum operations) |
//! | `GET/PUT/DELETE /internal/{key}` | the local store directly |
//! | `GET /internal/digest` | the local store's Merkle root |
//! | `GET /internal/health` | node id and key count |
//!
//! Every client key is addressable. On the peer side the static
//! `/internal/digest` and `/internal/health` routes take precedence, so keys
//! literally named `digest` or `health` cannot be replicated over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use replication::{Coordinator, Entry};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{TransportError, TransportResult};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

/// Build the node's router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/internal/digest", get(internal_digest))
        .route("/internal/health", get(health))
        .route(
            "/internal/{key}",
            get(internal_read).put(internal_write).delete(internal_delete),
        )
        .route("/{key}", get(client_get).put(client_set).delete(client_delete))
        .with_state(state)
}

// ============================================================================
// Client routes
// ============================================================================

#[derive(Debug, Deserialize)]
struct SetRequest {
    value: String,
}

/// 200 with the value, 404 when absent or when the read quorum failed.
async fn client_get(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.coordinator.get(&key).await {
        Ok(Some(entry)) => (StatusCode::OK, entry.value).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            debug!(key = %key, error = %e, "read answered as not found");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn client_set(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<SetRequest>,
) -> Response {
    match state.coordinator.set(&key, request.value).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Always 204: deletes are best effort.
async fn client_delete(State(state): State<AppState>, Path(key): Path<String>) -> StatusCode {
    let acks = state.coordinator.delete(&key).await;
    if acks == 0 {
        warn!(key = %key, "delete reached no replica");
    }
    StatusCode::NO_CONTENT
}

// ============================================================================
// Peer routes
// ============================================================================

async fn internal_read(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.coordinator.store().get(&key) {
        Some(entry) => Json(entry).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn internal_write(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(entry): Json<Entry>,
) -> StatusCode {
    state.coordinator.store().put(key, entry);
    StatusCode::NO_CONTENT
}

async fn internal_delete(State(state): State<AppState>, Path(key): Path<String>) -> StatusCode {
    state.coordinator.store().delete(&key);
    StatusCode::NO_CONTENT
}

async fn internal_digest(State(state): State<AppState>) -> String {
    state.coordinator.store().digest().to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Health {
    pub node_id: String,
    pub keys: usize,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        node_id: state.coordinator.local_id().to_string(),
        keys: state.coordinator.store().len(),
    })
}

// ============================================================================
// Server
// ============================================================================

/// A bound, not yet running, node server.
///
/// Binding comes first so a node can learn its ephemeral port before the
/// cluster's endpoints (and therefore its coordinator) are known.
pub struct NodeServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl NodeServer {
    /// Bind `addr`. Port 0 picks an ephemeral port; see [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &str) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` is cancelled, then drain in-flight requests.
    pub async fn serve(
        self,
        coordinator: Arc<Coordinator>,
        shutdown: CancellationToken,
    ) -> TransportResult<()> {
        let node = coordinator.local_id().clone();
        info!(node = %node, addr = %self.local_addr, "node listening");

        let app = router(AppState::new(coordinator));
        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!(node = %node, "node stopped");
        Ok(())
    }
}
