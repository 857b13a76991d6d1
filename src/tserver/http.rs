//! HTTP API for the tablet server

use crate::common::wire::{
    AckResponse, ChecksumRequest, ChecksumResponse, CreateReplicaRequest, PingResponse,
    ReplicaStatus, ReplicateRequest, SafeTimeRequest, WriteRequest, WriteResponse,
    TIMESTAMP_HEADER,
};
use crate::common::{Error, Result};
use crate::tserver::server::TabletServer;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(server: Arc<TabletServer>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/tablets", post(create_replica))
        .route("/tablets/:id/status", get(replica_status))
        .route("/tablets/:id/write", post(write))
        .route("/tablets/:id/replicate", post(replicate))
        .route("/tablets/:id/safe_time", post(safe_time))
        .route("/tablets/:id/checksum", post(checksum))
        .layer(middleware::from_fn_with_state(server.clone(), clock_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Refuse requests once the server is stopped; stamp every response with
/// the server clock so clients can track the latest observed timestamp.
async fn clock_middleware(
    State(server): State<Arc<TabletServer>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if server.is_stopped() {
        return Error::Unavailable {
            node: server.node_id().to_string(),
            reason: "tablet server is shutting down".into(),
        }
        .into_response();
    }

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&server.clock().now().to_string()) {
        response.headers_mut().insert(TIMESTAMP_HEADER, value);
    }
    response
}

async fn ping(State(server): State<Arc<TabletServer>>) -> Json<PingResponse> {
    Json(PingResponse {
        node_id: server.node_id().to_string(),
    })
}

async fn create_replica(
    State(server): State<Arc<TabletServer>>,
    Json(request): Json<CreateReplicaRequest>,
) -> Result<Json<AckResponse>> {
    server.create_replica(request)?;
    Ok(Json(AckResponse { ok: true }))
}

async fn replica_status(
    State(server): State<Arc<TabletServer>>,
    Path(tablet_id): Path<String>,
) -> Result<Json<ReplicaStatus>> {
    Ok(Json(server.replica_status(&tablet_id)?))
}

async fn write(
    State(server): State<Arc<TabletServer>>,
    Path(tablet_id): Path<String>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<WriteResponse>> {
    Ok(Json(server.write(&tablet_id, request).await?))
}

async fn replicate(
    State(server): State<Arc<TabletServer>>,
    Path(tablet_id): Path<String>,
    Json(request): Json<ReplicateRequest>,
) -> Result<Json<AckResponse>> {
    server.replicate(&tablet_id, request)?;
    Ok(Json(AckResponse { ok: true }))
}

async fn safe_time(
    State(server): State<Arc<TabletServer>>,
    Path(tablet_id): Path<String>,
    Json(request): Json<SafeTimeRequest>,
) -> Result<Json<AckResponse>> {
    server.update_safe_time(&tablet_id, request)?;
    Ok(Json(AckResponse { ok: true }))
}

async fn checksum(
    State(server): State<Arc<TabletServer>>,
    Path(tablet_id): Path<String>,
    Json(request): Json<ChecksumRequest>,
) -> Result<Json<ChecksumResponse>> {
    Ok(Json(server.checksum(&tablet_id, request).await?))
}
