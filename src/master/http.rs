//! HTTP API for the master

use crate::common::http::RpcClient;
use crate::common::utils::http_url;
use crate::common::wire::{
    AckResponse, CreateReplicaRequest, CreateTableRequest, CreateTableResponse, HeartbeatRequest,
    PingResponse, TableDescriptor, TabletDescriptor, TabletServerDescriptor,
};
use crate::common::Result;
use crate::master::catalog::Catalog;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::future::try_join_all;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

/// Shared master state for HTTP handlers
#[derive(Clone)]
pub struct MasterState {
    pub catalog: Arc<Catalog>,
    pub rpc: RpcClient,
    /// Serializes table creation so placement sees committed load
    pub create_lock: Arc<tokio::sync::Mutex<()>>,
}

pub fn create_router(state: MasterState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/tables", get(list_tables).post(create_table))
        .route("/tables/:name/tablets", get(list_tablets))
        .route("/tablet-servers", get(list_tablet_servers))
        .route("/heartbeat", post(heartbeat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        node_id: "master".to_string(),
    })
}

async fn list_tables(State(state): State<MasterState>) -> Result<Json<Vec<TableDescriptor>>> {
    Ok(Json(state.catalog.list_tables()?))
}

async fn list_tablets(
    State(state): State<MasterState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<TabletDescriptor>>> {
    Ok(Json(state.catalog.list_tablets(&name)?))
}

async fn list_tablet_servers(
    State(state): State<MasterState>,
) -> Result<Json<Vec<TabletServerDescriptor>>> {
    Ok(Json(state.catalog.list_tablet_servers()?))
}

async fn heartbeat(
    State(state): State<MasterState>,
    Json(request): Json<HeartbeatRequest>,
) -> Result<Json<AckResponse>> {
    state.catalog.heartbeat(request)?;
    Ok(Json(AckResponse { ok: true }))
}

/// Place the tablets, create every replica on its tablet server, then
/// commit the table to the catalog.
async fn create_table(
    State(state): State<MasterState>,
    Json(request): Json<CreateTableRequest>,
) -> Result<Json<CreateTableResponse>> {
    let _guard = state.create_lock.lock().await;
    let plan = state.catalog.plan_table(&request)?;

    let mut creates = Vec::new();
    for tablet in &plan.tablets {
        for peer in &tablet.peers {
            let body = CreateReplicaRequest {
                tablet_id: tablet.tablet_id.clone(),
                table_name: plan.table.name.clone(),
                schema: plan.table.schema.clone(),
                key_range: tablet.key_range,
                peers: tablet.peers.clone(),
                leader: tablet.leader.clone(),
            };
            let rpc = state.rpc.clone();
            let node = peer.node_id.clone();
            let url = format!("{}/tablets", http_url(&peer.address));
            creates.push(async move {
                let _: AckResponse = rpc.post(&node, &url, &body).await?;
                Ok::<_, crate::Error>(())
            });
        }
    }
    if let Err(e) = try_join_all(creates).await {
        warn!("Creating table {} failed: {}", plan.table.name, e);
        return Err(e);
    }

    state.catalog.commit_table(&plan)?;
    let tablets = state.catalog.list_tablets(&plan.table.name)?;
    Ok(Json(CreateTableResponse {
        table: plan.table,
        tablets,
    }))
}
