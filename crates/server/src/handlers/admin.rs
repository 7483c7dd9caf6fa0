//! Administrative endpoints: health and agent purge.

use crate::error::ApiResult;
use crate::handlers::common::{authorize, read_json};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use gatehouse_core::Operation;
use gatehouse_core::wire::{PurgeRequest, PurgeResponse};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /v1/health - Health check endpoint.
///
/// This endpoint is intentionally unauthenticated to support load balancer
/// and orchestrator health checks. Returns only status and version.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.gateway.storage().health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /purge - Remove every record belonging to an agent.
pub async fn purge(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<PurgeResponse>> {
    let auth = authorize(&req, Operation::Purge)?;
    let body: PurgeRequest = read_json(req).await?;

    let removed = state.gateway.purge(&body.agent_id).await?;
    tracing::info!(principal = %auth.name(), agent_id = %body.agent_id, removed, "purge requested");

    Ok(Json(PurgeResponse {
        agent_id: body.agent_id,
        removed,
    }))
}
