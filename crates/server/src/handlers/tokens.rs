//! Command-channel delegation token endpoints.

use crate::auth::get_trace_id;
use crate::error::{ApiError, ApiResult};
use crate::handlers::common::{authorize, decode_base64, encode_base64, read_json};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use gatehouse_core::Operation;
use gatehouse_core::wire::{GenerateTokenRequest, GenerateTokenResponse, VerifyTokenRequest};

/// POST /generate-token
pub async fn generate_token(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<GenerateTokenResponse>> {
    let auth = authorize(&req, Operation::GenerateToken)?;
    let body: GenerateTokenRequest = read_json(req).await?;
    let client_token = decode_base64("clientToken", &body.client_token)?;

    let token = state
        .gateway
        .generate_token(&auth.principal, &client_token, &body.action_name)?;
    metrics::TOKENS_ISSUED.inc();

    Ok(Json(GenerateTokenResponse {
        token: encode_base64(&token),
    }))
}

/// POST /verify-token
///
/// Every failure (unknown, mismatched, expired) answers the same 403.
pub async fn verify_token(State(state): State<AppState>, req: Request) -> ApiResult<StatusCode> {
    let auth = authorize(&req, Operation::VerifyToken)?;
    let trace_id = get_trace_id(&req).cloned().unwrap_or_default();
    let body: VerifyTokenRequest = read_json(req).await?;
    let client_token = decode_base64("clientToken", &body.client_token)?;
    let token = decode_base64("token", &body.token)?;

    let verified = state
        .gateway
        .verify_token(&client_token, &body.action_name, &token);
    metrics::record_token_verification(verified);

    if verified {
        Ok(StatusCode::OK)
    } else {
        tracing::warn!(
            trace_id = %trace_id,
            principal = %auth.name(),
            action = %body.action_name,
            "delegation token rejected"
        );
        Err(ApiError::Forbidden("token verification failed".to_string()))
    }
}
