//! Shared handler helpers.

use crate::auth::{AuthenticatedPrincipal, require_auth};
use crate::error::{ApiError, ApiResult};
use axum::extract::Request;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use gatehouse_core::Operation;
use serde::de::DeserializeOwned;

/// Maximum accepted size of a JSON request body.
pub const MAX_JSON_BODY_SIZE: usize = 1024 * 1024;

/// Authenticate the caller and check the role `operation` requires.
///
/// Runs before any other work a handler does.
pub fn authorize(req: &Request, operation: Operation) -> ApiResult<AuthenticatedPrincipal> {
    let auth = require_auth(req)?.clone();
    auth.require_role(&operation.required_role())?;
    Ok(auth)
}

/// Read and parse a JSON body.
pub async fn read_json<T: DeserializeOwned>(req: Request) -> ApiResult<T> {
    let bytes = axum::body::to_bytes(req.into_body(), MAX_JSON_BODY_SIZE)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))
}

/// Decode a standard base64 field.
pub fn decode_base64(field: &str, value: &str) -> ApiResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| ApiError::BadRequest(format!("{field} is not valid base64: {e}")))
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
