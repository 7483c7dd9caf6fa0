//! Authentication-related endpoints.

use crate::auth::require_auth;
use crate::error::ApiResult;
use axum::Json;
use axum::extract::Request;
use gatehouse_core::wire::WhoamiResponse;

/// GET /v1/auth/whoami - Return the caller's principal and roles.
pub async fn whoami(req: Request) -> ApiResult<Json<WhoamiResponse>> {
    let auth = require_auth(&req)?;

    Ok(Json(WhoamiResponse {
        name: auth.principal.name.clone(),
        roles: auth.principal.role_names(),
    }))
}
