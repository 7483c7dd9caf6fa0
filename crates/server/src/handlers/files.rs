//! Saved-file endpoints.

use crate::error::{ApiError, ApiResult};
use crate::handlers::common::authorize;
use crate::state::AppState;
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use gatehouse_core::Operation;
use gatehouse_core::wire::FileQuery;

/// Maximum accepted size of a saved file.
pub const MAX_FILE_SIZE: usize = 64 * 1024 * 1024;

/// Parse `?name=` after the role check has passed.
fn file_query(req: &Request) -> ApiResult<FileQuery> {
    let Query(query) = Query::<FileQuery>::try_from_uri(req.uri())
        .map_err(|e| ApiError::BadRequest(format!("invalid query: {e}")))?;
    if query.name.is_empty() {
        return Err(ApiError::BadRequest("file name must not be empty".to_string()));
    }
    Ok(query)
}

/// PUT /save-file?name=
pub async fn save_file(State(state): State<AppState>, req: Request) -> ApiResult<StatusCode> {
    let auth = authorize(&req, Operation::SaveFile)?;
    let query = file_query(&req)?;

    let data = axum::body::to_bytes(req.into_body(), MAX_FILE_SIZE)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;

    state
        .gateway
        .save_file(&auth.principal, &query.name, data)
        .await?;
    Ok(StatusCode::OK)
}

/// GET /load-file?name=
///
/// Answers 204 when no file of that name exists.
pub async fn load_file(State(state): State<AppState>, req: Request) -> ApiResult<Response> {
    let auth = authorize(&req, Operation::LoadFile)?;
    let query = file_query(&req)?;

    match state.gateway.load_file(&auth.principal, &query.name).await? {
        Some(data) => Ok((
            StatusCode::OK,
            [(CONTENT_TYPE, "application/octet-stream")],
            data,
        )
            .into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
