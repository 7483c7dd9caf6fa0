//! Category registration and prepared-statement endpoints.

use crate::auth::{TraceId, get_trace_id};
use crate::error::ApiResult;
use crate::handlers::common::{authorize, read_json};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Request, State};
use gatehouse_core::Operation;
use gatehouse_core::wire::{
    DESCRIPTOR_PARSE_FAILED, ExecuteRequest, ILLEGAL_STATEMENT, PrepareStatementRequest,
    PrepareStatementResponse, QueryResponse, RegisterCategoryRequest, RegisterCategoryResponse,
    WriteResponse, response_code,
};
use gatehouse_engine::EngineError;
use std::time::Instant;

/// Wire code for an execution the engine refused before touching storage.
/// `None` means the error is not a protocol outcome.
fn execution_failure_code(err: &EngineError, trace_id: &TraceId) -> Option<i32> {
    let code = match err {
        EngineError::UnknownStatement(_) => response_code::UNKNOWN_STATEMENT,
        EngineError::IllegalPatch(_) => {
            metrics::ILLEGAL_PATCHES.inc();
            response_code::ILLEGAL_PATCH
        }
        EngineError::WrongStatementKind { .. } => response_code::ILLEGAL_PATCH,
        _ => return None,
    };
    tracing::warn!(trace_id = %trace_id, error = %err, code, "execution refused");
    Some(code)
}

/// POST /register-category
pub async fn register_category(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<RegisterCategoryResponse>> {
    authorize(&req, Operation::RegisterCategory)?;
    let body: RegisterCategoryRequest = read_json(req).await?;

    let registered = state
        .gateway
        .register_category(&body.name, body.data_type, body.category)
        .await?;
    metrics::record_category_registration(registered.cached);

    Ok(Json(RegisterCategoryResponse {
        category_id: registered.id,
    }))
}

/// POST /prepare-statement
///
/// Rejections are answered in the body with a negative `statementId`.
pub async fn prepare_statement(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<PrepareStatementResponse>> {
    authorize(&req, Operation::PrepareStatement)?;
    let body: PrepareStatementRequest = read_json(req).await?;

    let response = match state.gateway.prepare(body.category_id, &body.descriptor) {
        Ok(prepared) => {
            if prepared.cached {
                metrics::STATEMENT_CACHE_HITS.inc();
            } else {
                metrics::STATEMENTS_PREPARED.inc();
            }
            PrepareStatementResponse::prepared(prepared.id, prepared.free_param_count)
        }
        Err(EngineError::UnknownCategoryId(_) | EngineError::UntrustedDescriptor) => {
            metrics::record_rejected_statement("illegal_statement");
            PrepareStatementResponse::rejected(ILLEGAL_STATEMENT)
        }
        Err(EngineError::ParseFailed(_)) => {
            metrics::record_rejected_statement("parse_failed");
            PrepareStatementResponse::rejected(DESCRIPTOR_PARSE_FAILED)
        }
        Err(other) => return Err(other.into()),
    };

    Ok(Json(response))
}

/// POST /query-execute
pub async fn query_execute(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<QueryResponse>> {
    let auth = authorize(&req, Operation::QueryExecute)?;
    let trace_id = get_trace_id(&req).cloned().unwrap_or_default();
    let body: ExecuteRequest = read_json(req).await?;
    let start = Instant::now();

    let result = state
        .gateway
        .query(&auth.principal, body.statement_id, &body.params)
        .await;

    let response = match result {
        Ok(output) => {
            metrics::record_execution(output.kind.keyword());
            metrics::record_filter_decision(output.filter_outcome);
            QueryResponse::success(output.records)
        }
        Err(err) => match execution_failure_code(&err, &trace_id) {
            Some(code) => QueryResponse::failure(code),
            None => return Err(err.into()),
        },
    };

    metrics::EXECUTION_DURATION
        .with_label_values(&[Operation::QueryExecute.name()])
        .observe(start.elapsed().as_secs_f64());
    Ok(Json(response))
}

/// POST /write-execute
pub async fn write_execute(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<WriteResponse>> {
    authorize(&req, Operation::WriteExecute)?;
    let trace_id = get_trace_id(&req).cloned().unwrap_or_default();
    let body: ExecuteRequest = read_json(req).await?;
    let start = Instant::now();

    let response = match state.gateway.write(body.statement_id, &body.params).await {
        Ok(output) => {
            metrics::record_execution(output.kind.keyword());
            WriteResponse::success(output.count)
        }
        Err(err) => match execution_failure_code(&err, &trace_id) {
            Some(code) => WriteResponse::failure(code),
            None => return Err(err.into()),
        },
    };

    metrics::EXECUTION_DURATION
        .with_label_values(&[Operation::WriteExecute.name()])
        .observe(start.elapsed().as_secs_f64());
    Ok(Json(response))
}
