//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{MethodRouter, get, post, put};
use gatehouse_core::Operation;
use tower_http::trace::TraceLayer;

/// Handler and method serving one gateway operation.
fn operation_route(operation: Operation) -> MethodRouter<AppState> {
    match operation {
        Operation::RegisterCategory => post(handlers::register_category),
        Operation::PrepareStatement => post(handlers::prepare_statement),
        Operation::QueryExecute => post(handlers::query_execute),
        Operation::WriteExecute => post(handlers::write_execute),
        Operation::SaveFile => put(handlers::save_file),
        Operation::LoadFile => get(handlers::load_file),
        Operation::Purge => post(handlers::purge),
        Operation::GenerateToken => post(handlers::generate_token),
        Operation::VerifyToken => post(handlers::verify_token),
    }
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Operation::ALL
        .into_iter()
        .fold(Router::new(), |router, operation| {
            router.route(operation.path(), operation_route(operation))
        })
        // Auth discovery
        .route("/v1/auth/whoami", get(handlers::whoami))
        // Health check (unauthenticated for load balancers)
        .route("/v1/health", get(handlers::health_check));

    // SECURITY: When enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Order of execution: TraceLayer -> Auth -> Handler
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
