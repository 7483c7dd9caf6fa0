//! HTTP dispatcher for the Gatehouse storage gateway.
//!
//! This crate maps the fixed operation set onto HTTP:
//! - Category registration and statement preparation
//! - Query and write execution with per-principal filtering
//! - Saved files
//! - Agent purge
//! - Command-channel delegation tokens

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::{PrincipalDirectory, TraceId};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
