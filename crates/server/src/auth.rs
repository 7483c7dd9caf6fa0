//! Authentication and authorization middleware.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use gatehouse_core::config::AuthConfig;
use gatehouse_core::{Principal, Role};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum length for trace IDs.
/// Longer trace IDs are truncated to prevent log bloat and potential log injection.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new random trace ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a trace ID from a client-provided value.
    /// The value is truncated to MAX_TRACE_ID_LEN characters and non-printable characters removed.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configured principals, keyed by the SHA-256 hex of their bearer token.
#[derive(Clone, Debug, Default)]
pub struct PrincipalDirectory {
    by_hash: HashMap<String, Arc<Principal>>,
}

impl PrincipalDirectory {
    /// Build the directory from configuration.
    ///
    /// Role strings are expected to have passed [`AuthConfig::validate`].
    pub fn from_config(config: &AuthConfig) -> ApiResult<Self> {
        let mut by_hash = HashMap::new();
        for user in &config.users {
            let roles = user
                .roles
                .iter()
                .map(|r| Role::parse(r))
                .collect::<Result<Vec<_>, _>>()?;
            by_hash.insert(
                user.token_hash.to_ascii_lowercase(),
                Arc::new(Principal::new(user.name.clone(), roles)),
            );
        }
        Ok(Self { by_hash })
    }

    /// Look up the principal a raw bearer token belongs to.
    pub fn authenticate(&self, token: &str) -> Option<Arc<Principal>> {
        self.by_hash.get(&hash_token(token)).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

/// Authenticated request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedPrincipal {
    pub principal: Arc<Principal>,
}

impl AuthenticatedPrincipal {
    pub fn name(&self) -> &str {
        &self.principal.name
    }

    /// Require a role, returning an error if not held.
    pub fn require_role(&self, role: &Role) -> ApiResult<()> {
        if self.principal.has_role(role) {
            Ok(())
        } else {
            tracing::warn!(principal = %self.principal.name, role = %role, "missing required role");
            Err(ApiError::Forbidden(format!("missing required role: {role}")))
        }
    }
}

/// Extract bearer token from Authorization header.
/// Per RFC 6750, the "Bearer" scheme is case-insensitive.
fn extract_bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(&v[7..])
            } else {
                None
            }
        })
}

/// Extract trace ID from X-Trace-Id header or generate a new one.
fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_else(TraceId::new)
}

/// Hash a token for directory lookup.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Authentication middleware that resolves the principal and sets up trace context.
///
/// Unknown tokens are not rejected here; handlers decide via [`require_auth`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let trace_id_str = trace_id.0.clone();
    req.extensions_mut().insert(trace_id);

    let principal = extract_bearer_token(&req).and_then(|token| state.principals.authenticate(token));
    let principal_name = principal
        .as_ref()
        .map_or_else(String::new, |p| p.name.clone());
    if let Some(principal) = principal {
        req.extensions_mut()
            .insert(AuthenticatedPrincipal { principal });
    }

    let response = next
        .run(req)
        .instrument(tracing::info_span!(
            "request",
            trace_id = %trace_id_str,
            principal = %principal_name
        ))
        .await;

    Ok(response)
}

/// Require authentication (a known principal must be present).
pub fn require_auth(req: &Request) -> ApiResult<&AuthenticatedPrincipal> {
    req.extensions()
        .get::<AuthenticatedPrincipal>()
        .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
}

/// Get the trace ID from request extensions.
pub fn get_trace_id(req: &Request) -> Option<&TraceId> {
    req.extensions().get::<TraceId>()
}
