//! Permission check middleware
//!
//! `require_permissions` builds a guard for one route group. The guard runs
//! after [`auth_middleware`](super::middleware::auth_middleware) and decides
//! from the authenticated user's role and explicit grants alone; it performs
//! no I/O.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::debug;

use super::common::ApiResponse;
use super::middleware::{unauthorized, AuthenticatedUser};
use crate::domain::{
    AccessDecision, CombineMode, DomainResult, PermissionRegistry, PermissionRequirement,
    PermissionSet,
};

/// Resolved permissions of the current user, attached on allow
#[derive(Clone, Debug)]
pub struct EffectivePermissions(pub PermissionSet);

/// Per-route permission check, installed with `route_layer`
#[derive(Clone)]
pub struct PermissionGuard {
    registry: PermissionRegistry,
    requirement: Arc<PermissionRequirement>,
}

/// Build a guard requiring `names` combined with `mode`.
///
/// ```ignore
/// let guard = require_permissions(&registry, [MANAGE_BRANCHES], CombineMode::All)?;
/// Router::new()
///     .route("/api/v1/branches", get(list_branches))
///     .route_layer(middleware::from_fn_with_state(guard, enforce_permissions))
///     .route_layer(middleware::from_fn_with_state(auth, auth_middleware));
/// ```
pub fn require_permissions<I, S>(
    registry: &PermissionRegistry,
    names: I,
    mode: CombineMode,
) -> DomainResult<PermissionGuard>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Ok(PermissionGuard {
        registry: registry.clone(),
        requirement: Arc::new(PermissionRequirement::new(names, mode)?),
    })
}

/// Allow or reject the request according to the guard.
pub async fn enforce_permissions(
    State(guard): State<PermissionGuard>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(user) = request.extensions().get::<AuthenticatedUser>() else {
        return unauthorized("Authentication required");
    };

    match guard.registry.decide(user, &guard.requirement) {
        AccessDecision::Allow(effective) => {
            request
                .extensions_mut()
                .insert(EffectivePermissions(effective));
            next.run(request).await
        }
        AccessDecision::Deny => {
            debug!(
                user_id = %user.user_id,
                role = %user.role,
                required = ?guard.requirement.names(),
                mode = %guard.requirement.mode(),
                path = %request.uri().path(),
                "Permission denied"
            );
            metrics::counter!("permission_denials_total").increment(1);
            (
                StatusCode::FORBIDDEN,
                Json(ApiResponse::<()>::error("Insufficient permissions")),
            )
                .into_response()
        }
    }
}
