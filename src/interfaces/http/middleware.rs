//! Session authentication middleware for Axum

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use super::cookies::SessionCookies;
use crate::application::UserService;
use crate::domain::{DomainError, PermissionSubject, User};
use crate::interfaces::http::common::{domain_error, ApiResponse};

/// State shared by the authentication middleware
#[derive(Clone)]
pub struct AuthState {
    pub users: Arc<UserService>,
    pub cookies: SessionCookies,
}

/// User bound to the current request, loaded fresh from the users table
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub username: String,
    pub role: String,
    pub permissions: Option<Vec<String>>,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            role: user.role,
            permissions: user.permissions,
        }
    }
}

impl PermissionSubject for AuthenticatedUser {
    fn role(&self) -> &str {
        &self.role
    }

    fn permission_overrides(&self) -> Option<&[String]> {
        self.permissions.as_deref()
    }
}

/// Raw session token of the current request, kept for logout
#[derive(Clone, Debug)]
pub struct SessionToken(pub String);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Session token from `Authorization: Bearer` or the session cookie
pub fn extract_session_token(headers: &HeaderMap, cookies: &SessionCookies) -> Option<String> {
    match bearer_token(headers) {
        Some(token) => Some(token.to_string()),
        None => cookies.token(&CookieJar::from_headers(headers)),
    }
}

/// Session authentication middleware
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_session_token(request.headers(), &state.cookies) else {
        return unauthorized("Missing session token");
    };

    match state.users.authenticate(&token).await {
        Ok(user) => {
            let user = AuthenticatedUser::from(user);
            debug!(user_id = %user.user_id, role = %user.role, "Session authenticated");
            request.extensions_mut().insert(user);
            request.extensions_mut().insert(SessionToken(token));
            next.run(request).await
        }
        Err(DomainError::Unauthorized(message)) => unauthorized(&message),
        Err(e) => domain_error(e).into_response(),
    }
}

pub(crate) fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiResponse::<()>::error(message)),
    )
        .into_response()
}
