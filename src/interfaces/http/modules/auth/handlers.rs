//! Authentication API handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use axum_extra::extract::cookie::CookieJar;

use super::dto::{ChangePasswordRequest, LoginRequest, LoginResponse, UserInfo};
use crate::application::UserService;
use crate::domain::{PermissionRegistry, User};
use crate::interfaces::http::common::{
    api_error, domain_error, ApiError, ApiResponse, EmptyData, ValidatedJson,
};
use crate::interfaces::http::cookies::SessionCookies;
use crate::interfaces::http::middleware::{AuthenticatedUser, SessionToken};

#[derive(Clone)]
pub struct AuthHandlerState {
    pub users: Arc<UserService>,
    pub registry: PermissionRegistry,
    pub cookies: SessionCookies,
}

impl AuthHandlerState {
    fn user_info(&self, user: User) -> UserInfo {
        let mut permissions: Vec<String> = self
            .registry
            .resolve(&user)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        permissions.sort();

        UserInfo {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            permissions,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Successful login", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AuthHandlerState>,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResponse>>), ApiError> {
    let result = state
        .users
        .login(&request.username, &request.password)
        .await
        .map_err(domain_error)?;

    let max_age = state.users.session_ttl().num_seconds();
    let jar = jar.add(state.cookies.issue(&result.token, max_age));

    let response = LoginResponse {
        token: result.token,
        token_type: "Bearer".to_string(),
        expires_at: result.expires_at,
        user: state.user_info(result.user),
    };

    Ok((jar, Json(ApiResponse::success(response))))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "Authentication",
    security(("session" = [])),
    responses(
        (status = 200, description = "Session closed"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout(
    State(state): State<AuthHandlerState>,
    jar: CookieJar,
    Extension(SessionToken(token)): Extension<SessionToken>,
) -> Result<(CookieJar, Json<ApiResponse<EmptyData>>), ApiError> {
    state.users.logout(&token).await.map_err(domain_error)?;

    // `remove` only emits a removal for cookies the request carried
    let jar = jar.add(state.cookies.clear());
    Ok((jar, Json(ApiResponse::success(EmptyData {}))))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Authentication",
    security(("session" = [])),
    responses(
        (status = 200, description = "Current user with effective permissions", body = ApiResponse<UserInfo>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_current_user(
    State(state): State<AuthHandlerState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let user = state
        .users
        .get_user(&user.user_id)
        .await
        .map_err(domain_error)?;
    Ok(Json(ApiResponse::success(state.user_info(user))))
}

#[utoipa::path(
    put,
    path = "/api/v1/auth/change-password",
    tag = "Authentication",
    security(("session" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Invalid current password"),
        (status = 422, description = "New password too short")
    )
)]
pub async fn change_password(
    State(state): State<AuthHandlerState>,
    Extension(user): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<EmptyData>>, ApiError> {
    if request.current_password == request.new_password {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "New password must differ from the current one",
        ));
    }

    state
        .users
        .change_password(&user.user_id, &request.current_password, &request.new_password)
        .await
        .map_err(domain_error)?;

    Ok(Json(ApiResponse::success(EmptyData {})))
}
