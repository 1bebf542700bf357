//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::application::{PhotoService, ReminderService, UserService};
use crate::domain::names::*;
use crate::domain::{CombineMode, DomainResult, PermissionRegistry, RepositoryProvider};
use crate::interfaces::http::common::{ApiResponse, EmptyData, PaginatedResponse};
use crate::interfaces::http::cookies::SessionCookies;
use crate::interfaces::http::middleware::{auth_middleware, AuthState};
use crate::interfaces::http::permissions::{
    enforce_permissions, require_permissions, PermissionGuard,
};

use super::modules::{
    auth, branches, health, metrics, reminders, request_id::request_id_middleware, students,
    users,
};

/// Everything the HTTP layer needs from the running service
#[derive(Clone)]
pub struct ApiContext {
    pub db: DatabaseConnection,
    pub repos: Arc<dyn RepositoryProvider>,
    pub users: Arc<UserService>,
    /// `None` while no mail provider is configured
    pub reminders: Option<Arc<ReminderService>>,
    /// `None` while no image host is configured
    pub photos: Option<Arc<PhotoService>>,
    pub registry: PermissionRegistry,
    pub cookies: SessionCookies,
    /// Default window of the expiry report, in days
    pub report_window_days: i64,
    pub prometheus: Option<PrometheusHandle>,
}

/// Room for multipart framing around the largest accepted photo
const MULTIPART_OVERHEAD: usize = 16 * 1024;

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Session token from /api/v1/auth/login, as bearer token or session cookie",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::logout,
        auth::get_current_user,
        auth::change_password,
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        branches::list_branches,
        branches::get_branch,
        branches::create_branch,
        branches::update_branch,
        branches::delete_branch,
        students::list_students,
        students::get_student,
        students::create_student,
        students::update_student,
        students::delete_student,
        students::expiring_students,
        students::upload_student_photo,
        reminders::run_reminders,
    ),
    components(
        schemas(
            ApiResponse<String>,
            EmptyData,
            PaginatedResponse<users::UserDto>,
            PaginatedResponse<branches::BranchDto>,
            PaginatedResponse<students::StudentDto>,
            health::HealthResponse,
            health::ComponentHealth,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::UserInfo,
            auth::ChangePasswordRequest,
            users::UserDto,
            users::CreateUserRequest,
            users::UpdateUserRequest,
            branches::BranchDto,
            branches::CreateBranchRequest,
            branches::UpdateBranchRequest,
            students::StudentDto,
            students::CreateStudentRequest,
            students::UpdateStudentRequest,
            students::ExpiringStudentDto,
            students::PhotoUploadForm,
            reminders::ReminderRunDto,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Authentication", description = "Login, logout, current user and password change"),
        (name = "Users", description = "Staff accounts, roles and explicit permission grants"),
        (name = "Branches", description = "Library branches"),
        (name = "Students", description = "Reading-room memberships, photos and expiry report"),
        (name = "Reminders", description = "Membership expiry reminders"),
    ),
    info(
        title = "Library Service API",
        version = "1.0.0",
        description = "REST API for library branches, student memberships and staff accounts",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Session authentication, then the permission guard when one is given.
fn protect(router: Router, guard: Option<PermissionGuard>, auth: &AuthState) -> Router {
    let router = match guard {
        Some(guard) => {
            router.route_layer(middleware::from_fn_with_state(guard, enforce_permissions))
        }
        None => router,
    };
    router.route_layer(middleware::from_fn_with_state(
        auth.clone(),
        auth_middleware,
    ))
}

/// Create the API router with all routes
pub fn create_api_router(ctx: ApiContext) -> DomainResult<Router> {
    let auth_state = AuthState {
        users: ctx.users.clone(),
        cookies: ctx.cookies.clone(),
    };
    let registry = &ctx.registry;

    let users_guard = require_permissions(registry, [MANAGE_USERS], CombineMode::All)?;
    let branches_guard = require_permissions(registry, [MANAGE_BRANCHES], CombineMode::All)?;
    let students_guard = require_permissions(
        registry,
        [MANAGE_LIBRARY_STUDENTS, MANAGE_BRANCHES],
        CombineMode::Any,
    )?;
    let reports_guard = require_permissions(registry, [VIEW_REPORTS], CombineMode::All)?;
    let reminders_guard = require_permissions(registry, [SEND_REMINDERS], CombineMode::All)?;

    // ── Auth ───────────────────────────────────────────────────
    let auth_handlers = auth::AuthHandlerState {
        users: ctx.users.clone(),
        registry: ctx.registry.clone(),
        cookies: ctx.cookies.clone(),
    };

    let auth_public = Router::new()
        .route("/api/v1/auth/login", post(auth::login))
        .with_state(auth_handlers.clone());

    let auth_protected = protect(
        Router::new()
            .route("/api/v1/auth/logout", post(auth::logout))
            .route("/api/v1/auth/me", get(auth::get_current_user))
            .route("/api/v1/auth/change-password", put(auth::change_password))
            .with_state(auth_handlers),
        None,
        &auth_state,
    );

    // ── Users ──────────────────────────────────────────────────
    let user_routes = protect(
        Router::new()
            .route(
                "/api/v1/users",
                get(users::list_users).post(users::create_user),
            )
            .route(
                "/api/v1/users/{id}",
                get(users::get_user)
                    .put(users::update_user)
                    .delete(users::delete_user),
            )
            .with_state(users::UserHandlerState {
                user_service: ctx.users.clone(),
            }),
        Some(users_guard),
        &auth_state,
    );

    // ── Branches ───────────────────────────────────────────────
    let branch_routes = protect(
        Router::new()
            .route(
                "/api/v1/branches",
                get(branches::list_branches).post(branches::create_branch),
            )
            .route(
                "/api/v1/branches/{id}",
                get(branches::get_branch)
                    .put(branches::update_branch)
                    .delete(branches::delete_branch),
            )
            .with_state(branches::BranchHandlerState {
                repos: ctx.repos.clone(),
            }),
        Some(branches_guard),
        &auth_state,
    );

    // ── Students ───────────────────────────────────────────────
    let student_state = students::StudentHandlerState {
        repos: ctx.repos.clone(),
        default_window_days: ctx.report_window_days,
    };

    let upload_limit = ctx
        .photos
        .as_ref()
        .map_or(MULTIPART_OVERHEAD, |p| p.max_bytes() + MULTIPART_OVERHEAD);
    let photo_routes = Router::new()
        .route(
            "/api/v1/students/{id}/photo",
            post(students::upload_student_photo).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(students::PhotoHandlerState {
            photos: ctx.photos.clone(),
        });

    let student_routes = protect(
        Router::new()
            .route(
                "/api/v1/students",
                get(students::list_students).post(students::create_student),
            )
            .route(
                "/api/v1/students/{id}",
                get(students::get_student)
                    .put(students::update_student)
                    .delete(students::delete_student),
            )
            .with_state(student_state.clone())
            .merge(photo_routes),
        Some(students_guard),
        &auth_state,
    );

    let report_routes = protect(
        Router::new()
            .route("/api/v1/students/expiring", get(students::expiring_students))
            .with_state(student_state),
        Some(reports_guard),
        &auth_state,
    );

    // ── Reminders ──────────────────────────────────────────────
    let reminder_routes = protect(
        Router::new()
            .route("/api/v1/reminders/run", post(reminders::run_reminders))
            .with_state(reminders::ReminderHandlerState {
                reminders: ctx.reminders.clone(),
            }),
        Some(reminders_guard),
        &auth_state,
    );

    // ── Public ─────────────────────────────────────────────────
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .with_state(health::HealthState {
            db: ctx.db.clone(),
            started_at: Arc::new(Instant::now()),
        });

    let mut router = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(health_routes)
        .merge(auth_public)
        .merge(auth_protected)
        .merge(user_routes)
        .merge(branch_routes)
        .merge(student_routes)
        .merge(report_routes)
        .merge(reminder_routes);

    if let Some(handle) = ctx.prometheus {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics::prometheus_metrics))
                .with_state(metrics::MetricsState { handle }),
        );
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(router
        .layer(middleware::from_fn(metrics::http_metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
