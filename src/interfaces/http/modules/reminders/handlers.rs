//! Reminder API handlers, guarded by `send_reminders`

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::application::{ReminderRun, ReminderService};
use crate::interfaces::http::common::{api_error, domain_error, ApiError, ApiResponse};
use crate::interfaces::http::middleware::AuthenticatedUser;

#[derive(Clone)]
pub struct ReminderHandlerState {
    /// `None` while no mail provider is configured
    pub reminders: Option<Arc<ReminderService>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReminderRunDto {
    /// Students in the window without a previous reminder
    pub candidates: usize,
    pub sent: usize,
    pub failed: usize,
}

impl From<ReminderRun> for ReminderRunDto {
    fn from(run: ReminderRun) -> Self {
        Self {
            candidates: run.candidates,
            sent: run.sent,
            failed: run.failed,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/reminders/run",
    tag = "Reminders",
    security(("session" = [])),
    responses(
        (status = 200, description = "Reminder run finished", body = ApiResponse<ReminderRunDto>),
        (status = 403, description = "Missing send_reminders"),
        (status = 503, description = "No mail provider configured")
    )
)]
pub async fn run_reminders(
    State(state): State<ReminderHandlerState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<ReminderRunDto>>, ApiError> {
    let Some(reminders) = state.reminders else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Reminders are not configured: set reminders.provider_url",
        ));
    };

    info!(user_id = %user.user_id, "Manual reminder run requested");
    let run = reminders
        .run_once(Utc::now().date_naive())
        .await
        .map_err(domain_error)?;
    Ok(Json(ApiResponse::success(ReminderRunDto::from(run))))
}
