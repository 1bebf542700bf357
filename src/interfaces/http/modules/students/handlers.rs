//! Student API handlers
//!
//! CRUD needs `manage_library_students` or `manage_branches`; the expiry
//! report needs `view_reports`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;

use super::dto::{
    CreateStudentRequest, ExpiringParams, ExpiringStudentDto, ListStudentsParams, StudentDto,
    UpdateStudentRequest,
};
use crate::domain::{DomainError, RepositoryProvider, Student, StudentFilter};
use crate::interfaces::http::common::{
    api_error, domain_error, ApiError, ApiResponse, EmptyData, PaginatedResponse, ValidatedJson,
};
use crate::shared::PageRequest;

/// Longest window the expiry report accepts
const MAX_REPORT_DAYS: i64 = 365;

#[derive(Clone)]
pub struct StudentHandlerState {
    pub repos: Arc<dyn RepositoryProvider>,
    pub default_window_days: i64,
}

fn student_not_found(id: i32) -> ApiError {
    domain_error(DomainError::not_found("Student", "id", id))
}

#[utoipa::path(
    get,
    path = "/api/v1/students",
    tag = "Students",
    security(("session" = [])),
    params(ListStudentsParams),
    responses(
        (status = 200, description = "Student list", body = ApiResponse<PaginatedResponse<StudentDto>>),
        (status = 403, description = "Missing manage_library_students and manage_branches")
    )
)]
pub async fn list_students(
    State(state): State<StudentHandlerState>,
    Query(params): Query<ListStudentsParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<StudentDto>>>, ApiError> {
    let filter = StudentFilter {
        branch_id: params.branch_id,
        search: params.search,
    };
    let result = state
        .repos
        .students()
        .list(filter, PageRequest::new(params.page, params.limit))
        .await
        .map_err(domain_error)?;
    Ok(Json(ApiResponse::success(PaginatedResponse::from_result(
        result,
        StudentDto::from,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/students/{id}",
    tag = "Students",
    security(("session" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student", body = ApiResponse<StudentDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_student(
    State(state): State<StudentHandlerState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<StudentDto>>, ApiError> {
    let student = state
        .repos
        .students()
        .find_by_id(id)
        .await
        .map_err(domain_error)?
        .ok_or_else(|| student_not_found(id))?;
    Ok(Json(ApiResponse::success(StudentDto::from(student))))
}

#[utoipa::path(
    post,
    path = "/api/v1/students",
    tag = "Students",
    security(("session" = [])),
    request_body = CreateStudentRequest,
    responses(
        (status = 201, description = "Student enrolled", body = ApiResponse<StudentDto>),
        (status = 404, description = "Branch not found"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_student(
    State(state): State<StudentHandlerState>,
    ValidatedJson(request): ValidatedJson<CreateStudentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StudentDto>>), ApiError> {
    let student = state
        .repos
        .students()
        .create(request.into())
        .await
        .map_err(domain_error)?;
    info!(student_id = student.id, branch_id = student.branch_id, "Student enrolled");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(StudentDto::from(student))),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/students/{id}",
    tag = "Students",
    security(("session" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    request_body = UpdateStudentRequest,
    responses(
        (status = 200, description = "Student updated", body = ApiResponse<StudentDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_student(
    State(state): State<StudentHandlerState>,
    Path(id): Path<i32>,
    ValidatedJson(request): ValidatedJson<UpdateStudentRequest>,
) -> Result<Json<ApiResponse<StudentDto>>, ApiError> {
    let student = state
        .repos
        .students()
        .update(id, request.into())
        .await
        .map_err(domain_error)?
        .ok_or_else(|| student_not_found(id))?;
    Ok(Json(ApiResponse::success(StudentDto::from(student))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/students/{id}",
    tag = "Students",
    security(("session" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student removed"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_student(
    State(state): State<StudentHandlerState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<EmptyData>>, ApiError> {
    state
        .repos
        .students()
        .delete(id)
        .await
        .map_err(domain_error)?;
    info!(student_id = id, "Student removed");
    Ok(Json(ApiResponse::success(EmptyData {})))
}

#[utoipa::path(
    get,
    path = "/api/v1/students/expiring",
    tag = "Students",
    security(("session" = [])),
    params(ExpiringParams),
    responses(
        (status = 200, description = "Memberships ending within the window", body = ApiResponse<Vec<ExpiringStudentDto>>),
        (status = 403, description = "Missing view_reports"),
        (status = 422, description = "Window out of range")
    )
)]
pub async fn expiring_students(
    State(state): State<StudentHandlerState>,
    Query(params): Query<ExpiringParams>,
) -> Result<Json<ApiResponse<Vec<ExpiringStudentDto>>>, ApiError> {
    let days = params.days.unwrap_or(state.default_window_days);
    if !(0..=MAX_REPORT_DAYS).contains(&days) {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("days must be between 0 and {}", MAX_REPORT_DAYS),
        ));
    }

    let today = Utc::now().date_naive();
    let until = Student::reminder_window_end(today, days).ok_or_else(|| {
        api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("days must be between 0 and {}", MAX_REPORT_DAYS),
        )
    })?;
    let students = state
        .repos
        .students()
        .find_ending_between(today, until)
        .await
        .map_err(domain_error)?;

    let items = students
        .into_iter()
        .filter(|s| params.branch_id.map_or(true, |b| s.branch_id == b))
        .map(|s| ExpiringStudentDto {
            days_remaining: s.days_remaining(today),
            student: StudentDto::from(s),
        })
        .collect();

    Ok(Json(ApiResponse::success(items)))
}
