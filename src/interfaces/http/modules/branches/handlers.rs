//! Branch API handlers, guarded by `manage_branches`

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use super::dto::{BranchDto, CreateBranchRequest, UpdateBranchRequest};
use crate::domain::{DomainError, RepositoryProvider};
use crate::interfaces::http::common::{
    domain_error, ApiError, ApiResponse, EmptyData, PaginatedResponse, PaginationParams,
    ValidatedJson,
};

#[derive(Clone)]
pub struct BranchHandlerState {
    pub repos: Arc<dyn RepositoryProvider>,
}

fn branch_not_found(id: i32) -> ApiError {
    domain_error(DomainError::not_found("Branch", "id", id))
}

#[utoipa::path(
    get,
    path = "/api/v1/branches",
    tag = "Branches",
    security(("session" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "Branch list", body = ApiResponse<PaginatedResponse<BranchDto>>),
        (status = 403, description = "Missing manage_branches")
    )
)]
pub async fn list_branches(
    State(state): State<BranchHandlerState>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PaginatedResponse<BranchDto>>>, ApiError> {
    let result = state
        .repos
        .branches()
        .list(params.page_request())
        .await
        .map_err(domain_error)?;
    Ok(Json(ApiResponse::success(PaginatedResponse::from_result(
        result,
        BranchDto::from,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/branches/{id}",
    tag = "Branches",
    security(("session" = [])),
    params(("id" = i32, Path, description = "Branch ID")),
    responses(
        (status = 200, description = "Branch", body = ApiResponse<BranchDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_branch(
    State(state): State<BranchHandlerState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<BranchDto>>, ApiError> {
    let branch = state
        .repos
        .branches()
        .find_by_id(id)
        .await
        .map_err(domain_error)?
        .ok_or_else(|| branch_not_found(id))?;
    Ok(Json(ApiResponse::success(BranchDto::from(branch))))
}

#[utoipa::path(
    post,
    path = "/api/v1/branches",
    tag = "Branches",
    security(("session" = [])),
    request_body = CreateBranchRequest,
    responses(
        (status = 201, description = "Branch created", body = ApiResponse<BranchDto>),
        (status = 409, description = "Name already in use"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_branch(
    State(state): State<BranchHandlerState>,
    ValidatedJson(request): ValidatedJson<CreateBranchRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BranchDto>>), ApiError> {
    let branch = state
        .repos
        .branches()
        .create(request.into())
        .await
        .map_err(domain_error)?;
    info!(branch_id = branch.id, name = %branch.name, "Branch created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(BranchDto::from(branch))),
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/branches/{id}",
    tag = "Branches",
    security(("session" = [])),
    params(("id" = i32, Path, description = "Branch ID")),
    request_body = UpdateBranchRequest,
    responses(
        (status = 200, description = "Branch updated", body = ApiResponse<BranchDto>),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_branch(
    State(state): State<BranchHandlerState>,
    Path(id): Path<i32>,
    ValidatedJson(request): ValidatedJson<UpdateBranchRequest>,
) -> Result<Json<ApiResponse<BranchDto>>, ApiError> {
    let branch = state
        .repos
        .branches()
        .update(id, request.into())
        .await
        .map_err(domain_error)?
        .ok_or_else(|| branch_not_found(id))?;
    Ok(Json(ApiResponse::success(BranchDto::from(branch))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/branches/{id}",
    tag = "Branches",
    security(("session" = [])),
    params(("id" = i32, Path, description = "Branch ID")),
    responses(
        (status = 200, description = "Branch and its students deleted"),
        (status = 404, description = "Not found")
    )
)]
pub async fn delete_branch(
    State(state): State<BranchHandlerState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<EmptyData>>, ApiError> {
    state
        .repos
        .branches()
        .delete(id)
        .await
        .map_err(domain_error)?;
    info!(branch_id = id, "Branch deleted");
    Ok(Json(ApiResponse::success(EmptyData {})))
}
