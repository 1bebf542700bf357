//! Student photo upload, guarded like the rest of the student routes

use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{error, info};
use utoipa::ToSchema;

use super::dto::StudentDto;
use crate::application::{ImageHostError, ImageUpload, PhotoError, PhotoService};
use crate::interfaces::http::common::{api_error, domain_error, ApiError, ApiResponse};

/// Multipart field carrying the image
pub const PHOTO_FIELD: &str = "photo";

#[derive(Clone)]
pub struct PhotoHandlerState {
    /// `None` while no image host is configured
    pub photos: Option<Arc<PhotoService>>,
}

/// Multipart form of the photo upload
#[derive(ToSchema)]
pub struct PhotoUploadForm {
    /// JPEG, PNG, WebP or GIF image
    #[schema(value_type = String, format = Binary)]
    pub photo: Vec<u8>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    api_error(e.status(), e.body_text())
}

fn photo_error(e: PhotoError) -> ApiError {
    match e {
        PhotoError::Empty => api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        PhotoError::TooLarge { .. } => api_error(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()),
        PhotoError::UnsupportedType(_) => {
            api_error(StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string())
        }
        PhotoError::Host(ImageHostError::Rejected(_)) => {
            api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        PhotoError::Host(ImageHostError::Unavailable(_) | ImageHostError::Config(_)) => {
            error!(error = %e, "Image host failed");
            api_error(StatusCode::BAD_GATEWAY, "Image host unavailable")
        }
        PhotoError::Domain(e) => domain_error(e),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/students/{id}/photo",
    tag = "Students",
    security(("session" = [])),
    params(("id" = i32, Path, description = "Student ID")),
    request_body(content = PhotoUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Photo stored", body = ApiResponse<StudentDto>),
        (status = 404, description = "Not found"),
        (status = 413, description = "Photo too large"),
        (status = 415, description = "Not an accepted image type"),
        (status = 502, description = "Image host failed"),
        (status = 503, description = "No image host configured")
    )
)]
pub async fn upload_student_photo(
    State(state): State<PhotoHandlerState>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<StudentDto>>, ApiError> {
    let Some(photos) = state.photos else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Photo uploads are not configured",
        ));
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(PHOTO_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or(PHOTO_FIELD).to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        upload = Some(ImageUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let Some(upload) = upload else {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Multipart field `{}` is required", PHOTO_FIELD),
        ));
    };

    let student = photos.upload(id, upload).await.map_err(photo_error)?;
    info!(student_id = id, "Student photo updated");
    Ok(Json(ApiResponse::success(StudentDto::from(student))))
}
