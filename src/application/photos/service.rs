//! Student photo upload

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::image_host::{ImageHost, ImageHostError, ImageUpload};
use crate::domain::{DomainError, RepositoryProvider, Student};

/// Content types forwarded to the host
pub const ACCEPTED_IMAGE_TYPES: &[&str] =
    &["image/jpeg", "image/png", "image/webp", "image/gif"];

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Photo is empty")]
    Empty,

    #[error("Photo exceeds {max} bytes")]
    TooLarge { max: usize },

    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error(transparent)]
    Host(#[from] ImageHostError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

pub struct PhotoService {
    repos: Arc<dyn RepositoryProvider>,
    host: Arc<dyn ImageHost>,
    max_bytes: usize,
}

impl PhotoService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        host: Arc<dyn ImageHost>,
        max_bytes: usize,
    ) -> Self {
        Self {
            repos,
            host,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Push the image to the host and store its URL on the student.
    ///
    /// Nothing is uploaded for an unknown student or a rejected file.
    pub async fn upload(
        &self,
        student_id: i32,
        image: ImageUpload,
    ) -> Result<Student, PhotoError> {
        if self.repos.students().find_by_id(student_id).await?.is_none() {
            return Err(DomainError::not_found("Student", "id", student_id).into());
        }
        self.check(&image)?;

        let size = image.bytes.len();
        let hosted = self.host.upload(image).await.map_err(|e| {
            warn!(student_id, error = %e, "Photo upload failed");
            e
        })?;

        let student = self
            .repos
            .students()
            .set_photo_url(student_id, &hosted.url)
            .await?;
        metrics::counter!("student_photos_uploaded_total").increment(1);
        info!(student_id, size, url = %hosted.url, "Student photo stored");
        Ok(student)
    }

    fn check(&self, image: &ImageUpload) -> Result<(), PhotoError> {
        if image.bytes.is_empty() {
            return Err(PhotoError::Empty);
        }
        if image.bytes.len() > self.max_bytes {
            return Err(PhotoError::TooLarge {
                max: self.max_bytes,
            });
        }
        let essence = image
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !ACCEPTED_IMAGE_TYPES.contains(&essence.as_str()) {
            return Err(PhotoError::UnsupportedType(image.content_type.clone()));
        }
        Ok(())
    }
}
