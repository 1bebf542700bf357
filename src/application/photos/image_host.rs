//! Outbound image hosting port

use async_trait::async_trait;
use thiserror::Error;

/// One image as received from the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Where the host serves the stored image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedImage {
    pub url: String,
}

#[derive(Debug, Error)]
pub enum ImageHostError {
    /// The host refused the image (4xx)
    #[error("Image rejected by host: {0}")]
    Rejected(String),

    /// Network failure, 5xx or an unreadable reply
    #[error("Image host unavailable: {0}")]
    Unavailable(String),

    #[error("Image host misconfigured: {0}")]
    Config(String),
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, ImageHostError>;
}
