//! Student photos kept on a third-party image host

pub mod image_host;
pub mod service;

pub use image_host::{HostedImage, ImageHost, ImageHostError, ImageUpload};
pub use service::{PhotoError, PhotoService, ACCEPTED_IMAGE_TYPES};
