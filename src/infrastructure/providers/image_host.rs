//! Image host reached over HTTP
//!
//! The image is sent as the `image` part of a multipart form. The reply
//! carries the public address either as `url` or as `data.url`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::{client, reply_excerpt};
use crate::application::photos::{HostedImage, ImageHost, ImageHostError, ImageUpload};
use crate::config::ImagesConfig;

#[derive(Debug, Deserialize)]
struct UploadReply {
    url: Option<String>,
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: Option<String>,
}

impl UploadReply {
    fn into_url(self) -> Option<String> {
        self.url
            .or_else(|| self.data.and_then(|d| d.url))
            .filter(|u| !u.is_empty())
    }
}

pub struct HttpImageHost {
    client: reqwest::Client,
    upload_url: String,
    api_key: Option<String>,
}

impl HttpImageHost {
    /// `None` while no upload URL is configured.
    pub fn from_config(config: &ImagesConfig) -> Result<Option<Self>, ImageHostError> {
        let Some(upload_url) = config.upload_url.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if upload_url.is_empty() {
            return Ok(None);
        }
        reqwest::Url::parse(upload_url)
            .map_err(|e| ImageHostError::Config(format!("upload_url {}: {}", upload_url, e)))?;

        Ok(Some(Self {
            client: client(config.timeout_secs)
                .map_err(|e| ImageHostError::Config(e.to_string()))?,
            upload_url: upload_url.to_string(),
            api_key: config.api_key.clone(),
        }))
    }
}

#[async_trait]
impl ImageHost for HttpImageHost {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, ImageHostError> {
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.content_type)
            .map_err(|e| ImageHostError::Rejected(e.to_string()))?;
        let form = Form::new().part("image", part);

        let mut request = self.client.post(&self.upload_url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ImageHostError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reply = format!("{}: {}", status, reply_excerpt(response).await);
            return Err(if status.is_client_error() {
                ImageHostError::Rejected(reply)
            } else {
                ImageHostError::Unavailable(reply)
            });
        }

        let reply: UploadReply = response
            .json()
            .await
            .map_err(|e| ImageHostError::Unavailable(format!("unreadable reply: {}", e)))?;
        let url = reply
            .into_url()
            .ok_or_else(|| ImageHostError::Unavailable("reply carries no url".into()))?;

        debug!(%url, "Image stored by host");
        Ok(HostedImage { url })
    }
}
