//! Mail provider reached over HTTP
//!
//! Each message is posted as JSON to `reminders.provider_url`, with the
//! API key as a bearer token. Any 2xx reply counts as accepted.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{client, reply_excerpt};
use crate::application::reminders::{EmailMessage, MailError, Mailer};
use crate::config::ReminderConfig;

#[derive(Debug, Serialize)]
struct OutboundMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_id: Option<&'a str>,
}

pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    template_id: Option<String>,
}

impl HttpMailer {
    /// `None` while no provider URL is configured.
    pub fn from_config(config: &ReminderConfig) -> Result<Option<Self>, MailError> {
        let Some(endpoint) = config.provider_url.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if endpoint.is_empty() {
            return Ok(None);
        }
        reqwest::Url::parse(endpoint)
            .map_err(|e| MailError::Config(format!("provider_url {}: {}", endpoint, e)))?;

        Ok(Some(Self {
            client: client(config.timeout_secs).map_err(|e| MailError::Config(e.to_string()))?,
            endpoint: endpoint.to_string(),
            api_key: config.api_key.clone(),
            template_id: config.template_id.clone(),
        }))
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if !message.to.contains('@') {
            return Err(MailError::InvalidRecipient(message.to.clone()));
        }

        let payload = OutboundMail {
            from: &message.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.body,
            template_id: self.template_id.as_deref(),
        };

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reply = reply_excerpt(response).await;
            return Err(MailError::Delivery(format!(
                "provider answered {}: {}",
                status, reply
            )));
        }

        debug!(to = %message.to, %status, "Mail accepted by provider");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::providers::serve_local;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    type Inbox = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    async fn provider(status: StatusCode) -> (String, Inbox) {
        let inbox: Inbox = Arc::default();
        let seen = inbox.clone();
        let app = Router::new().route(
            "/send",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let seen = seen.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    seen.lock().unwrap().push((auth, body));
                    (status, "queued")
                }
            }),
        );
        (format!("{}/send", serve_local(app).await), inbox)
    }

    fn config(url: &str) -> ReminderConfig {
        ReminderConfig {
            provider_url: Some(url.to_string()),
            api_key: Some("mail-key".into()),
            template_id: Some("membership-expiry".into()),
            ..Default::default()
        }
    }

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            from: "no-reply@library.local".into(),
            to: to.into(),
            subject: "Your membership ends tomorrow".into(),
            body: "Hello Asha".into(),
        }
    }

    #[test]
    fn unset_url_means_no_mailer() {
        assert!(HttpMailer::from_config(&ReminderConfig::default())
            .unwrap()
            .is_none());
        assert!(matches!(
            HttpMailer::from_config(&config("not a url")),
            Err(MailError::Config(_))
        ));
    }

    #[tokio::test]
    async fn posts_message_with_bearer_key() {
        let (url, inbox) = provider(StatusCode::ACCEPTED).await;
        let mailer = HttpMailer::from_config(&config(&url)).unwrap().unwrap();

        mailer.send(&message("asha@example.com")).await.unwrap();

        let inbox = inbox.lock().unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].0.as_deref(), Some("Bearer mail-key"));
        assert_eq!(
            inbox[0].1,
            json!({
                "from": "no-reply@library.local",
                "to": "asha@example.com",
                "subject": "Your membership ends tomorrow",
                "text": "Hello Asha",
                "template_id": "membership-expiry"
            })
        );
    }

    #[tokio::test]
    async fn provider_error_is_a_delivery_failure() {
        let (url, _) = provider(StatusCode::INTERNAL_SERVER_ERROR).await;
        let mailer = HttpMailer::from_config(&config(&url)).unwrap().unwrap();

        let err = mailer.send(&message("asha@example.com")).await.unwrap_err();
        assert!(matches!(err, MailError::Delivery(ref m) if m.contains("500")));
    }

    #[tokio::test]
    async fn bad_recipient_is_not_sent() {
        let (url, inbox) = provider(StatusCode::OK).await;
        let mailer = HttpMailer::from_config(&config(&url)).unwrap().unwrap();

        assert!(matches!(
            mailer.send(&message("front desk")).await,
            Err(MailError::InvalidRecipient(_))
        ));
        assert!(inbox.lock().unwrap().is_empty());
    }
}
