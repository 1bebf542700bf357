//! HTTP clients for third-party providers

pub mod image_host;
pub mod mailer;

pub use image_host::HttpImageHost;
pub use mailer::HttpMailer;

use std::time::Duration;

/// Client shared by every request to one provider
fn client(timeout_secs: u64) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(concat!("library-service/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// First part of a provider reply, for log and error messages
async fn reply_excerpt(response: reqwest::Response) -> String {
    let mut text = response.text().await.unwrap_or_default();
    if text.len() > 200 {
        let mut cut = 200;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

/// Local stand-in for a provider, serving `app` on an ephemeral port
#[cfg(test)]
pub(crate) async fn serve_local(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
