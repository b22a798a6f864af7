//! Social publishing collaborator.
//!
//! The publish path is the idempotence boundary: on redelivery after a
//! restart, the platform's duplicate-content rejection is what keeps a
//! transition from being announced twice. `Duplicate` is therefore a
//! distinct, non-retryable error, while `RateLimited` and `Transient`
//! must bubble up so the window is retried rather than dropped.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PublishError {
    /// The platform already has this content. Nothing to do.
    #[error("duplicate content")]
    Duplicate,
    /// Back off and retry the window later.
    #[error("rate limited")]
    RateLimited,
    #[error("publish failed: {0}")]
    Transient(String),
}

/// Publish seam. Returns the platform handle of the new post, used to
/// thread the entity's next post as a reply.
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        text: &str,
        media: Option<&[u8]>,
        reply_to: Option<&str>,
    ) -> Result<String, PublishError>;
}

#[derive(Deserialize)]
struct PostResponse {
    id_str: String,
}

#[derive(Deserialize)]
struct MediaResponse {
    media_id_string: String,
}

/// HTTP status-API client (bearer auth, form-encoded v1.1-style surface).
#[derive(Clone)]
pub struct StatusApi {
    http: reqwest::Client,
    base: String,
    upload_base: String,
    token: String,
}

impl StatusApi {
    pub fn new(http: reqwest::Client, base: String, upload_base: String, token: String) -> Self {
        Self {
            http,
            base,
            upload_base,
            token,
        }
    }

    async fn upload_media(&self, bytes: &[u8]) -> Result<String, PublishError> {
        let form = [("media_data", BASE64.encode(bytes))];
        let resp = self
            .http
            .post(format!(
                "{}/media/upload.json",
                self.upload_base.trim_end_matches('/')
            ))
            .bearer_auth(&self.token)
            .form(&form)
            .send()
            .await
            .map_err(|e| PublishError::Transient(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PublishError::Transient(format!(
                "media upload returned {}",
                resp.status()
            )));
        }
        let body: MediaResponse = resp
            .json()
            .await
            .map_err(|e| PublishError::Transient(e.to_string()))?;
        Ok(body.media_id_string)
    }
}

impl Publisher for StatusApi {
    async fn publish(
        &self,
        text: &str,
        media: Option<&[u8]>,
        reply_to: Option<&str>,
    ) -> Result<String, PublishError> {
        let mut form: Vec<(&str, String)> = vec![("status", text.to_string())];
        if let Some(handle) = reply_to {
            form.push(("in_reply_to_status_id", handle.to_string()));
            form.push(("auto_populate_reply_metadata", "true".to_string()));
        }
        if let Some(bytes) = media {
            let media_id = self.upload_media(bytes).await?;
            form.push(("media_ids", media_id));
        }

        let resp = self
            .http
            .post(format!(
                "{}/statuses/update.json",
                self.base.trim_end_matches('/')
            ))
            .bearer_auth(&self.token)
            .form(&form)
            .send()
            .await
            .map_err(|e| PublishError::Transient(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(PublishError::RateLimited);
        }
        if status.as_u16() == 403 {
            let body = resp.text().await.unwrap_or_default();
            // The platform reports duplicate statuses as a 403.
            if body.to_ascii_lowercase().contains("duplicate") {
                return Err(PublishError::Duplicate);
            }
            return Err(PublishError::Transient(format!("post returned 403: {body}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Transient(format!(
                "post returned {status}: {body}"
            )));
        }

        let body: PostResponse = resp
            .json()
            .await
            .map_err(|e| PublishError::Transient(e.to_string()))?;
        debug!(handle = %body.id_str, reply_to = ?reply_to, "post published");
        Ok(body.id_str)
    }
}
