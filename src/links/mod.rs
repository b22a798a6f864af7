//! Link shortening collaborator.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("link shortening failed: {0}")]
    Transient(String),
}

pub trait LinkShortener: Send + Sync {
    async fn shorten(&self, url: &str) -> Result<String, LinkError>;
}

#[derive(Serialize)]
struct ShortenRequest<'a> {
    long_url: &'a str,
}

#[derive(Deserialize)]
struct ShortenResponse {
    link: String,
}

/// Bitly-style JSON API client.
#[derive(Clone)]
pub struct BitlyClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl BitlyClient {
    pub fn new(http: reqwest::Client, base: String, token: String) -> Self {
        Self { http, base, token }
    }
}

impl LinkShortener for BitlyClient {
    async fn shorten(&self, url: &str) -> Result<String, LinkError> {
        let resp = self
            .http
            .post(format!("{}/shorten", self.base.trim_end_matches('/')))
            .bearer_auth(&self.token)
            .json(&ShortenRequest { long_url: url })
            .send()
            .await
            .map_err(|e| LinkError::Transient(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(LinkError::Transient(format!(
                "shortener returned {}",
                resp.status()
            )));
        }
        let body: ShortenResponse = resp
            .json()
            .await
            .map_err(|e| LinkError::Transient(e.to_string()))?;
        debug!(long = url, short = %body.link, "link shortened");
        Ok(body.link)
    }
}

/// Shortener selected by configuration: a real client when a token is
/// configured, otherwise links pass through unshortened.
#[derive(Clone)]
pub enum Shortener {
    Bitly(BitlyClient),
    Passthrough,
}

impl LinkShortener for Shortener {
    async fn shorten(&self, url: &str) -> Result<String, LinkError> {
        match self {
            Self::Bitly(client) => client.shorten(url).await,
            Self::Passthrough => Ok(url.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passthrough_returns_input() {
        let s = Shortener::Passthrough;
        assert_eq!(
            s.shorten("https://example.com/x").await.unwrap(),
            "https://example.com/x"
        );
    }
}
