//! Off-chain payload fetching (evidence documents, item media).
//!
//! A URI with a leading `/` is content-addressed and fetched via the
//! configured gateway base; anything else is treated as absolute.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PayloadError {
    /// Network or gateway failure; the window should be retried.
    #[error("payload fetch failed: {0}")]
    Transient(String),
    /// The payload is gone or not what the schema expects. Skip the
    /// event, the backlog must not wait on one dead document.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// A 4xx from the gateway means the content itself is missing or bad
/// (dead pins answer 404/410 forever); only 5xx is worth retrying.
fn status_error(what: &str, status: reqwest::StatusCode) -> PayloadError {
    let text = format!("{what} returned {status}");
    if status.is_client_error() {
        PayloadError::Malformed(text)
    } else {
        PayloadError::Transient(text)
    }
}

/// An evidence document as published off-chain. Either `title` or the
/// legacy `name` field may carry the heading.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvidenceDocument {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "fileURI")]
    pub file_uri: Option<String>,
}

impl EvidenceDocument {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }
}

/// Shorten title and description so the combined post stays readable.
/// Only kicks in when the pair exceeds 130 characters; then a title
/// longer than 20 characters is cut to 17 plus an ellipsis, and a
/// description longer than 107 is cut likewise.
pub fn truncate_evidence(title: &str, description: &str) -> (String, String) {
    let title_len = title.chars().count();
    let desc_len = description.chars().count();
    if title_len + desc_len <= 130 {
        return (title.to_string(), description.to_string());
    }
    let title = if title_len > 20 {
        format!("{}...", title.chars().take(17).collect::<String>())
    } else {
        title.to_string()
    };
    let description = if desc_len > 107 {
        format!("{}...", description.chars().take(107).collect::<String>())
    } else {
        description.to_string()
    };
    (title, description)
}

/// Resolve a possibly gateway-relative URI to an absolute one.
pub fn resolve_uri(gateway: &str, uri: &str) -> String {
    if uri.starts_with('/') {
        format!("{}{}", gateway.trim_end_matches('/'), uri)
    } else {
        uri.to_string()
    }
}

/// Fetch seam for off-chain payloads.
pub trait PayloadSource: Send + Sync {
    fn resolve(&self, uri: &str) -> String;

    async fn evidence(&self, uri: &str) -> Result<EvidenceDocument, PayloadError>;

    async fn media(&self, uri: &str) -> Result<Vec<u8>, PayloadError>;
}

/// HTTP fetcher going through a content-addressed gateway.
#[derive(Clone)]
pub struct GatewayFetcher {
    http: reqwest::Client,
    gateway: String,
}

impl GatewayFetcher {
    pub fn new(http: reqwest::Client, gateway: String) -> Self {
        Self { http, gateway }
    }
}

impl PayloadSource for GatewayFetcher {
    fn resolve(&self, uri: &str) -> String {
        resolve_uri(&self.gateway, uri)
    }

    async fn evidence(&self, uri: &str) -> Result<EvidenceDocument, PayloadError> {
        let url = self.resolve(uri);
        debug!(url = %url, "fetching evidence document");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PayloadError::Transient(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(status_error("evidence fetch", resp.status()));
        }
        resp.json::<EvidenceDocument>()
            .await
            .map_err(|e| PayloadError::Malformed(e.to_string()))
    }

    async fn media(&self, uri: &str) -> Result<Vec<u8>, PayloadError> {
        let url = self.resolve(uri);
        debug!(url = %url, "fetching media");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PayloadError::Transient(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(status_error("media fetch", resp.status()));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| PayloadError::Transient(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_pair_is_truncated() {
        let title = "a".repeat(25);
        let description = "b".repeat(110);
        let (t, d) = truncate_evidence(&title, &description);
        assert_eq!(t, format!("{}...", "a".repeat(17)));
        assert_eq!(d, format!("{}...", "b".repeat(107)));
    }

    #[test]
    fn twenty_char_title_survives_truncation() {
        let title = "a".repeat(20);
        let description = "b".repeat(115);
        let (t, d) = truncate_evidence(&title, &description);
        assert_eq!(t, title);
        assert_eq!(d, format!("{}...", "b".repeat(107)));
    }

    #[test]
    fn short_pair_is_untouched() {
        let title = "a".repeat(10);
        let description = "b".repeat(50);
        let (t, d) = truncate_evidence(&title, &description);
        assert_eq!(t, title);
        assert_eq!(d, description);
    }

    #[test]
    fn gateway_relative_uri_is_rewritten() {
        assert_eq!(
            resolve_uri("https://gw.example", "/ipfs/QmX"),
            "https://gw.example/ipfs/QmX"
        );
        assert_eq!(
            resolve_uri("https://gw.example/", "/ipfs/QmX"),
            "https://gw.example/ipfs/QmX"
        );
        assert_eq!(
            resolve_uri("https://gw.example", "https://site.example/doc.json"),
            "https://site.example/doc.json"
        );
    }

    #[test]
    fn missing_content_is_malformed_not_transient() {
        assert!(matches!(
            status_error("media fetch", reqwest::StatusCode::NOT_FOUND),
            PayloadError::Malformed(_)
        ));
        assert!(matches!(
            status_error("media fetch", reqwest::StatusCode::GONE),
            PayloadError::Malformed(_)
        ));
        assert!(matches!(
            status_error("media fetch", reqwest::StatusCode::BAD_GATEWAY),
            PayloadError::Transient(_)
        ));
    }

    #[test]
    fn title_falls_back_to_name() {
        let doc: EvidenceDocument =
            serde_json::from_str(r#"{"name":"legacy","description":"d"}"#).unwrap();
        assert_eq!(doc.display_title(), "legacy");
        let doc: EvidenceDocument =
            serde_json::from_str(r#"{"title":"modern","name":"legacy"}"#).unwrap();
        assert_eq!(doc.display_title(), "modern");
    }
}
