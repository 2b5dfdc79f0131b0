//! HTTP dispatch over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use tracing::{debug, error};
use weft_core::SyncError;
use weft_core::errors::Result;
use weft_core::protocol::{DispatchEnvelope, DispatchReply};
use weft_settings::{DispatchMethod, DispatchSettings};

use super::DispatchTransport;

/// Posts dispatch envelopes to an HTTP endpoint.
///
/// The session id travels both in the body and in the configured header.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    method: DispatchMethod,
    session_header: String,
}

impl HttpTransport {
    /// Build from settings. Fails if no dispatch URL is configured.
    pub fn new(settings: &DispatchSettings) -> Result<Self> {
        let url = settings.url.clone().ok_or_else(|| SyncError::InvalidEndpoint {
            endpoint: String::new(),
            reason: "no dispatch URL configured".into(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(settings.http_timeout())
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, url, settings))
    }

    /// Build around an existing client.
    pub fn with_client(client: reqwest::Client, url: String, settings: &DispatchSettings) -> Self {
        Self {
            client,
            url,
            method: settings.method,
            session_header: settings.session_header.clone(),
        }
    }
}

#[async_trait]
impl DispatchTransport for HttpTransport {
    async fn send(&self, envelope: DispatchEnvelope) -> Result<DispatchReply> {
        let request = match self.method {
            DispatchMethod::Post => self.client.post(&self.url),
            DispatchMethod::Put => self.client.put(&self.url),
        };
        let response = request
            .header(self.session_header.as_str(), envelope.session_id.as_str())
            .json(&envelope)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Application {
                message: format!("HTTP {status}: {body}"),
                retry_after,
            });
        }

        let body = response.bytes().await.map_err(classify)?;
        debug!(url = %self.url, bytes = body.len(), "dispatch reply received");
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(DispatchReply::default());
        }
        serde_json::from_slice(&body).map_err(|e| {
            error!(url = %self.url, error = %e, "failed to parse dispatch reply");
            SyncError::MalformedMessage(e.to_string())
        })
    }
}

/// No response at all (refused, timed out) is a connectivity failure.
fn classify(err: reqwest::Error) -> SyncError {
    if err.is_connect() || err.is_timeout() || (err.is_request() && err.status().is_none()) {
        SyncError::Connectivity(err.to_string())
    } else if err.is_builder() {
        SyncError::InvalidEndpoint {
            endpoint: err.url().map(ToString::to_string).unwrap_or_default(),
            reason: err.to_string(),
        }
    } else {
        SyncError::Transport(err.to_string())
    }
}

/// Parse a `Retry-After` header as seconds or an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delay = date.signed_duration_since(chrono::Utc::now());
    Some(delay.to_std().unwrap_or(Duration::ZERO))
}
