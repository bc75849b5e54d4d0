//! HTTP transport used to reach the remote sunrise source.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;

use crate::error::AlarmError;

/// Fetches a URL and returns the response body as text.
///
/// Implementations map connectivity problems, timeouts and non-success HTTP
/// statuses to [`AlarmError::Transport`]. An empty body is returned as-is; the
/// resolver decides what that means.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<String, AlarmError>;
}

/// `reqwest`-backed transport with a per-request timeout.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sunrise-alarm/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<String, AlarmError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AlarmError::Transport(describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AlarmError::Transport(format!("HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| AlarmError::Transport(describe_reqwest_error(&e)))
    }
}

fn describe_reqwest_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}
