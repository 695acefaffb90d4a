//! Shared HTTP client construction and plain downloads.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a plain GET download.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Status(StatusCode),
}

impl FetchError {
    /// 404/410: the resource definitely does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status(s) if *s == StatusCode::NOT_FOUND || *s == StatusCode::GONE)
    }
}

/// Build a `reqwest` client with a request timeout and user agent.
pub fn build_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
}

/// Download a URL's body, failing on any non-2xx status.
pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    Ok(response.bytes().await?.to_vec())
}

/// Download a URL's body as text, failing on any non-2xx status.
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    Ok(response.text().await?)
}
