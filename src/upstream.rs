use std::time::Duration;

use serde::de::DeserializeOwned;

const USER_AGENT: &str = concat!("cronus-gateway/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Bad response status: {0}")]
    Status(reqwest::StatusCode),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Build the HTTP client shared by all upstream lookups of one resolver.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, UpstreamError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| UpstreamError::Transport(e.to_string()))
}

/// GET `url` and decode the JSON body. Any non-2xx status is an error.
pub async fn fetch_json<T, Q>(
    client: &reqwest::Client,
    url: &str,
    query: &Q,
) -> Result<T, UpstreamError>
where
    T: DeserializeOwned,
    Q: serde::Serialize + ?Sized,
{
    let resp = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| UpstreamError::Transport(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(UpstreamError::Status(status));
    }

    resp.json::<T>()
        .await
        .map_err(|e| UpstreamError::Decode(e.to_string()))
}
