//! Shared HTTP plumbing for API-backed adapters

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::{Client, Response};

use crate::SourceError;

/// User agents rotated across outbound requests
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Get a random user agent for request diversity
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// Build an HTTP client with a per-request timeout.
///
/// The timeout here bounds a single HTTP round trip. Adapters that poll
/// make several such requests inside one fetch, so their overall wall
/// time is governed separately by the task runner.
pub fn build_client(timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(random_user_agent())
        .build()
        .map_err(|e| SourceError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Reject non-2xx responses, reading the body into the error detail.
pub async fn ensure_success(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(SourceError::Api {
        status: status.as_u16(),
        detail: detail.chars().take(200).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_comes_from_pool() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[test]
    fn test_client_builds_with_timeout() {
        let client = build_client(Duration::from_secs(10));
        assert!(client.is_ok());
    }
}
