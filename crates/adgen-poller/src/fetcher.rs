//! Status fetcher.
//!
//! One GET per call. The caller owns the cancellation token; the fetcher only
//! observes it. The request timeout is applied here regardless of what the
//! caller does with the token.

use std::time::{Duration, Instant};

use adgen_models::{PollTarget, Status, StatusPayload, REQUEST_TIMEOUT};
use async_trait::async_trait;
use reqwest::{header, Client};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PollerConfig;
use crate::error::{PollError, PollResult};
use crate::metrics::record_fetch;

/// Longest response body excerpt kept in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Capability to fetch the current status of a target.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Fetch status once.
    ///
    /// Returns [`PollError::Cancelled`] when `cancel` fires before or during
    /// the request, and [`PollError::InvalidTarget`] without touching the
    /// network when the target id is missing or a placeholder.
    async fn fetch(&self, target: &PollTarget, cancel: CancellationToken) -> PollResult<Status>;
}

/// Status fetcher backed by the generation API.
#[derive(Debug, Clone)]
pub struct HttpStatusFetcher {
    http: Client,
    config: PollerConfig,
    timeout: Duration,
}

impl HttpStatusFetcher {
    /// Create a new fetcher.
    pub fn new(config: PollerConfig) -> PollResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("adgen-poller/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(PollError::Network)?;

        Ok(Self {
            http,
            config,
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> PollResult<Self> {
        Self::new(PollerConfig::from_env()?)
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn request(&self, url: &str) -> PollResult<Status> {
        let mut request = self.http.get(url).header(header::ACCEPT, "application/json");
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PollError::request_failed(
                status.as_u16(),
                truncate(body.trim(), MAX_ERROR_BODY),
            ));
        }

        let body = response.text().await?;
        let payload: StatusPayload = serde_json::from_str(&body)
            .map_err(|e| PollError::invalid_response(e.to_string()))?;

        Ok(Status::from(payload))
    }
}

#[async_trait]
impl StatusFetcher for HttpStatusFetcher {
    async fn fetch(&self, target: &PollTarget, cancel: CancellationToken) -> PollResult<Status> {
        target.validate()?;

        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }

        let url = self.config.status_url(target.kind, &target.id);
        debug!(target_id = %target.id, target_kind = %target.kind, "Fetching status from {}", url);

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PollError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, self.request(&url)) => match outcome {
                Ok(result) => result,
                Err(_) => Err(PollError::Timeout(self.timeout)),
            },
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        record_fetch(target.kind.as_str(), outcome, started.elapsed());

        result
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout() {
        let fetcher = HttpStatusFetcher::new(PollerConfig::default()).unwrap();
        assert_eq!(fetcher.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("ééé", 3), "é...");
    }

    #[tokio::test]
    async fn test_invalid_target_never_requests() {
        let fetcher = HttpStatusFetcher::new(PollerConfig::default()).unwrap();

        for id in ["", "undefined", "null"] {
            let result = fetcher
                .fetch(&PollTarget::job(id), CancellationToken::new())
                .await;
            assert!(matches!(result, Err(PollError::InvalidTarget(_))));
        }
    }

    #[tokio::test]
    async fn test_precancelled_token_is_silent() {
        let fetcher = HttpStatusFetcher::new(PollerConfig::default()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher.fetch(&PollTarget::job("job-1"), cancel).await;
        assert!(matches!(result, Err(PollError::Cancelled)));
    }
}
