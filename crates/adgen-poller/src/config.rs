//! Poller configuration.

use std::time::Duration;

use adgen_models::{TargetKind, DEFAULT_POLL_INTERVAL};
use url::Url;

use crate::error::{PollError, PollResult};

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_JOB_STATUS_PATH: &str = "/api/jobs/{id}/status";
const DEFAULT_CAMPAIGN_STATUS_PATH: &str = "/api/campaigns/{id}/progress";
const DEFAULT_PROJECT_STATUS_PATH: &str = "/api/projects/{id}/status";

/// URL template for one kind of status endpoint.
///
/// The template must contain `{id}`. It is either a path appended to the base
/// URL or an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEndpoint(String);

impl StatusEndpoint {
    pub const ID_PLACEHOLDER: &'static str = "{id}";

    pub fn new(template: impl Into<String>) -> PollResult<Self> {
        let template = template.into();
        if !template.contains(Self::ID_PLACEHOLDER) {
            return Err(PollError::config(format!(
                "status endpoint template {:?} has no {} placeholder",
                template,
                Self::ID_PLACEHOLDER
            )));
        }
        Ok(Self(template))
    }

    pub fn template(&self) -> &str {
        &self.0
    }

    /// Substitute the URL-encoded id into the template.
    pub fn render(&self, id: &str) -> String {
        self.0.replace(Self::ID_PLACEHOLDER, &urlencoding::encode(id))
    }

    fn is_absolute(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }
}

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Base URL of the generation API
    pub base_url: String,
    /// Job status endpoint
    pub job_status: StatusEndpoint,
    /// Campaign progress endpoint
    pub campaign_status: StatusEndpoint,
    /// Project status endpoint
    pub project_status: StatusEndpoint,
    /// Delay between status requests. Applied by [`PollBinding::http`];
    /// bindings built with [`PollBinding::new`] set their own.
    ///
    /// [`PollBinding::http`]: crate::PollBinding::http
    /// [`PollBinding::new`]: crate::PollBinding::new
    pub interval: Duration,
    /// Bearer token issued by the backend, if any
    pub api_token: Option<String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            job_status: StatusEndpoint(DEFAULT_JOB_STATUS_PATH.to_string()),
            campaign_status: StatusEndpoint(DEFAULT_CAMPAIGN_STATUS_PATH.to_string()),
            project_status: StatusEndpoint(DEFAULT_PROJECT_STATUS_PATH.to_string()),
            interval: DEFAULT_POLL_INTERVAL,
            api_token: None,
        }
    }
}

impl PollerConfig {
    /// Create config for the given base URL with default endpoints.
    pub fn new(base_url: impl Into<String>) -> PollResult<Self> {
        let config = Self {
            base_url: base_url.into(),
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Create config from environment variables.
    pub fn from_env() -> PollResult<Self> {
        let endpoint = |var: &str, default: &str| {
            StatusEndpoint::new(std::env::var(var).unwrap_or_else(|_| default.to_string()))
        };

        let config = Self {
            base_url: std::env::var("ADGEN_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            job_status: endpoint("ADGEN_JOB_STATUS_PATH", DEFAULT_JOB_STATUS_PATH)?,
            campaign_status: endpoint("ADGEN_CAMPAIGN_STATUS_PATH", DEFAULT_CAMPAIGN_STATUS_PATH)?,
            project_status: endpoint("ADGEN_PROJECT_STATUS_PATH", DEFAULT_PROJECT_STATUS_PATH)?,
            interval: Duration::from_millis(
                std::env::var("ADGEN_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|ms| *ms > 0)
                    .unwrap_or(DEFAULT_POLL_INTERVAL.as_millis() as u64),
            ),
            api_token: std::env::var("ADGEN_API_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_endpoint(mut self, kind: TargetKind, endpoint: StatusEndpoint) -> Self {
        match kind {
            TargetKind::Job => self.job_status = endpoint,
            TargetKind::Campaign => self.campaign_status = endpoint,
            TargetKind::Project => self.project_status = endpoint,
        }
        self
    }

    pub fn endpoint(&self, kind: TargetKind) -> &StatusEndpoint {
        match kind {
            TargetKind::Job => &self.job_status,
            TargetKind::Campaign => &self.campaign_status,
            TargetKind::Project => &self.project_status,
        }
    }

    /// Full status URL for a target id.
    pub fn status_url(&self, kind: TargetKind, id: &str) -> String {
        let endpoint = self.endpoint(kind);
        let rendered = endpoint.render(id);

        if endpoint.is_absolute() {
            rendered
        } else {
            format!("{}{}", self.base_url.trim_end_matches('/'), rendered)
        }
    }

    pub fn validate(&self) -> PollResult<()> {
        Url::parse(&self.base_url)
            .map_err(|e| PollError::config(format!("invalid base URL {:?}: {}", self.base_url, e)))?;

        if self.interval.is_zero() {
            return Err(PollError::config("poll interval must be greater than zero"));
        }

        Ok(())
    }
}
