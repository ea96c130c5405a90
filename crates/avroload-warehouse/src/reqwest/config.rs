//! BigQuery client configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

/// Default timeout for HTTP requests: 30 seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default BigQuery REST endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com";

/// Configuration for the BigQuery REST client.
#[derive(Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct BigQueryConfig {
    /// Project that owns the datasets and runs the load jobs
    #[cfg_attr(
        feature = "config",
        arg(long = "bigquery-project-id", env = "BIGQUERY_PROJECT_ID")
    )]
    pub project_id: String,

    /// OAuth2 bearer token sent with every request
    #[cfg_attr(
        feature = "config",
        arg(long = "bigquery-access-token", env = "BIGQUERY_ACCESS_TOKEN")
    )]
    #[serde(default)]
    pub access_token: Option<String>,

    /// Base URL of the BigQuery REST API
    #[cfg_attr(
        feature = "config",
        arg(
            long = "bigquery-endpoint",
            env = "BIGQUERY_ENDPOINT",
            default_value = DEFAULT_ENDPOINT
        )
    )]
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Region the jobs run in (e.g. `EU`, `us-central1`)
    #[cfg_attr(
        feature = "config",
        arg(long = "bigquery-location", env = "BIGQUERY_LOCATION")
    )]
    #[serde(default)]
    pub location: Option<String>,

    /// HTTP request timeout in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "http-timeout", env = "HTTP_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)
    )]
    #[serde(default = "default_timeout_secs")]
    pub http_timeout: u64,

    /// User-Agent header to send with requests
    #[cfg_attr(
        feature = "config",
        arg(long = "http-user-agent", env = "HTTP_USER_AGENT")
    )]
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_owned()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl std::fmt::Debug for BigQueryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryConfig")
            .field("project_id", &self.project_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("endpoint", &self.endpoint)
            .field("location", &self.location)
            .field("http_timeout", &self.http_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl BigQueryConfig {
    /// Create a new configuration for the given project.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            access_token: None,
            endpoint: default_endpoint(),
            location: None,
            http_timeout: default_timeout_secs(),
            user_agent: None,
        }
    }

    /// Returns the effective timeout, using default if zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.http_timeout == 0 {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        } else {
            Duration::from_secs(self.http_timeout)
        }
    }

    /// Returns the effective user agent, using default if not set.
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("avroload/{}", env!("CARGO_PKG_VERSION")))
    }

    /// URL of the project's job collection.
    pub fn jobs_url(&self) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/jobs",
            self.endpoint.trim_end_matches('/'),
            self.project_id
        )
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.http_timeout = timeout_secs;
        self
    }
}
