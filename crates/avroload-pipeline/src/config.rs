//! Pipeline configuration.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::task::TableNames;
use crate::waiter::{
    DEFAULT_MAX_RPC_RETRIES, DEFAULT_POLL_MULTIPLIER, DEFAULT_RPC_TIMEOUT, WaitPolicy,
};

/// Default dataset receiving both loads.
pub const DEFAULT_DATASET: &str = "clients_dataset";
/// Default table receiving the full source files.
pub const DEFAULT_FULL_TABLE: &str = "clients_full";
/// Default table receiving the projected files.
pub const DEFAULT_MANDATORY_TABLE: &str = "clients_mandatory";
/// Default maximum number of load jobs tracked at once.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 10;
/// Default wait budget per job, in seconds.
pub const DEFAULT_JOB_WAIT_TIMEOUT_SECS: u64 = 600;
/// Longest accepted job wait timeout (one week).
pub const MAX_JOB_WAIT_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;
/// Default first poll interval, in milliseconds.
pub const DEFAULT_JOB_POLL_INTERVAL_MS: u64 = 1000;
/// Default poll interval cap, in seconds.
pub const DEFAULT_JOB_MAX_POLL_INTERVAL_SECS: u64 = 30;

/// Tables, concurrency and wait budget of the ingest pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct PipelineConfig {
    /// Dataset holding both destination tables
    #[cfg_attr(
        feature = "config",
        arg(long = "bigquery-dataset", env = "BIGQUERY_DATASET", default_value = DEFAULT_DATASET)
    )]
    #[serde(default = "default_dataset")]
    pub dataset: String,

    /// Table loaded with the full source files
    #[cfg_attr(
        feature = "config",
        arg(
            long = "bigquery-table-full",
            env = "BIGQUERY_TABLE_FULL",
            default_value = DEFAULT_FULL_TABLE
        )
    )]
    #[serde(default = "default_full_table")]
    pub full_table: String,

    /// Table loaded with the mandatory-field projections
    #[cfg_attr(
        feature = "config",
        arg(
            long = "bigquery-table-mandatory",
            env = "BIGQUERY_TABLE_MANDATORY",
            default_value = DEFAULT_MANDATORY_TABLE
        )
    )]
    #[serde(default = "default_mandatory_table")]
    pub mandatory_table: String,

    /// Maximum load jobs tracked concurrently
    #[cfg_attr(
        feature = "config",
        arg(
            long = "pipeline-max-concurrent-jobs",
            env = "PIPELINE_MAX_CONCURRENT_JOBS",
            default_value_t = DEFAULT_MAX_CONCURRENT_JOBS
        )
    )]
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Seconds a load job may take before it counts as timed out
    #[cfg_attr(
        feature = "config",
        arg(
            long = "job-wait-timeout-secs",
            env = "JOB_WAIT_TIMEOUT_SECS",
            default_value_t = DEFAULT_JOB_WAIT_TIMEOUT_SECS
        )
    )]
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,

    /// Milliseconds before the second status poll
    #[cfg_attr(
        feature = "config",
        arg(
            long = "job-poll-interval-ms",
            env = "JOB_POLL_INTERVAL_MS",
            default_value_t = DEFAULT_JOB_POLL_INTERVAL_MS
        )
    )]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound of the pause between status polls, in seconds
    #[cfg_attr(
        feature = "config",
        arg(
            long = "job-max-poll-interval-secs",
            env = "JOB_MAX_POLL_INTERVAL_SECS",
            default_value_t = DEFAULT_JOB_MAX_POLL_INTERVAL_SECS
        )
    )]
    #[serde(default = "default_max_poll_interval_secs")]
    pub max_poll_interval_secs: u64,

    /// Consecutive transient status failures tolerated per job
    #[cfg_attr(
        feature = "config",
        arg(
            long = "job-max-rpc-retries",
            env = "JOB_MAX_RPC_RETRIES",
            default_value_t = DEFAULT_MAX_RPC_RETRIES
        )
    )]
    #[serde(default = "default_max_rpc_retries")]
    pub max_rpc_retries: u32,
}

fn default_dataset() -> String {
    DEFAULT_DATASET.to_owned()
}

fn default_full_table() -> String {
    DEFAULT_FULL_TABLE.to_owned()
}

fn default_mandatory_table() -> String {
    DEFAULT_MANDATORY_TABLE.to_owned()
}

fn default_max_concurrent_jobs() -> usize {
    DEFAULT_MAX_CONCURRENT_JOBS
}

fn default_wait_timeout_secs() -> u64 {
    DEFAULT_JOB_WAIT_TIMEOUT_SECS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_JOB_POLL_INTERVAL_MS
}

fn default_max_poll_interval_secs() -> u64 {
    DEFAULT_JOB_MAX_POLL_INTERVAL_SECS
}

fn default_max_rpc_retries() -> u32 {
    DEFAULT_MAX_RPC_RETRIES
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            full_table: default_full_table(),
            mandatory_table: default_mandatory_table(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            wait_timeout_secs: default_wait_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_interval_secs: default_max_poll_interval_secs(),
            max_rpc_retries: default_max_rpc_retries(),
        }
    }
}

impl PipelineConfig {
    pub fn with_tables(
        mut self,
        dataset: impl Into<String>,
        full_table: impl Into<String>,
        mandatory_table: impl Into<String>,
    ) -> Self {
        self.dataset = dataset.into();
        self.full_table = full_table.into();
        self.mandatory_table = mandatory_table.into();
        self
    }

    pub fn with_max_concurrent_jobs(mut self, max_concurrent_jobs: usize) -> Self {
        self.max_concurrent_jobs = max_concurrent_jobs;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_max_rpc_retries(mut self, max_rpc_retries: u32) -> Self {
        self.max_rpc_retries = max_rpc_retries;
        self
    }

    /// Destination tables.
    pub fn tables(&self) -> TableNames {
        TableNames::new(&self.dataset, &self.full_table, &self.mandatory_table)
    }

    /// Wait budget applied to every job.
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            total_timeout: Duration::from_secs(self.wait_timeout_secs),
            initial_poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_poll_interval: Duration::from_secs(self.max_poll_interval_secs),
            multiplier: DEFAULT_POLL_MULTIPLIER,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            max_rpc_retries: self.max_rpc_retries,
        }
    }

    /// Rejects configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.tables().validate()?;
        if self.max_concurrent_jobs == 0 {
            return Err(PipelineError::invalid_input(
                "max concurrent jobs must be at least 1",
            ));
        }
        if self.wait_timeout_secs == 0 {
            return Err(PipelineError::invalid_input(
                "job wait timeout must be positive",
            ));
        }
        if self.wait_timeout_secs > MAX_JOB_WAIT_TIMEOUT_SECS {
            return Err(PipelineError::invalid_input(format!(
                "job wait timeout must not exceed {MAX_JOB_WAIT_TIMEOUT_SECS} seconds"
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(PipelineError::invalid_input(
                "job poll interval must be positive",
            ));
        }
        if Duration::from_secs(self.max_poll_interval_secs)
            < Duration::from_millis(self.poll_interval_ms)
        {
            return Err(PipelineError::invalid_input(
                "max poll interval is shorter than the initial poll interval",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wait_policy() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.wait_policy(), WaitPolicy::default());
        assert_eq!(config.tables().full_table, "clients_full");
    }

    #[test]
    fn rejects_empty_pool() {
        let config = PipelineConfig::default().with_max_concurrent_jobs(0);
        assert!(config.validate().unwrap_err().is_input());
    }

    #[test]
    fn rejects_oversized_wait_timeout() {
        let config = PipelineConfig {
            wait_timeout_secs: u64::MAX,
            ..PipelineConfig::default()
        };
        assert!(config.validate().unwrap_err().is_input());

        let config = PipelineConfig {
            wait_timeout_secs: MAX_JOB_WAIT_TIMEOUT_SECS,
            ..PipelineConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn rejects_inverted_poll_bounds() {
        let config = PipelineConfig {
            poll_interval_ms: 60_000,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"dataset": "staging", "max_rpc_retries": 2}"#).unwrap();
        assert_eq!(config.dataset, "staging");
        assert_eq!(config.full_table, DEFAULT_FULL_TABLE);
        assert_eq!(config.wait_policy().max_rpc_retries, 2);
    }
}
