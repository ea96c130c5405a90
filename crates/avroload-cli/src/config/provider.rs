//! Warehouse provider configuration.

use anyhow::{Context, anyhow};
use avroload_warehouse::WarehouseService;
use avroload_warehouse::reqwest::{BigQueryClient, BigQueryConfig};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// BigQuery connection settings.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct WarehouseArgs {
    #[clap(flatten)]
    pub bigquery: BigQueryConfig,

    /// Answer load jobs from an in-memory warehouse instead of BigQuery
    #[cfg(feature = "mock")]
    #[arg(long, env = "MOCK_WAREHOUSE", default_value_t = false)]
    #[serde(default)]
    pub mock_warehouse: bool,
}

impl WarehouseArgs {
    /// Validates the warehouse settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bigquery.project_id.trim().is_empty() {
            return Err(anyhow!("BigQuery project id must not be empty"));
        }
        Ok(())
    }

    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            project_id = %self.bigquery.project_id,
            endpoint = %self.bigquery.endpoint,
            location = ?self.bigquery.location,
            access_token = self.bigquery.access_token.is_some(),
            http_timeout_secs = self.bigquery.http_timeout,
            "Warehouse configured"
        );
    }
}

/// Creates the warehouse service from CLI configuration.
///
/// # Errors
///
/// Returns an error if the BigQuery HTTP client cannot be built.
pub fn create_warehouse(args: &WarehouseArgs) -> anyhow::Result<WarehouseService> {
    #[cfg(feature = "mock")]
    if args.mock_warehouse {
        tracing::warn!(
            target: TRACING_TARGET_CONFIG,
            "Using the in-memory warehouse, nothing is loaded into BigQuery"
        );
        return Ok(avroload_warehouse::mock::MockWarehouse::new().into_service());
    }

    let client =
        BigQueryClient::new(args.bigquery.clone()).context("failed to create BigQuery client")?;
    Ok(client.into_service())
}
