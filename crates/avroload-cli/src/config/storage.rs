//! Object storage configuration.

use std::path::PathBuf;

use anyhow::{Context, Result as AnyhowResult, anyhow};
use avroload_object::ObjectStoreClient;
use avroload_object::providers::{
    Client, GcsCredentials, GcsProvider, LocalCredentials, LocalProvider,
};
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Watched bucket and how to reach it.
///
/// # Environment Variables
///
/// - `GCS_BUCKET` - Bucket the notifications refer to (required)
/// - `GCS_SERVICE_ACCOUNT_KEY` - Path to a service account JSON key
/// - `GCS_ENDPOINT` - Custom endpoint, e.g. a fake GCS server
/// - `LOCAL_STORAGE_ROOT` - Serve the bucket from a local directory instead
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket watched for landed Avro files
    #[arg(long = "gcs-bucket", env = "GCS_BUCKET")]
    pub bucket: String,

    /// Path to a JSON service account key file
    #[arg(long = "gcs-service-account-key", env = "GCS_SERVICE_ACCOUNT_KEY")]
    #[serde(default)]
    pub service_account_key: Option<String>,

    /// Custom GCS endpoint URL
    #[arg(long = "gcs-endpoint", env = "GCS_ENDPOINT")]
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Directory holding one sub-directory per bucket, used instead of GCS
    #[arg(long = "local-storage-root", env = "LOCAL_STORAGE_ROOT")]
    #[serde(default)]
    pub local_root: Option<PathBuf>,
}

impl StorageConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            service_account_key: None,
            endpoint: None,
            local_root: None,
        }
    }

    /// Validates the storage settings.
    pub fn validate(&self) -> AnyhowResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(anyhow!("GCS bucket name must not be empty"));
        }
        if self.local_root.is_some() && self.endpoint.is_some() {
            return Err(anyhow!(
                "local storage root and GCS endpoint are mutually exclusive"
            ));
        }
        Ok(())
    }

    /// Credentials for the GCS provider.
    pub fn gcs_credentials(&self) -> GcsCredentials {
        GcsCredentials {
            bucket: self.bucket.clone(),
            service_account_key: self.service_account_key.clone(),
            endpoint: self.endpoint.clone(),
        }
    }

    /// Connects to the configured backend.
    pub async fn connect(&self) -> AnyhowResult<ObjectStoreClient> {
        let client = match &self.local_root {
            Some(root) => {
                let credentials = LocalCredentials {
                    bucket: self.bucket.clone(),
                    root: root.clone(),
                };
                LocalProvider::connect(&credentials)
                    .await
                    .with_context(|| format!("failed to open local storage at {}", root.display()))?
                    .into_inner()
            }
            None => GcsProvider::connect(&self.gcs_credentials())
                .await
                .context("failed to create GCS client")?
                .into_inner(),
        };
        Ok(client)
    }

    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            bucket = %self.bucket,
            backend = if self.local_root.is_some() { "local" } else { "gcs" },
            custom_endpoint = self.endpoint.is_some(),
            service_account_key = self.service_account_key.is_some(),
            "Storage configured"
        );
    }
}
