//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── storage: StorageConfig          # Watched bucket, GCS or local root
//! └── command
//!     ├── serve
//!     │   ├── server: ServerConfig     # Host, port, shutdown
//!     │   ├── warehouse: WarehouseArgs # BigQuery project and endpoint
//!     │   └── pipeline: PipelineConfig # Tables, pool size, wait budget
//!     ├── load --object <name>
//!     │   ├── warehouse: WarehouseArgs
//!     │   └── pipeline: PipelineConfig
//!     └── generate --prefix --files --clients
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//!
//! # Example
//!
//! ```bash
//! GCS_BUCKET=ingest BIGQUERY_PROJECT_ID=acme avroload serve --port 8080
//! ```

mod provider;
mod server;
mod storage;

use std::process;

use anyhow::Context;
use avroload_pipeline::PipelineConfig;
use clap::{Args, Parser, Subcommand};
pub use provider::{WarehouseArgs, create_warehouse};
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;
pub use storage::StorageConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "avroload")]
#[command(about = "Validates landed Avro files and loads them into BigQuery")]
#[command(version)]
pub struct Cli {
    /// Watched bucket configuration.
    #[clap(flatten)]
    pub storage: StorageConfig,

    #[command(subcommand)]
    pub command: Command,
}

/// What the binary should do.
#[derive(Debug, Clone, Subcommand, Serialize, Deserialize)]
pub enum Command {
    /// Serve the Pub/Sub push endpoint
    Serve(ServeArgs),
    /// Run the pipeline once for one object of the watched bucket
    Load(LoadArgs),
    /// Write random client files into the watched bucket
    Generate(GenerateArgs),
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct ServeArgs {
    #[clap(flatten)]
    pub server: ServerConfig,

    #[clap(flatten)]
    pub warehouse: WarehouseArgs,

    #[clap(flatten)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct LoadArgs {
    /// Object name inside the watched bucket
    #[arg(long)]
    pub object: String,

    #[clap(flatten)]
    pub warehouse: WarehouseArgs,

    #[clap(flatten)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct GenerateArgs {
    /// Object name prefix; files are named `<prefix><n>.avro`
    #[arg(long, default_value = "test")]
    pub prefix: String,

    /// Number of files to write
    #[arg(long, default_value_t = 1)]
    pub files: usize,

    /// Number of client records per file
    #[arg(long, default_value_t = 1)]
    pub clients: usize,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is read before clap parses so its values act as `env`
    /// defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Validates all configuration values before anything connects.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.storage
            .validate()
            .context("invalid storage configuration")?;

        match &self.command {
            Command::Serve(args) => {
                args.server
                    .validate()
                    .context("invalid server configuration")?;
                args.warehouse.validate()?;
                args.pipeline
                    .validate()
                    .context("invalid pipeline configuration")?;
            }
            Command::Load(args) => {
                if args.object.trim().is_empty() {
                    anyhow::bail!("object name must not be empty");
                }
                args.warehouse.validate()?;
                args.pipeline
                    .validate()
                    .context("invalid pipeline configuration")?;
            }
            Command::Generate(args) => {
                if args.files == 0 {
                    anyhow::bail!("at least one file must be generated");
                }
            }
        }
        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();
        self.storage.log();

        match &self.command {
            Command::Serve(args) => {
                args.server.log();
                args.warehouse.log();
                log_pipeline_config(&args.pipeline);
            }
            Command::Load(args) => {
                args.warehouse.log();
                log_pipeline_config(&args.pipeline);
            }
            Command::Generate(args) => {
                tracing::info!(
                    target: TRACING_TARGET_CONFIG,
                    prefix = %args.prefix,
                    files = args.files,
                    clients = args.clients,
                    "Generator configured"
                );
            }
        }
    }

    fn enabled_features() -> Vec<&'static str> {
        [
            cfg!(feature = "dotenv").then_some("dotenv"),
            cfg!(feature = "mock").then_some("mock"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

fn log_pipeline_config(config: &PipelineConfig) {
    tracing::info!(
        target: TRACING_TARGET_CONFIG,
        dataset = %config.dataset,
        full_table = %config.full_table,
        mandatory_table = %config.mandatory_table,
        max_concurrent_jobs = config.max_concurrent_jobs,
        wait_timeout_secs = config.wait_timeout_secs,
        max_rpc_retries = config.max_rpc_retries,
        "Pipeline configured"
    );
}
