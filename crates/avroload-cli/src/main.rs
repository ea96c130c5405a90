#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod handler;
mod server;

use std::process;

use anyhow::Context;
use avroload_object::ObjectStoreClient;
use avroload_pipeline::generator::generate_files;
use avroload_pipeline::{IngestPipeline, Verdict};
use tokio_util::sync::CancellationToken;

use crate::config::{Cli, Command, GenerateArgs, LoadArgs, ServeArgs, create_warehouse};
use crate::handler::{AppState, routes};

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "avroload_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "avroload_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "avroload_cli::config";
pub const TRACING_TARGET_COMMAND: &str = "avroload_cli::command";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    Cli::init_tracing();
    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "starting avroload"
    );
    cli.log();
    cli.validate()?;

    let storage = cli.storage.connect().await?;

    match cli.command {
        Command::Serve(args) => serve(storage, args).await,
        Command::Load(args) => load(storage, args).await,
        Command::Generate(args) => generate(storage, args).await,
    }
}

/// Serves the push endpoint until SIGINT or SIGTERM.
async fn serve(storage: ObjectStoreClient, args: ServeArgs) -> anyhow::Result<()> {
    storage
        .verify_reachable()
        .await
        .context("watched bucket is not reachable")?;

    let cancel = CancellationToken::new();
    let pipeline = create_pipeline(storage, &args.warehouse, &args.pipeline, cancel.clone())?;
    let router = routes(AppState::new(pipeline));

    if let Err(err) = server::serve(router, args.server, cancel).await {
        tracing::error!(
            target: TRACING_TARGET_SERVER_STARTUP,
            error_code = err.error_code(),
            recoverable = err.is_recoverable(),
            suggestion = ?err.suggestion(),
            "Push endpoint failed"
        );
        return Err(err.into());
    }
    Ok(())
}

/// Runs the pipeline once for a single object and reports the verdict.
async fn load(storage: ObjectStoreClient, args: LoadArgs) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let pipeline = create_pipeline(storage, &args.warehouse, &args.pipeline, cancel.clone())?;
    let source = pipeline.storage().artifact(args.object);

    let interrupt = tokio::spawn(server::shutdown_signal(cancel.clone()));

    let verdict = pipeline
        .process(source.clone())
        .await
        .with_context(|| format!("failed to process {source}"));
    interrupt.abort();
    let verdict = verdict?;

    report(&verdict);
    if !verdict.success {
        anyhow::bail!(
            "{} of {} load jobs for {source} did not succeed",
            verdict.failed().count(),
            verdict.outcomes.len()
        );
    }
    Ok(())
}

/// Writes random client files into the watched bucket.
async fn generate(storage: ObjectStoreClient, args: GenerateArgs) -> anyhow::Result<()> {
    let artifacts = generate_files(&storage, &args.prefix, args.files, args.clients)
        .await
        .context("failed to generate client files")?;

    for artifact in &artifacts {
        println!("{artifact}");
    }
    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        files = artifacts.len(),
        clients = args.clients,
        "Client files generated"
    );
    Ok(())
}

fn create_pipeline(
    storage: ObjectStoreClient,
    warehouse: &config::WarehouseArgs,
    pipeline: &avroload_pipeline::PipelineConfig,
    cancel: CancellationToken,
) -> anyhow::Result<IngestPipeline> {
    let warehouse = create_warehouse(warehouse)?;
    IngestPipeline::new(storage, warehouse, pipeline, cancel)
        .context("failed to create ingest pipeline")
}

fn report(verdict: &Verdict) {
    for outcome in &verdict.outcomes {
        println!(
            "{}\t{}\t{}\tcleanup: {}",
            outcome.task.table,
            outcome.job_id.as_deref().unwrap_or("-"),
            outcome.state,
            outcome.cleanup
        );
    }
}
