//! Composition of projection, dispatch, waiting and cleanup.

use std::sync::Arc;

use avroload_object::{ArtifactRef, ObjectStoreClient};
use avroload_warehouse::WarehouseService;
use tokio_util::sync::CancellationToken;

use crate::aggregate::{Verdict, aggregate};
use crate::cleanup::CleanupCoordinator;
use crate::config::PipelineConfig;
use crate::dispatcher::JobDispatcher;
use crate::error::{PipelineError, Result};
use crate::projector::project_artifact;
use crate::schema::{ClientProjection, RecordProjection};
use crate::task::{TableNames, build_load_tasks, check_artifact};
use crate::waiter::JobWaiter;

/// Tracing target for the pipeline entry point.
pub const TRACING_TARGET: &str = "avroload_pipeline";

/// Validates a landed file, derives its projection and loads both into the
/// warehouse.
///
/// Clients are injected; the pipeline owns only its worker pool. Cloning
/// shares the pool.
#[derive(Debug)]
pub struct IngestPipeline<P = ClientProjection> {
    storage: ObjectStoreClient,
    projection: Arc<P>,
    tables: TableNames,
    dispatcher: JobDispatcher,
}

impl<P> Clone for IngestPipeline<P> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            projection: self.projection.clone(),
            tables: self.tables.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl IngestPipeline<ClientProjection> {
    /// Creates a pipeline projecting `example.gcp.Client` files.
    ///
    /// `cancel` interrupts every in-flight wait when triggered.
    pub fn new(
        storage: ObjectStoreClient,
        warehouse: WarehouseService,
        config: &PipelineConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let projection = ClientProjection::new().map_err(|e| {
            PipelineError::worker_with_source("failed to parse client schemas", e)
        })?;
        Self::with_projection(storage, warehouse, config, cancel, projection)
    }
}

impl<P: RecordProjection> IngestPipeline<P> {
    /// Creates a pipeline with a custom projection.
    pub fn with_projection(
        storage: ObjectStoreClient,
        warehouse: WarehouseService,
        config: &PipelineConfig,
        cancel: CancellationToken,
        projection: P,
    ) -> Result<Self> {
        config.validate()?;

        let waiter = JobWaiter::new(warehouse, config.wait_policy(), cancel);
        let cleanup = CleanupCoordinator::new(storage.clone());
        let dispatcher = JobDispatcher::new(waiter, cleanup, config.max_concurrent_jobs);

        tracing::debug!(
            target: TRACING_TARGET,
            bucket = storage.bucket(),
            dataset = %config.dataset,
            max_concurrent_jobs = config.max_concurrent_jobs,
            "Ingest pipeline created"
        );

        Ok(Self {
            storage,
            projection: Arc::new(projection),
            tables: config.tables(),
            dispatcher,
        })
    }

    pub fn storage(&self) -> &ObjectStoreClient {
        &self.storage
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Runs the pipeline for one landed file.
    ///
    /// Returns `Err` for input, validation, storage and pool faults, in which
    /// case nothing was loaded. Job failures are reported through the
    /// verdict.
    #[tracing::instrument(
        name = "pipeline.process",
        skip(self),
        fields(source = %source),
        target = TRACING_TARGET
    )]
    pub async fn process(&self, source: ArtifactRef) -> Result<Verdict> {
        self.check_source(&source)?;

        let (derived, summary) =
            project_artifact(&self.storage, self.projection.clone(), &source).await?;

        tracing::info!(
            target: TRACING_TARGET,
            source = %source,
            artifact = %derived,
            records = summary.records,
            "Source validated"
        );

        let pending = self.dispatcher.cleanup().guard(derived.clone());
        let [durable, temporary] = match build_load_tasks(&source, &derived, &self.tables) {
            Ok(tasks) => tasks,
            Err(err) => {
                pending.discard().await;
                return Err(err);
            }
        };

        let first = match self.dispatcher.dispatch(durable).await {
            Ok(handle) => handle,
            Err(err) => {
                pending.discard().await;
                return Err(err);
            }
        };
        // The temporary task guards its own artifact from here on.
        pending.release();
        let second = self.dispatcher.dispatch(temporary).await;

        let handles = match second {
            Ok(second) => vec![first, second],
            Err(err) => {
                // Dispatched work still completes and cleans up on its own.
                drop(first);
                return Err(err);
            }
        };

        aggregate(handles).await
    }

    fn check_source(&self, source: &ArtifactRef) -> Result<()> {
        check_artifact(source)?;
        if source.is_temporary() {
            return Err(PipelineError::invalid_input(format!(
                "{source} is a temporary artifact"
            )));
        }
        if source.bucket() != self.storage.bucket() {
            return Err(PipelineError::invalid_input(format!(
                "{source} is outside the watched bucket {}",
                self.storage.bucket()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use avroload_warehouse::mock::MockWarehouse;
    use object_store::memory::InMemory;

    use super::*;

    fn pipeline() -> IngestPipeline {
        IngestPipeline::new(
            ObjectStoreClient::new(InMemory::new(), "ingest"),
            MockWarehouse::new().into_service(),
            &PipelineConfig::default(),
            CancellationToken::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn foreign_bucket_is_an_input_fault() {
        let err = pipeline()
            .process(ArtifactRef::durable("elsewhere", "clients0.avro"))
            .await
            .unwrap_err();
        assert!(err.is_input());
    }

    #[tokio::test]
    async fn temporary_source_is_an_input_fault() {
        let err = pipeline()
            .process(ArtifactRef::temporary("ingest"))
            .await
            .unwrap_err();
        assert!(err.is_input());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = IngestPipeline::new(
            ObjectStoreClient::new(InMemory::new(), "ingest"),
            MockWarehouse::new().into_service(),
            &PipelineConfig::default().with_tables("", "a", "b"),
            CancellationToken::new(),
        )
        .unwrap_err();
        assert!(err.is_input());
    }
}
