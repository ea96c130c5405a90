//! End-to-end runs of the ingest pipeline against in-memory collaborators.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use apache_avro::{Reader, Schema, from_value};
use avroload_object::providers::{Client as _, LocalCredentials, LocalProvider};
use avroload_object::{ArtifactRef, ObjectStoreClient};
use avroload_pipeline::generator::{random_clients, write_container};
use avroload_pipeline::schema::{
    CLIENT_MANDATORY_SCHEMA, ClientMandatory, ClientProjection, RecordProjection,
};
use avroload_pipeline::{CleanupOutcome, IngestPipeline, PipelineConfig, PipelineError, WaitState};
use avroload_warehouse::mock::{MockBehavior, MockWarehouse};
use avroload_warehouse::{
    JobHandle, JobStatus, LoadRequest, Result as WarehouseResult, WarehouseProvider,
    WarehouseService,
};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{
    GetOptions, GetResult, GetResultPayload, ListResult, MultipartUpload, ObjectMeta, ObjectStore,
    PutMultipartOptions, PutOptions, PutPayload, PutResult,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

const BUCKET: &str = "gcp_avro_processor_input_bucket";

fn storage() -> ObjectStoreClient {
    ObjectStoreClient::new(InMemory::new(), BUCKET)
}

fn pipeline(storage: &ObjectStoreClient, warehouse: &MockWarehouse) -> IngestPipeline {
    IngestPipeline::new(
        storage.clone(),
        warehouse.clone().into_service(),
        &PipelineConfig::default(),
        CancellationToken::new(),
    )
    .unwrap()
}

async fn upload_clients(storage: &ObjectStoreClient, key: &str, count: usize) -> ArtifactRef {
    let projection = ClientProjection::new().unwrap();
    let clients = random_clients(&mut rand::thread_rng(), count);
    let body = write_container(projection.source_schema(), &clients, Vec::new()).unwrap();
    let source = storage.artifact(key);
    storage.put(&source, Bytes::from(body)).await.unwrap();
    source
}

async fn keys(storage: &ObjectStoreClient) -> Vec<String> {
    let mut keys: Vec<String> = storage
        .list("")
        .await
        .unwrap()
        .into_iter()
        .map(|meta| meta.location.to_string())
        .collect();
    keys.sort();
    keys
}

#[tokio::test(flavor = "multi_thread")]
async fn conformant_file_loads_both_tables() {
    let storage = storage();
    let warehouse = MockWarehouse::new();
    let source = upload_clients(&storage, "clients0.avro", 5).await;

    let verdict = pipeline(&storage, &warehouse)
        .process(source.clone())
        .await
        .unwrap();

    assert!(verdict.success);
    assert_eq!(verdict.outcomes.len(), 2);

    let full = &verdict.outcomes[0];
    assert_eq!(full.task.artifact, source);
    assert_eq!(full.task.table.table, "clients_full");
    assert!(!full.task.temporary);
    assert_eq!(full.cleanup, CleanupOutcome::Skipped);

    let mandatory = &verdict.outcomes[1];
    assert!(mandatory.task.temporary);
    assert!(mandatory.task.artifact.key().starts_with("tmp_"));
    assert!(mandatory.task.artifact.key().ends_with(".avro"));
    assert_eq!(mandatory.task.table.table, "clients_mandatory");
    assert_eq!(mandatory.cleanup, CleanupOutcome::Deleted);

    let submissions = warehouse.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].source_uri, format!("gs://{BUCKET}/clients0.avro"));
    assert_eq!(submissions[0].table.dataset, "clients_dataset");
    assert_eq!(submissions[1].source_uri, mandatory.task.artifact.uri());

    assert_eq!(keys(&storage).await, vec!["clients0.avro".to_owned()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn derived_artifact_holds_mandatory_fields() {
    let storage = storage();
    let source = upload_clients(&storage, "clients0.avro", 5).await;
    let projection = std::sync::Arc::new(ClientProjection::new().unwrap());

    let (derived, summary) = avroload_pipeline::project_artifact(&storage, projection, &source)
        .await
        .unwrap();
    assert_eq!(summary.records, 5);

    let schema = Schema::parse_str(CLIENT_MANDATORY_SCHEMA).unwrap();
    let body = storage.get(&derived).await.unwrap();
    let records: Vec<ClientMandatory> = Reader::with_schema(&schema, &body[..])
        .unwrap()
        .map(|v| from_value(&v.unwrap()).unwrap())
        .collect();
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.name.len() == 10));
}

#[tokio::test(flavor = "multi_thread")]
async fn corrupt_file_submits_nothing() {
    let storage = storage();
    let warehouse = MockWarehouse::new();
    let source = storage.artifact("broken.avro");
    storage
        .put(&source, Bytes::from_static(b"invalid avro file content"))
        .await
        .unwrap();

    let err = pipeline(&storage, &warehouse)
        .process(source)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(warehouse.submissions().is_empty());
    assert_eq!(keys(&storage).await, vec!["broken.avro".to_owned()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_deep_into_large_file_removes_partial_output() {
    let storage = storage();
    let warehouse = MockWarehouse::new();
    let projection = ClientProjection::new().unwrap();
    let clients = random_clients(&mut rand::thread_rng(), 200_000);
    let mut body = write_container(projection.source_schema(), &clients, Vec::new()).unwrap();
    // Cut three quarters in and announce one more block that never arrives.
    body.truncate(body.len() * 3 / 4);
    body.push(0x02);
    let source = storage.artifact("clients0.avro");
    storage.put(&source, Bytes::from(body)).await.unwrap();

    let err = pipeline(&storage, &warehouse)
        .process(source)
        .await
        .unwrap_err();

    match &err {
        PipelineError::SchemaValidation { record_index, .. } => {
            assert!(record_index.is_some_and(|index| index > 100_000));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(warehouse.submissions().is_empty());
    assert_eq!(keys(&storage).await, vec!["clients0.avro".to_owned()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn broken_download_is_a_retryable_storage_fault() {
    let source_key = "clients0.avro";
    let storage = ObjectStoreClient::new(
        BrokenDownloads {
            inner: InMemory::new(),
            key: Path::from(source_key),
        },
        BUCKET,
    );
    let warehouse = MockWarehouse::new();
    let source = upload_clients(&storage, source_key, 2000).await;

    let err = pipeline(&storage, &warehouse)
        .process(source)
        .await
        .unwrap_err();

    assert!(!err.is_validation(), "{err}");
    assert!(err.is_retryable(), "{err}");
    assert!(matches!(err, PipelineError::Storage(_)));
    assert!(warehouse.submissions().is_empty());
    assert_eq!(keys(&storage).await, vec![source_key.to_owned()]);
}

/// In-memory store whose downloads of one object stop halfway with a
/// transport error.
#[derive(Debug)]
struct BrokenDownloads {
    inner: InMemory,
    key: Path,
}

impl fmt::Display for BrokenDownloads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BrokenDownloads({})", self.key)
    }
}

#[async_trait::async_trait]
impl ObjectStore for BrokenDownloads {
    async fn put_opts(
        &self,
        location: &Path,
        payload: PutPayload,
        opts: PutOptions,
    ) -> object_store::Result<PutResult> {
        self.inner.put_opts(location, payload, opts).await
    }

    async fn put_multipart_opts(
        &self,
        location: &Path,
        opts: PutMultipartOptions,
    ) -> object_store::Result<Box<dyn MultipartUpload>> {
        self.inner.put_multipart_opts(location, opts).await
    }

    async fn get_opts(
        &self,
        location: &Path,
        options: GetOptions,
    ) -> object_store::Result<GetResult> {
        let result = self.inner.get_opts(location, options).await?;
        if *location != self.key {
            return Ok(result);
        }

        let meta = result.meta.clone();
        let range = result.range.clone();
        let attributes = result.attributes.clone();
        let body = result.bytes().await?;
        let chunks = vec![
            Ok(body.slice(..body.len() / 2)),
            Err(object_store::Error::Generic {
                store: "BrokenDownloads",
                source: "connection reset by peer".into(),
            }),
        ];

        Ok(GetResult {
            payload: GetResultPayload::Stream(futures::stream::iter(chunks).boxed()),
            meta,
            range,
            attributes,
        })
    }

    async fn delete(&self, location: &Path) -> object_store::Result<()> {
        self.inner.delete(location).await
    }

    fn list(&self, prefix: Option<&Path>) -> BoxStream<'static, object_store::Result<ObjectMeta>> {
        self.inner.list(prefix)
    }

    async fn list_with_delimiter(&self, prefix: Option<&Path>) -> object_store::Result<ListResult> {
        self.inner.list_with_delimiter(prefix).await
    }

    async fn copy(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy(from, to).await
    }

    async fn copy_if_not_exists(&self, from: &Path, to: &Path) -> object_store::Result<()> {
        self.inner.copy_if_not_exists(from, to).await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_job_fails_verdict_and_still_cleans_up() {
    let storage = storage();
    let warehouse = MockWarehouse::new()
        .with_table("clients_mandatory", MockBehavior::fail("invalid", "schema mismatch"));
    let source = upload_clients(&storage, "clients0.avro", 5).await;

    let verdict = pipeline(&storage, &warehouse).process(source).await.unwrap();

    assert!(!verdict.success);
    assert!(verdict.outcomes[0].success);
    let mandatory = &verdict.outcomes[1];
    assert_eq!(
        mandatory.state,
        WaitState::DoneError {
            detail: "invalid: schema mismatch".to_owned()
        }
    );
    assert_eq!(mandatory.cleanup, CleanupOutcome::Deleted);
    assert_eq!(keys(&storage).await, vec!["clients0.avro".to_owned()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn cleanup_failure_does_not_change_verdict() {
    let root = tempfile::tempdir().unwrap();
    let credentials = LocalCredentials {
        bucket: BUCKET.to_owned(),
        root: root.path().to_path_buf(),
    };
    let storage = LocalProvider::connect(&credentials)
        .await
        .unwrap()
        .into_inner();
    let source = upload_clients(&storage, "clients0.avro", 5).await;

    // Removes the projection behind the pipeline's back before cleanup runs.
    let warehouse = SabotagingWarehouse {
        inner: MockWarehouse::new(),
        storage: storage.clone(),
    };
    let pipeline = IngestPipeline::new(
        storage.clone(),
        WarehouseService::new(warehouse),
        &PipelineConfig::default(),
        CancellationToken::new(),
    )
    .unwrap();

    let verdict = pipeline.process(source).await.unwrap();

    assert!(verdict.success);
    assert!(matches!(verdict.outcomes[1].cleanup, CleanupOutcome::Failed(_)));
}

/// Deletes temporary artifacts as soon as their load is submitted.
struct SabotagingWarehouse {
    inner: MockWarehouse,
    storage: ObjectStoreClient,
}

#[async_trait::async_trait]
impl WarehouseProvider for SabotagingWarehouse {
    async fn submit_load(&self, request: &LoadRequest) -> WarehouseResult<JobHandle> {
        if let Some(key) = request.source_uri.rsplit('/').next()
            && key.starts_with("tmp_")
        {
            self.storage
                .delete(&self.storage.artifact(key))
                .await
                .unwrap();
        }
        self.inner.submit_load(request).await
    }

    async fn poll_status(&self, handle: &JobHandle) -> WarehouseResult<JobStatus> {
        self.inner.poll_status(handle).await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_interrupts_waiting_jobs() {
    let storage = storage();
    let warehouse = MockWarehouse::new().with_default(MockBehavior::Hang);
    let source = upload_clients(&storage, "clients0.avro", 5).await;
    let cancel = CancellationToken::new();
    let pipeline = IngestPipeline::new(
        storage.clone(),
        warehouse.clone().into_service(),
        &PipelineConfig::default(),
        cancel.clone(),
    )
    .unwrap();

    let run = tokio::spawn(async move { pipeline.process(source).await });
    while warehouse.submissions().len() < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();

    let verdict = run.await.unwrap().unwrap();
    assert!(!verdict.success);
    assert!(
        verdict
            .outcomes
            .iter()
            .all(|o| matches!(o.state, WaitState::Interrupted { .. }))
    );
    assert_eq!(keys(&storage).await, vec!["clients0.avro".to_owned()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn abandoned_run_removes_projection() {
    let storage = storage();
    let submitted = Arc::new(Notify::new());
    let warehouse = StalledWarehouse {
        submitted: submitted.clone(),
    };
    let source = upload_clients(&storage, "clients0.avro", 5).await;
    let pipeline = IngestPipeline::new(
        storage.clone(),
        WarehouseService::new(warehouse),
        &PipelineConfig::default(),
        CancellationToken::new(),
    )
    .unwrap();

    let run = tokio::spawn(async move { pipeline.process(source).await });
    submitted.notified().await;
    assert_eq!(keys(&storage).await.len(), 2);

    run.abort();
    assert!(run.await.unwrap_err().is_cancelled());

    for _ in 0..100 {
        if keys(&storage).await == ["clients0.avro"] {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("projection left behind: {:?}", keys(&storage).await);
}

/// Accepts no submission: every call blocks until the caller goes away.
struct StalledWarehouse {
    submitted: Arc<Notify>,
}

#[async_trait::async_trait]
impl WarehouseProvider for StalledWarehouse {
    async fn submit_load(&self, _request: &LoadRequest) -> WarehouseResult<JobHandle> {
        self.submitted.notify_one();
        std::future::pending().await
    }

    async fn poll_status(&self, _handle: &JobHandle) -> WarehouseResult<JobStatus> {
        std::future::pending().await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn short_budget_times_out() {
    let storage = storage();
    let warehouse = MockWarehouse::new().with_table("clients_full", MockBehavior::Hang);
    let source = upload_clients(&storage, "clients0.avro", 5).await;
    let config = PipelineConfig {
        wait_timeout_secs: 1,
        poll_interval_ms: 100,
        max_poll_interval_secs: 1,
        ..PipelineConfig::default()
    };
    let pipeline = IngestPipeline::new(
        storage.clone(),
        warehouse.clone().into_service(),
        &config,
        CancellationToken::new(),
    )
    .unwrap();

    let verdict = pipeline.process(source).await.unwrap();

    assert!(!verdict.success);
    assert_eq!(verdict.outcomes[0].state, WaitState::TimedOut);
    assert!(verdict.outcomes[1].success);
}

#[tokio::test(flavor = "multi_thread")]
async fn reprocessing_creates_new_jobs() {
    let storage = storage();
    let warehouse = MockWarehouse::new();
    let source = upload_clients(&storage, "clients0.avro", 3).await;
    let pipeline = pipeline(&storage, &warehouse);

    assert!(pipeline.process(source.clone()).await.unwrap().success);
    assert!(pipeline.process(source).await.unwrap().success);

    assert_eq!(warehouse.submissions().len(), 4);
    assert_eq!(keys(&storage).await, vec!["clients0.avro".to_owned()]);
}
