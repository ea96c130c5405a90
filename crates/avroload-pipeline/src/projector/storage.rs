//! Projection between two stored objects.

use std::io::BufReader;
use std::sync::Arc;

use avroload_object::{ArtifactRef, ObjectStoreClient};
use tokio_util::io::SyncIoBridge;

use super::{ProjectionError, ProjectionSummary, SyncMarker, TRACING_TARGET, project};
use crate::error::{PipelineError, Result};
use crate::schema::RecordProjection;

/// Projects `source` into a new temporary object in the same bucket.
///
/// The codec runs on a blocking thread bridged to the object streams. The
/// derived artifact is returned only after its upload has been finalized.
/// On any failure the upload is aborted and the derived object deleted
/// before the error is returned.
#[tracing::instrument(
    name = "projector.project_artifact",
    skip(storage, projection),
    fields(source = %source, artifact),
    target = TRACING_TARGET
)]
pub async fn project_artifact<P: RecordProjection>(
    storage: &ObjectStoreClient,
    projection: Arc<P>,
    source: &ArtifactRef,
) -> Result<(ArtifactRef, ProjectionSummary)> {
    let reader = storage.open_read(source).await?;
    let target = storage.temporary_artifact();
    tracing::Span::current().record("artifact", tracing::field::display(&target));
    let writer = storage.open_write(&target)?;

    let marker = SyncMarker::derive(&source.uri());
    let input = SyncIoBridge::new(reader);
    let output = SyncIoBridge::new(writer);

    let joined = tokio::task::spawn_blocking(move || {
        let mut output = output;
        let result = project(&*projection, BufReader::new(input), &mut output, marker);
        (result, output)
    })
    .await;

    let (result, output) = match joined {
        Ok(parts) => parts,
        Err(join_error) => {
            discard(storage, &target).await;
            return Err(PipelineError::worker_with_source(
                "projection task failed",
                join_error,
            ));
        }
    };

    let writer = output.into_inner();
    let summary = match result {
        Ok(summary) => summary,
        Err(err) => {
            if let Err(abort_error) = writer.abort().await {
                tracing::warn!(
                    target: TRACING_TARGET,
                    artifact = %target,
                    error = %abort_error,
                    "Failed to abort partial upload"
                );
            }
            discard(storage, &target).await;
            return Err(into_pipeline_error(err, source));
        }
    };

    if let Err(err) = writer.finish().await {
        discard(storage, &target).await;
        return Err(err.into());
    }

    tracing::info!(
        target: TRACING_TARGET,
        source = %source,
        artifact = %target,
        records = summary.records,
        "Projection completed"
    );

    Ok((target, summary))
}

/// Best-effort removal of a partially written derived object.
async fn discard(storage: &ObjectStoreClient, target: &ArtifactRef) {
    match storage.delete(target).await {
        Ok(()) => {}
        Err(err) if err.is_not_found() => {}
        Err(err) => tracing::warn!(
            target: TRACING_TARGET,
            artifact = %target,
            error = %err,
            "Failed to delete partial projection output"
        ),
    }
}

fn into_pipeline_error(err: ProjectionError, source: &ArtifactRef) -> PipelineError {
    match err {
        ProjectionError::Decode {
            record_index,
            source: cause,
        } => {
            tracing::warn!(
                target: TRACING_TARGET,
                source = %source,
                record_index = ?record_index,
                error = %cause,
                "Source failed schema validation"
            );
            PipelineError::SchemaValidation {
                artifact: source.clone(),
                record_index,
                source: Box::new(cause),
            }
        }
        ProjectionError::Read(cause) => {
            tracing::warn!(
                target: TRACING_TARGET,
                source = %source,
                error = %cause,
                "Source stream failed during projection"
            );
            PipelineError::Storage(cause.into())
        }
        other => PipelineError::Projection {
            artifact: source.clone(),
            source: other,
        },
    }
}
