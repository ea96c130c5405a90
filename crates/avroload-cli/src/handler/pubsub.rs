//! Pub/Sub push endpoint triggering the ingest pipeline.

use avroload_object::{ArtifactRef, TEMPORARY_KEY_PREFIX};
use axum::body::Bytes;
use axum::extract::State;

use super::AppState;
use super::request::PushEnvelope;
use super::response::{PushResponse, PushStatus};

/// Tracing target for push handling.
const TRACING_TARGET: &str = "avroload_cli::handler::pubsub";

/// Suffix of objects the pipeline ingests.
const AVRO_SUFFIX: &str = ".avro";

/// Decodes a Cloud Storage notification and runs the pipeline for the
/// object it names.
#[tracing::instrument(
    skip_all,
    fields(message_id = tracing::field::Empty, object = tracing::field::Empty)
)]
pub async fn receive_message(State(state): State<AppState>, body: Bytes) -> PushResponse {
    let notification = match PushEnvelope::from_slice(&body).and_then(|e| e.notification()) {
        Ok(notification) => notification,
        Err(err) => {
            tracing::error!(target: TRACING_TARGET, error = %err, "Rejected push request");
            return PushResponse::new(PushStatus::Rejected, err.to_string());
        }
    };

    let span = tracing::Span::current();
    if let Some(message_id) = &notification.message_id {
        span.record("message_id", message_id.as_str());
    }
    span.record("object", notification.name.as_str());

    tracing::info!(
        target: TRACING_TARGET,
        bucket = %notification.bucket,
        name = %notification.name,
        "Storage notification received"
    );

    if !notification.name.ends_with(AVRO_SUFFIX) {
        tracing::info!(
            target: TRACING_TARGET,
            name = %notification.name,
            "Not an Avro file, skipping"
        );
        return PushResponse::new(PushStatus::Skipped, "not an Avro file");
    }

    if notification.name.starts_with(TEMPORARY_KEY_PREFIX) {
        tracing::debug!(
            target: TRACING_TARGET,
            name = %notification.name,
            "Pipeline-owned temporary object, skipping"
        );
        return PushResponse::new(PushStatus::Skipped, "pipeline-owned temporary object");
    }

    let source = ArtifactRef::durable(notification.bucket, notification.name);
    match state.pipeline().process(source).await {
        Ok(verdict) => {
            let response = PushResponse::from_verdict(&verdict);
            if !verdict.success {
                tracing::error!(
                    target: TRACING_TARGET,
                    failed = verdict.failed().count(),
                    "Error during data load to BigQuery"
                );
            }
            response
        }
        Err(err) if err.is_validation() => {
            tracing::error!(
                target: TRACING_TARGET,
                error = %err,
                "Avro file validation failed, acknowledging"
            );
            PushResponse::new(PushStatus::Invalid, err.to_string())
        }
        Err(err) if err.is_retryable() => {
            tracing::error!(target: TRACING_TARGET, error = %err, "Pipeline run failed");
            PushResponse::new(PushStatus::Failed, err.to_string())
        }
        Err(err) => {
            tracing::error!(target: TRACING_TARGET, error = %err, "Pipeline rejected the object");
            PushResponse::new(PushStatus::Rejected, err.to_string())
        }
    }
}
