//! Liveness of the push endpoint and its object store.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use super::AppState;

/// Tracing target for health checks.
const TRACING_TARGET: &str = "avroload_cli::handler::monitors";

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub is_healthy: bool,
    pub bucket: String,
}

/// Reports healthy when the watched bucket answers.
#[tracing::instrument(skip_all)]
pub async fn health_status(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let storage = state.pipeline().storage();
    let is_healthy = match storage.verify_reachable().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                target: TRACING_TARGET,
                bucket = storage.bucket(),
                error = %err,
                "Object store unreachable"
            );
            false
        }
    };

    let status_code = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    tracing::debug!(
        target: TRACING_TARGET,
        is_healthy,
        status_code = status_code.as_u16(),
        "Health status response prepared"
    );

    let body = HealthStatus {
        is_healthy,
        bucket: storage.bucket().to_owned(),
    };
    (status_code, Json(body))
}

#[cfg(test)]
mod tests {
    use avroload_warehouse::mock::MockWarehouse;
    use axum::http::StatusCode;

    use crate::handler::test::{BUCKET, create_test_server};

    #[tokio::test]
    async fn healthy_when_bucket_answers() -> anyhow::Result<()> {
        let (server, _) = create_test_server(&MockWarehouse::new())?;

        let response = server.get("/health").await;
        response.assert_status(StatusCode::OK);

        let body: serde_json::Value = response.json();
        assert_eq!(body["is_healthy"], true);
        assert_eq!(body["bucket"], BUCKET);
        Ok(())
    }
}
