//! Replies to Pub/Sub push requests.

use std::borrow::Cow;

use avroload_pipeline::{TaskOutcome, Verdict};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// How a push request was handled.
///
/// The status code tells Pub/Sub what to do with the message: 2xx
/// acknowledges it, 4xx sends it to the dead-letter topic after the
/// configured attempts, 5xx asks for redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    /// Both load jobs succeeded.
    Loaded,
    /// The object is not something the pipeline ingests.
    Skipped,
    /// The file failed schema validation; redelivery would not help.
    Invalid,
    /// The envelope or notification was unusable.
    Rejected,
    /// At least one load job did not succeed.
    LoadFailed,
    /// A storage or worker fault that may clear up on redelivery.
    Failed,
}

impl PushStatus {
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::Loaded | Self::Skipped | Self::Invalid => StatusCode::OK,
            Self::Rejected | Self::LoadFailed => StatusCode::BAD_REQUEST,
            Self::Failed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Per-job line of a push reply.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub state: String,
    pub cleanup: String,
    pub success: bool,
}

impl From<&TaskOutcome> for JobReport {
    fn from(outcome: &TaskOutcome) -> Self {
        Self {
            table: outcome.task.table.to_string(),
            job_id: outcome.job_id.clone(),
            state: outcome.state.to_string(),
            cleanup: outcome.cleanup.to_string(),
            success: outcome.success,
        }
    }
}

/// JSON reply to a push request.
#[must_use = "responses do nothing unless returned"]
#[derive(Debug, Clone, Serialize)]
pub struct PushResponse {
    pub status: PushStatus,
    pub message: Cow<'static, str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<JobReport>,
}

impl PushResponse {
    pub fn new(status: PushStatus, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            message: message.into(),
            jobs: Vec::new(),
        }
    }

    /// Builds the reply for a completed pipeline run.
    pub fn from_verdict(verdict: &Verdict) -> Self {
        let (status, message) = if verdict.success {
            (PushStatus::Loaded, "loaded into both tables")
        } else {
            (PushStatus::LoadFailed, "error during data load to BigQuery")
        };
        Self {
            jobs: verdict.outcomes.iter().map(JobReport::from).collect(),
            ..Self::new(status, message)
        }
    }

    pub const fn status_code(&self) -> StatusCode {
        self.status.status_code()
    }
}

impl IntoResponse for PushResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}
