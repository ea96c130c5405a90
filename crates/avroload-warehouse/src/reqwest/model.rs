//! Wire representation of the BigQuery `Job` resource (subset).

use serde::{Deserialize, Serialize};

use crate::{JobHandle, JobStatus, LoadRequest};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Job {
    pub job_reference: JobReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<JobConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobState>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobConfiguration {
    pub load: LoadConfiguration,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoadConfiguration {
    pub source_uris: Vec<String>,
    pub destination_table: TableReference,
    pub source_format: String,
    pub write_disposition: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobState {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_result: Option<ErrorProto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorProto {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

/// Envelope of a non-2xx response body.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub message: String,
}

impl Job {
    /// Builds an append-mode load job with a client-chosen id.
    pub fn load(
        project_id: &str,
        job_id: String,
        location: Option<String>,
        request: &LoadRequest,
    ) -> Self {
        Self {
            job_reference: JobReference {
                project_id: project_id.to_owned(),
                job_id,
                location,
            },
            configuration: Some(JobConfiguration {
                load: LoadConfiguration {
                    source_uris: vec![request.source_uri.clone()],
                    destination_table: TableReference {
                        project_id: project_id.to_owned(),
                        dataset_id: request.table.dataset.clone(),
                        table_id: request.table.table.clone(),
                    },
                    source_format: request.format.as_str().to_owned(),
                    write_disposition: "WRITE_APPEND".to_owned(),
                },
            }),
            status: None,
        }
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            job_id: self.job_reference.job_id.clone(),
            location: self.job_reference.location.clone(),
        }
    }

    /// Maps the wire state onto [`JobStatus`].
    ///
    /// A `DONE` job carrying an `errorResult` failed; an unknown state is
    /// reported as still pending.
    pub fn job_status(&self) -> JobStatus {
        let Some(status) = &self.status else {
            return JobStatus::Pending;
        };
        match status.state.as_str() {
            "DONE" => match &status.error_result {
                Some(error) => JobStatus::Failed {
                    reason: error.reason.clone(),
                    message: error.message.clone(),
                },
                None => JobStatus::Done,
            },
            "RUNNING" => JobStatus::Running,
            _ => JobStatus::Pending,
        }
    }
}
