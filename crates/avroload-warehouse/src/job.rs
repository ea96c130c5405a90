//! Load-job requests, handles and statuses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Destination table of a load job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.dataset, self.table)
    }
}

/// Encoding of the files a load job reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceFormat {
    /// Avro object container files.
    #[default]
    Avro,
}

impl SourceFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Avro => "AVRO",
        }
    }
}

/// A request to load one object into one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    /// Fully qualified `gs://bucket/key` URI of the file to load.
    pub source_uri: String,
    pub table: TableRef,
    pub format: SourceFormat,
}

impl LoadRequest {
    /// Creates an Avro load request.
    pub fn avro(source_uri: impl Into<String>, table: TableRef) -> Self {
        Self {
            source_uri: source_uri.into(),
            table,
            format: SourceFormat::Avro,
        }
    }
}

/// Opaque reference to a submitted job, used only for polling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    /// Region the job runs in, when the warehouse requires it for lookups.
    #[serde(default)]
    pub location: Option<String>,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.job_id)
    }
}

/// Status of a load job as last reported by the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted but not yet running.
    Pending,
    Running,
    /// Finished and the data was committed.
    Done,
    /// Finished with an error; nothing was committed.
    Failed { reason: String, message: String },
}

impl JobStatus {
    /// Whether the job will not change state again.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. })
    }
}
