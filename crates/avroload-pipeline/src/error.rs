//! Pipeline error types.

use std::borrow::Cow;

use avroload_object::ArtifactRef;

use crate::projector::ProjectionError;

/// Boxed error source.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for pipeline operations.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Faults the pipeline reports to its caller.
///
/// Job-level and cleanup faults never appear here; they are folded into the
/// [`Verdict`](crate::Verdict) and the logs.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The request or configuration is unusable.
    #[error("invalid input: {0}")]
    InvalidInput(Cow<'static, str>),

    /// The source artifact does not conform to the source schema.
    #[error("{artifact} failed schema validation{}", describe_index(.record_index))]
    SchemaValidation {
        artifact: ArtifactRef,
        record_index: Option<u64>,
        #[source]
        source: BoxedError,
    },

    /// Writing the derived artifact failed for a reason other than the
    /// source content.
    #[error("projection of {artifact} failed: {source}")]
    Projection {
        artifact: ArtifactRef,
        #[source]
        source: ProjectionError,
    },

    /// The object store could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] avroload_object::Error),

    /// The worker pool could not run a task.
    #[error("worker failure: {message}")]
    Worker {
        message: Cow<'static, str>,
        #[source]
        source: Option<BoxedError>,
    },
}

fn describe_index(record_index: &Option<u64>) -> String {
    record_index
        .map(|index| format!(" at record {index}"))
        .unwrap_or_default()
}

impl PipelineError {
    /// Creates an input error with a message.
    pub fn invalid_input(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates a worker error with a message.
    pub fn worker(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Worker {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a worker error with a message and source.
    pub fn worker_with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Worker {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the source artifact was rejected for its content.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::SchemaValidation { .. })
    }

    /// Whether the caller supplied something unusable.
    pub const fn is_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Whether running the pipeline again for the same source may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::InvalidInput(_) | Self::SchemaValidation { .. } => false,
            Self::Storage(err) => err.is_retryable(),
            Self::Projection { .. } | Self::Worker { .. } => true,
        }
    }
}
