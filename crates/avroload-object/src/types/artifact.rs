//! References to stored objects.

use std::fmt;

use object_store::path::Path;
use serde::{Deserialize, Serialize};

/// Content type recorded on every Avro object the pipeline writes.
pub const AVRO_CONTENT_TYPE: &str = "application/avro";

/// Key prefix of every pipeline-owned temporary object.
pub const TEMPORARY_KEY_PREFIX: &str = "tmp_";

/// Who owns the lifetime of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Produced upstream; the pipeline never deletes it.
    #[default]
    Durable,
    /// Produced by the pipeline; deleted once its load job is terminal.
    Temporary,
}

/// Immutable reference to an object in a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    bucket: String,
    key: String,
    content_type: String,
    lifecycle: Lifecycle,
}

impl ArtifactRef {
    /// References a durable object that already exists upstream.
    pub fn durable(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            content_type: AVRO_CONTENT_TYPE.to_owned(),
            lifecycle: Lifecycle::Durable,
        }
    }

    /// References a pipeline-owned object with a fresh `tmp_<uuid>.avro` key.
    pub fn temporary(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: format!("{TEMPORARY_KEY_PREFIX}{}.avro", uuid::Uuid::now_v7()),
            content_type: AVRO_CONTENT_TYPE.to_owned(),
            lifecycle: Lifecycle::Temporary,
        }
    }

    /// Overrides the recorded content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub const fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Whether the pipeline is responsible for deleting this object.
    pub const fn is_temporary(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Temporary)
    }

    /// Returns the `gs://bucket/key` URI handed to the warehouse.
    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.key)
    }

    pub(crate) fn path(&self) -> Path {
        Path::from(self.key.as_str())
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.key)
    }
}
