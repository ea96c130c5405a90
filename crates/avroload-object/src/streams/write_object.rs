//! Buffered multipart writer that uploads an object as it is produced.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use object_store::buffered::BufWriter;
use object_store::{Attribute, Attributes, ObjectStore};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::TRACING_TARGET;
use crate::types::{ArtifactRef, Error, Result};

/// Size of each uploaded part: 2 MiB.
pub const DEFAULT_PART_SIZE: usize = 2 * 1024 * 1024;

/// [`AsyncWrite`] that streams into a new object.
///
/// The object only becomes visible once [`finish`](Self::finish) (or
/// `AsyncWriteExt::shutdown`) completes. [`abort`](Self::abort) discards any
/// uploaded parts.
pub struct ObjectWriter {
    inner: BufWriter,
    artifact: ArtifactRef,
}

impl ObjectWriter {
    pub(crate) fn new(
        store: Arc<dyn ObjectStore>,
        artifact: ArtifactRef,
        content_type: bool,
    ) -> Self {
        let mut inner = BufWriter::with_capacity(store, artifact.path(), DEFAULT_PART_SIZE);
        if content_type {
            let mut attributes = Attributes::new();
            attributes.insert(
                Attribute::ContentType,
                artifact.content_type().to_owned().into(),
            );
            inner = inner.with_attributes(attributes);
        }
        Self { inner, artifact }
    }

    /// The object being written.
    pub fn artifact(&self) -> &ArtifactRef {
        &self.artifact
    }

    /// Flushes remaining bytes and completes the upload.
    pub async fn finish(mut self) -> Result<ArtifactRef> {
        self.inner.shutdown().await?;
        tracing::debug!(
            target: TRACING_TARGET,
            artifact = %self.artifact,
            "Object upload finalized"
        );
        Ok(self.artifact)
    }

    /// Discards the upload without creating the object.
    pub async fn abort(mut self) -> Result<()> {
        tracing::debug!(
            target: TRACING_TARGET,
            artifact = %self.artifact,
            "Aborting object upload"
        );
        self.inner.abort().await.map_err(Error::from)
    }
}

impl std::fmt::Debug for ObjectWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectWriter")
            .field("artifact", &self.artifact)
            .finish_non_exhaustive()
    }
}

impl AsyncWrite for ObjectWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
