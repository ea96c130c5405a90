//! Bucket-scoped object-store client backed by [`object_store::ObjectStore`].
//!
//! [`ObjectStoreClient`] is a thin, cloneable wrapper around
//! `Arc<dyn ObjectStore>` bound to one bucket. Every operation is keyed by an
//! [`ArtifactRef`] and instrumented with [`tracing`].

use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{Attribute, ObjectMeta, ObjectStore, PutOptions, PutPayload};

use crate::TRACING_TARGET;
use crate::streams::{ObjectReader, ObjectWriter};
use crate::types::{ArtifactRef, Error, Result};

mod put_output;

pub use put_output::PutOutput;

/// Cloneable handle to an [`ObjectStore`] backend serving a single bucket.
#[derive(Clone, Debug)]
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    bucket: Arc<str>,
    content_types: bool,
}

impl ObjectStoreClient {
    /// Wrap a concrete [`ObjectStore`] implementation serving `bucket`.
    pub fn new(store: impl ObjectStore, bucket: impl Into<Arc<str>>) -> Self {
        Self::from_arc(Arc::new(store), bucket)
    }

    /// Wrap an already shared [`ObjectStore`].
    pub fn from_arc(store: Arc<dyn ObjectStore>, bucket: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            content_types: true,
        }
    }

    /// Stops sending content-type attributes, for backends that reject them
    /// (the local filesystem store).
    #[must_use]
    pub fn without_content_types(mut self) -> Self {
        self.content_types = false;
        self
    }

    /// Name of the bucket this client serves.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// References a durable object in this bucket.
    pub fn artifact(&self, key: impl Into<String>) -> ArtifactRef {
        ArtifactRef::durable(self.bucket.as_ref(), key)
    }

    /// References a fresh temporary object in this bucket.
    pub fn temporary_artifact(&self) -> ArtifactRef {
        ArtifactRef::temporary(self.bucket.as_ref())
    }

    /// Verify that the backing store is reachable.
    ///
    /// Issues a HEAD for a probe key; a not-found response means the bucket
    /// answered and counts as success.
    #[tracing::instrument(name = "object.verify", skip(self), fields(bucket = %self.bucket))]
    pub async fn verify_reachable(&self) -> Result<()> {
        let path = Path::from("_avroload_verify_probe");
        match self.store.head(&path).await {
            Ok(_) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// List objects whose key starts with `prefix`.
    #[tracing::instrument(name = "object.list", skip(self), fields(bucket = %self.bucket))]
    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let prefix = (!prefix.is_empty()).then(|| Path::from(prefix));
        Ok(self.store.list(prefix.as_ref()).try_collect().await?)
    }

    /// Get object metadata without downloading the body.
    #[tracing::instrument(name = "object.head", skip(self), fields(artifact = %artifact))]
    pub async fn head(&self, artifact: &ArtifactRef) -> Result<ObjectMeta> {
        self.check_bucket(artifact)?;
        Ok(self.store.head(&artifact.path()).await?)
    }

    /// Download the whole object into memory.
    #[tracing::instrument(name = "object.get", skip(self), fields(artifact = %artifact))]
    pub async fn get(&self, artifact: &ArtifactRef) -> Result<Bytes> {
        self.check_bucket(artifact)?;
        let result = self.store.get(&artifact.path()).await?;
        Ok(result.bytes().await?)
    }

    /// Upload `data` in a single request, overwriting any existing object.
    #[tracing::instrument(name = "object.put", skip(self, data), fields(artifact = %artifact, size = data.len()))]
    pub async fn put(&self, artifact: &ArtifactRef, data: Bytes) -> Result<PutOutput> {
        self.check_bucket(artifact)?;
        let mut opts = PutOptions::default();
        if self.content_types {
            opts.attributes.insert(
                Attribute::ContentType,
                artifact.content_type().to_owned().into(),
            );
        }
        let result = self
            .store
            .put_opts(&artifact.path(), PutPayload::from(data), opts)
            .await?;
        Ok(result.into())
    }

    /// Open a streaming reader over the object body.
    #[tracing::instrument(name = "object.open_read", skip(self), fields(artifact = %artifact))]
    pub async fn open_read(&self, artifact: &ArtifactRef) -> Result<ObjectReader> {
        self.check_bucket(artifact)?;
        let result = self.store.get(&artifact.path()).await?;
        let reader = ObjectReader::new(result);
        tracing::debug!(
            target: TRACING_TARGET,
            artifact = %artifact,
            size = reader.size(),
            "Opened object for reading"
        );
        Ok(reader)
    }

    /// Open a buffered multipart writer for a new object.
    ///
    /// Nothing is visible in the bucket until the writer is finished.
    pub fn open_write(&self, artifact: &ArtifactRef) -> Result<ObjectWriter> {
        self.check_bucket(artifact)?;
        Ok(ObjectWriter::new(
            self.store.clone(),
            artifact.clone(),
            self.content_types,
        ))
    }

    /// Delete the object.
    #[tracing::instrument(name = "object.delete", skip(self), fields(artifact = %artifact))]
    pub async fn delete(&self, artifact: &ArtifactRef) -> Result<()> {
        self.check_bucket(artifact)?;
        self.store.delete(&artifact.path()).await?;
        Ok(())
    }

    fn check_bucket(&self, artifact: &ArtifactRef) -> Result<()> {
        if artifact.bucket() == self.bucket.as_ref() {
            return Ok(());
        }
        Err(Error::rejected(format!(
            "artifact {artifact} is outside bucket '{}'",
            self.bucket
        )))
    }
}

#[cfg(test)]
mod tests {
    use object_store::memory::InMemory;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;
    use crate::types::{AVRO_CONTENT_TYPE, ErrorKind};

    fn test_client() -> ObjectStoreClient {
        ObjectStoreClient::new(InMemory::new(), "ingest")
    }

    #[tokio::test]
    async fn put_and_get() {
        let client = test_client();
        let artifact = client.artifact("clients0.avro");
        let data = Bytes::from("hello world");
        client.put(&artifact, data.clone()).await.unwrap();

        assert_eq!(client.get(&artifact).await.unwrap(), data);
    }

    #[tokio::test]
    async fn head() {
        let client = test_client();
        let artifact = client.artifact("head.avro");
        client.put(&artifact, Bytes::from("data")).await.unwrap();

        let meta = client.head(&artifact).await.unwrap();
        assert_eq!(meta.size, 4);
        assert_eq!(meta.location, Path::from("head.avro"));
    }

    #[tokio::test]
    async fn head_not_found() {
        let client = test_client();
        let err = client.head(&client.artifact("missing")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn delete() {
        let client = test_client();
        let artifact = client.artifact("del.avro");
        client.put(&artifact, Bytes::from("x")).await.unwrap();
        client.delete(&artifact).await.unwrap();

        assert!(client.get(&artifact).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn open_read_streams_body() {
        let client = test_client();
        let artifact = client.artifact("stream.avro");
        client
            .put(&artifact, Bytes::from_static(b"0123456789"))
            .await
            .unwrap();

        let mut reader = client.open_read(&artifact).await.unwrap();
        assert_eq!(reader.size(), 10);
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"0123456789");
    }

    #[tokio::test]
    async fn open_write_is_invisible_until_finished() {
        let client = test_client();
        let artifact = client.temporary_artifact();

        let mut writer = client.open_write(&artifact).unwrap();
        writer.write_all(b"projected").await.unwrap();
        assert!(client.head(&artifact).await.unwrap_err().is_not_found());

        let finished = writer.finish().await.unwrap();
        assert_eq!(finished, artifact);
        assert_eq!(
            client.get(&artifact).await.unwrap(),
            Bytes::from("projected")
        );
    }

    #[tokio::test]
    async fn open_write_sets_content_type() {
        let client = test_client();
        let artifact = client.temporary_artifact();

        let mut writer = client.open_write(&artifact).unwrap();
        writer.write_all(b"avro").await.unwrap();
        writer.finish().await.unwrap();

        let result = client.store.get(&artifact.path()).await.unwrap();
        assert_eq!(
            result
                .attributes
                .get(&Attribute::ContentType)
                .map(|v| v.to_string()),
            Some(AVRO_CONTENT_TYPE.to_string())
        );
    }

    #[tokio::test]
    async fn aborted_write_leaves_nothing() {
        let client = test_client();
        let artifact = client.temporary_artifact();

        let mut writer = client.open_write(&artifact).unwrap();
        writer.write_all(b"partial").await.unwrap();
        writer.abort().await.unwrap();

        assert!(client.head(&artifact).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn rejects_foreign_bucket() {
        let client = test_client();
        let foreign = ArtifactRef::durable("elsewhere", "a.avro");
        let err = client.delete(&foreign).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
    }

    #[tokio::test]
    async fn list() {
        let client = test_client();
        for i in 0..3 {
            let artifact = client.artifact(format!("dir/clients{i}.avro"));
            client.put(&artifact, Bytes::from(format!("{i}"))).await.unwrap();
        }
        client
            .put(&client.artifact("other.avro"), Bytes::from("x"))
            .await
            .unwrap();

        assert_eq!(client.list("dir").await.unwrap().len(), 3);
        assert_eq!(client.list("").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn verify_reachable() {
        let client = test_client();
        client.verify_reachable().await.unwrap();
    }
}
