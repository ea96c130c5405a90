//! Local filesystem provider using [`object_store::local::LocalFileSystem`].
//!
//! Each bucket maps to a directory under `root`, which makes the service
//! runnable on a workstation without cloud credentials.

use std::path::PathBuf;

use derive_more::Deref;
use object_store::local::LocalFileSystem;
use serde::{Deserialize, Serialize};

use super::Client;
use crate::client::ObjectStoreClient;
use crate::types::Error;

/// Typed credentials for the local filesystem provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCredentials {
    /// Bucket name; objects live under `root/bucket`.
    pub bucket: String,
    /// Directory holding one sub-directory per bucket.
    pub root: PathBuf,
}

/// Filesystem-backed object storage client.
#[derive(Debug, Clone, Deref)]
pub struct LocalProvider(ObjectStoreClient);

impl LocalProvider {
    pub fn into_inner(self) -> ObjectStoreClient {
        self.0
    }
}

impl Client for LocalProvider {
    type Credentials = LocalCredentials;

    const ID: &str = "local";

    async fn connect(creds: &Self::Credentials) -> Result<Self, Error> {
        let dir = creds.root.join(&creds.bucket);
        tokio::fs::create_dir_all(&dir).await?;

        let store = LocalFileSystem::new_with_prefix(&dir)
            .map_err(|e| Error::unavailable(format!("[{}] {e}", Self::ID)).with_source(e))?;

        Ok(Self(
            ObjectStoreClient::new(store, creds.bucket.as_str()).without_content_types(),
        ))
    }
}
