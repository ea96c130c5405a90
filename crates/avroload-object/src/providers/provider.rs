//! Provider trait for creating bucket-scoped clients from credentials.

use std::future::Future;

use serde::de::DeserializeOwned;

use crate::types::Error;

/// Factory for connecting an [`ObjectStoreClient`](crate::ObjectStoreClient)
/// to a concrete backend.
pub trait Client: Sized + Send + 'static {
    /// Strongly-typed credentials for this provider.
    type Credentials: DeserializeOwned + Send + Sync;

    /// Unique identifier (e.g. "gcs").
    const ID: &str;

    /// Build the backend and wrap it in a client.
    fn connect(creds: &Self::Credentials) -> impl Future<Output = Result<Self, Error>> + Send;
}
