//! Shared, type-erased handle to a warehouse provider.

use std::fmt;
use std::sync::Arc;

use crate::{JobHandle, JobStatus, LoadRequest, Result, WarehouseProvider};

/// Cloneable warehouse handle used for dependency injection.
#[derive(Clone)]
pub struct WarehouseService {
    inner: Arc<dyn WarehouseProvider>,
}

impl WarehouseService {
    /// Wraps a concrete provider.
    pub fn new(provider: impl WarehouseProvider + 'static) -> Self {
        Self {
            inner: Arc::new(provider),
        }
    }

    /// Wraps an already shared provider.
    pub fn from_arc(provider: Arc<dyn WarehouseProvider>) -> Self {
        Self { inner: provider }
    }
}

impl fmt::Debug for WarehouseService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseService").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl WarehouseProvider for WarehouseService {
    async fn submit_load(&self, request: &LoadRequest) -> Result<JobHandle> {
        self.inner.submit_load(request).await
    }

    async fn poll_status(&self, handle: &JobHandle) -> Result<JobStatus> {
        self.inner.poll_status(handle).await
    }
}
