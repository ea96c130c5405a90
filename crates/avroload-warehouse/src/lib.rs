#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod job;
mod service;

#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;

#[cfg(feature = "reqwest")]
#[cfg_attr(docsrs, doc(cfg(feature = "reqwest")))]
pub mod reqwest;

pub use error::{BoxedError, Error, ErrorKind, Result};
pub use job::{JobHandle, JobStatus, LoadRequest, SourceFormat, TableRef};
pub use service::WarehouseService;

/// Tracing target for warehouse operations.
pub const TRACING_TARGET: &str = "avroload_warehouse";

/// Core trait for warehouse load-job operations.
///
/// Implement this trait to plug in a different warehouse backend.
#[async_trait::async_trait]
pub trait WarehouseProvider: Send + Sync {
    /// Submits a load job and returns without waiting for it to run.
    async fn submit_load(&self, request: &LoadRequest) -> Result<JobHandle>;

    /// Fetches the current status of a previously submitted job.
    async fn poll_status(&self, handle: &JobHandle) -> Result<JobStatus>;
}
