//! Convenience re-exports.

pub use crate::client::{ObjectStoreClient, PutOutput};
pub use crate::providers::{Client, GcsProvider, LocalProvider};
pub use crate::streams::{ObjectReader, ObjectWriter};
pub use crate::types::{ArtifactRef, Error, ErrorKind, Lifecycle, Result};
