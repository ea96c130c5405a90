//! Artifact references and errors shared by the object store client.

mod artifact;
mod error;

pub use artifact::{AVRO_CONTENT_TYPE, ArtifactRef, Lifecycle, TEMPORARY_KEY_PREFIX};
pub use error::{Error, ErrorKind, Result};
