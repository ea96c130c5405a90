#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod client;
/// Provider trait and object storage provider factories.
pub mod providers;
/// Async reader and writer adapters over stored objects.
pub mod streams;
/// Artifact references and the crate error type.
pub mod types;

#[doc(hidden)]
pub mod prelude;

pub use client::{ObjectStoreClient, PutOutput};
pub use types::{ArtifactRef, Error, ErrorKind, Lifecycle, Result, TEMPORARY_KEY_PREFIX};

/// Tracing target for object store operations.
pub const TRACING_TARGET: &str = "avroload_object";
