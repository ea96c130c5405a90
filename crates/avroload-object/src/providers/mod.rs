//! Client trait and object storage providers.

mod gcs;
mod local;
mod provider;

pub use gcs::{GcsCredentials, GcsProvider};
pub use local::{LocalCredentials, LocalProvider};
pub use provider::Client;
