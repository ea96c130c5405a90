//! Record schemas and the projections between them.

mod client;

use apache_avro::Schema;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use client::{
    CLIENT_MANDATORY_SCHEMA, CLIENT_SCHEMA, Client, ClientMandatory, ClientProjection,
};

/// Typed mapping from records of a source schema to a reduced target schema.
///
/// Decoding into [`Source`](Self::Source) is what validates each record;
/// [`project`](Self::project) only copies fields that are already known to be
/// present and well-typed.
pub trait RecordProjection: Send + Sync + 'static {
    /// Record type of the incoming files.
    type Source: DeserializeOwned;
    /// Record type written to the derived artifact.
    type Target: Serialize;

    /// Schema every source record must conform to.
    fn source_schema(&self) -> &Schema;

    /// Schema of the derived artifact.
    fn target_schema(&self) -> &Schema;

    /// Target schema as written into container headers.
    fn target_schema_json(&self) -> &str;

    /// Copies the target fields out of a decoded source record.
    fn project(&self, record: Self::Source) -> Self::Target;
}
