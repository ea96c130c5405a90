//! The `example.gcp.Client` schema and its mandatory-field projection.

use apache_avro::Schema;
use serde::{Deserialize, Serialize};

use super::RecordProjection;

/// Full client schema of the ingested files.
pub const CLIENT_SCHEMA: &str = r#"{
  "type": "record",
  "name": "Client",
  "namespace": "example.gcp",
  "fields": [
    {"name": "id", "type": "long"},
    {"name": "name", "type": "string"},
    {"name": "phone", "type": ["null", "string"], "default": null},
    {"name": "address", "type": ["null", "string"], "default": null}
  ]
}"#;

/// Mandatory-field schema of the derived artifact.
pub const CLIENT_MANDATORY_SCHEMA: &str = r#"{"type":"record","name":"ClientMandatory","namespace":"example.gcp","fields":[{"name":"id","type":"long"},{"name":"name","type":"string"}]}"#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMandatory {
    pub id: i64,
    pub name: String,
}

impl From<Client> for ClientMandatory {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            name: client.name,
        }
    }
}

/// Projects [`Client`] records onto [`ClientMandatory`].
#[derive(Debug, Clone)]
pub struct ClientProjection {
    source: Schema,
    target: Schema,
}

impl ClientProjection {
    /// Parses both schemas.
    pub fn new() -> apache_avro::AvroResult<Self> {
        Ok(Self {
            source: Schema::parse_str(CLIENT_SCHEMA)?,
            target: Schema::parse_str(CLIENT_MANDATORY_SCHEMA)?,
        })
    }
}

impl RecordProjection for ClientProjection {
    type Source = Client;
    type Target = ClientMandatory;

    fn source_schema(&self) -> &Schema {
        &self.source
    }

    fn target_schema(&self) -> &Schema {
        &self.target
    }

    fn target_schema_json(&self) -> &str {
        CLIENT_MANDATORY_SCHEMA
    }

    fn project(&self, record: Client) -> ClientMandatory {
        record.into()
    }
}
