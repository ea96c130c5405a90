//! Deterministic Avro object container header.
//!
//! `apache_avro::Writer` picks a random sync marker and writes its metadata
//! from a hash map. The projector instead writes the header itself with a
//! fixed key order and a marker derived from the source URI, then appends
//! blocks through `Writer::append_to`.

use std::io::Write;

use apache_avro::Schema;
use apache_avro::types::Value;
use sha2::{Digest, Sha256};

use super::ProjectionError;

const MAGIC: &[u8; 4] = b"Obj\x01";

/// The 16-byte marker separating container blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMarker([u8; 16]);

impl SyncMarker {
    /// Derives the marker from a stable seed such as the source URI.
    pub fn derive(seed: &str) -> Self {
        let digest = Sha256::digest(seed.as_bytes());
        let mut marker = [0u8; 16];
        marker.copy_from_slice(&digest[..16]);
        Self(marker)
    }

    pub const fn as_bytes(&self) -> [u8; 16] {
        self.0
    }
}

/// Writes magic, metadata (`avro.codec`, then `avro.schema`) and the marker.
pub(crate) fn write_header<W: Write>(
    out: &mut W,
    schema_json: &str,
    marker: &SyncMarker,
) -> Result<(), ProjectionError> {
    let metadata: [(&str, &[u8]); 2] = [
        ("avro.codec", b"null"),
        ("avro.schema", schema_json.as_bytes()),
    ];

    let mut header = Vec::with_capacity(schema_json.len() + 64);
    header.extend_from_slice(MAGIC);
    header.extend(encode(&Schema::Long, Value::Long(metadata.len() as i64))?);
    for (key, value) in metadata {
        header.extend(encode(&Schema::String, Value::String(key.to_owned()))?);
        header.extend(encode(&Schema::Bytes, Value::Bytes(value.to_vec()))?);
    }
    header.extend(encode(&Schema::Long, Value::Long(0))?);
    header.extend_from_slice(&marker.0);

    out.write_all(&header)?;
    Ok(())
}

fn encode(schema: &Schema, value: Value) -> Result<Vec<u8>, ProjectionError> {
    apache_avro::to_avro_datum(schema, value).map_err(ProjectionError::Encode)
}
