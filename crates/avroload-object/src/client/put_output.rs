//! Result type for [`ObjectStoreClient::put`](super::ObjectStoreClient::put).

/// Result of a successful single-request upload.
#[derive(Debug, Clone, Default)]
pub struct PutOutput {
    /// Entity tag of the new object, if the backend provides one.
    pub e_tag: Option<String>,
    /// Generation or version of the new object, if the backend provides one.
    pub version: Option<String>,
}

impl From<object_store::PutResult> for PutOutput {
    fn from(r: object_store::PutResult) -> Self {
        Self {
            e_tag: r.e_tag,
            version: r.version,
        }
    }
}
