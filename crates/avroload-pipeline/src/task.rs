//! Load tasks derived from a projected source.

use avroload_object::ArtifactRef;
use avroload_warehouse::{LoadRequest, TableRef};

use crate::error::{PipelineError, Result};

/// Warehouse tables receiving the two artifacts of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub dataset: String,
    /// Receives the durable source artifact.
    pub full_table: String,
    /// Receives the temporary projected artifact.
    pub mandatory_table: String,
}

impl TableNames {
    pub fn new(
        dataset: impl Into<String>,
        full_table: impl Into<String>,
        mandatory_table: impl Into<String>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            full_table: full_table.into(),
            mandatory_table: mandatory_table.into(),
        }
    }

    /// Rejects empty dataset or table names.
    pub fn validate(&self) -> Result<()> {
        if self.dataset.trim().is_empty() {
            return Err(PipelineError::invalid_input("dataset name is empty"));
        }
        if self.full_table.trim().is_empty() || self.mandatory_table.trim().is_empty() {
            return Err(PipelineError::invalid_input("table name is empty"));
        }
        Ok(())
    }

    fn full(&self) -> TableRef {
        TableRef::new(&self.dataset, &self.full_table)
    }

    fn mandatory(&self) -> TableRef {
        TableRef::new(&self.dataset, &self.mandatory_table)
    }
}

/// One artifact bound to the table it loads into.
///
/// Only built once the artifact is finalized in storage. A temporary task
/// owns its artifact and deletes it after the load reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTask {
    pub artifact: ArtifactRef,
    pub table: TableRef,
    pub temporary: bool,
}

impl LoadTask {
    /// The warehouse request loading this task's artifact.
    pub fn request(&self) -> LoadRequest {
        LoadRequest::avro(self.artifact.uri(), self.table.clone())
    }
}

/// Binds the source to the full table and the derived artifact to the
/// mandatory table, in that order.
pub fn build_load_tasks(
    source: &ArtifactRef,
    derived: &ArtifactRef,
    tables: &TableNames,
) -> Result<[LoadTask; 2]> {
    tables.validate()?;
    for artifact in [source, derived] {
        check_artifact(artifact)?;
    }

    Ok([
        LoadTask {
            artifact: source.clone(),
            table: tables.full(),
            temporary: false,
        },
        LoadTask {
            artifact: derived.clone(),
            table: tables.mandatory(),
            temporary: true,
        },
    ])
}

pub(crate) fn check_artifact(artifact: &ArtifactRef) -> Result<()> {
    if artifact.bucket().trim().is_empty() {
        return Err(PipelineError::invalid_input("artifact bucket is empty"));
    }
    if artifact.key().trim().is_empty() {
        return Err(PipelineError::invalid_input("artifact key is empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> TableNames {
        TableNames::new("clients_dataset", "clients_full", "clients_mandatory")
    }

    #[test]
    fn builds_durable_then_temporary() {
        let source = ArtifactRef::durable("ingest", "clients0.avro");
        let derived = ArtifactRef::temporary("ingest");

        let [full, mandatory] = build_load_tasks(&source, &derived, &tables()).unwrap();

        assert_eq!(full.artifact, source);
        assert_eq!(full.table.to_string(), "clients_dataset.clients_full");
        assert!(!full.temporary);
        assert_eq!(mandatory.artifact, derived);
        assert_eq!(mandatory.table.table, "clients_mandatory");
        assert!(mandatory.temporary);
    }

    #[test]
    fn request_targets_gs_uri() {
        let source = ArtifactRef::durable("ingest", "clients0.avro");
        let [full, _] =
            build_load_tasks(&source, &ArtifactRef::temporary("ingest"), &tables()).unwrap();

        let request = full.request();
        assert_eq!(request.source_uri, "gs://ingest/clients0.avro");
        assert_eq!(request.table.dataset, "clients_dataset");
    }

    #[test]
    fn empty_names_are_input_faults() {
        let source = ArtifactRef::durable("ingest", "clients0.avro");
        let derived = ArtifactRef::temporary("ingest");

        let blank_table = TableNames::new("clients_dataset", " ", "clients_mandatory");
        assert!(build_load_tasks(&source, &derived, &blank_table).unwrap_err().is_input());

        let blank_key = ArtifactRef::durable("ingest", "");
        assert!(build_load_tasks(&blank_key, &derived, &tables()).unwrap_err().is_input());
    }
}
