//! Single-pass validate-and-project transform over Avro container files.
//!
//! [`project`] decodes every source record against the projection's source
//! schema and appends its projection to the output as it goes, so at most one
//! record (plus the codec's block buffer) is held in memory. The first record
//! that fails to decode aborts the pass. A source that stops yielding bytes
//! because its stream broke is reported as a read failure, never as a decode
//! failure, even when the codec only sees a truncated block.
//!
//! [`project_artifact`] runs the same pass between two stored objects.

mod container;
mod storage;

use std::io::{self, Read, Write};

use apache_avro::{Reader, Writer, from_value};

pub use container::SyncMarker;
pub use storage::project_artifact;

use crate::schema::RecordProjection;

/// Tracing target for projection.
pub const TRACING_TARGET: &str = "avroload_pipeline::projector";

/// Statistics of a completed projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionSummary {
    /// Number of records read from the source and written to the output.
    pub records: u64,
}

/// Failure of a projection pass.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    /// The source does not conform to the source schema.
    ///
    /// `record_index` is `None` when the container header itself is invalid.
    #[error("{}", describe_decode(.record_index))]
    Decode {
        record_index: Option<u64>,
        #[source]
        source: apache_avro::Error,
    },
    /// The source stream failed before its content could be decoded.
    #[error("failed to read source: {0}")]
    Read(#[source] io::Error),
    /// A projected record could not be encoded.
    #[error("failed to encode projected record: {0}")]
    Encode(#[source] apache_avro::Error),
    /// Writing the output failed.
    #[error("failed to write projected output: {0}")]
    Io(#[from] io::Error),
}

fn describe_decode(record_index: &Option<u64>) -> String {
    match record_index {
        Some(index) => format!("record {index} does not conform to the source schema"),
        None => "invalid Avro container header".to_owned(),
    }
}

impl ProjectionError {
    fn decode(record_index: Option<u64>, source: apache_avro::Error) -> Self {
        Self::Decode {
            record_index,
            source,
        }
    }

    /// Whether the failure was caused by the source content.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Streams `input` through `projection` into `output`.
///
/// The output container starts with a header derived only from the target
/// schema and `marker`, so the same input always produces the same bytes.
/// Nothing is written when the source header is invalid. On any failure the
/// output holds a partial container that the caller must discard.
///
/// Once `input` has returned an error the pass fails with
/// [`ProjectionError::Read`], whatever the codec made of the bytes it got.
pub fn project<P, R, W>(
    projection: &P,
    input: R,
    output: W,
    marker: SyncMarker,
) -> Result<ProjectionSummary, ProjectionError>
where
    P: RecordProjection,
    R: Read,
    W: Write,
{
    let mut input = SourceReader::new(input);
    let result = project_records(projection, &mut input, output, marker);
    match input.failure.take() {
        Some(err) => Err(ProjectionError::Read(err)),
        None => result,
    }
}

fn project_records<P, R, W>(
    projection: &P,
    input: R,
    mut output: W,
    marker: SyncMarker,
) -> Result<ProjectionSummary, ProjectionError>
where
    P: RecordProjection,
    R: Read,
    W: Write,
{
    let reader = Reader::with_schema(projection.source_schema(), input)
        .map_err(|e| ProjectionError::decode(None, e))?;

    container::write_header(&mut output, projection.target_schema_json(), &marker)?;
    let mut writer = Writer::append_to(projection.target_schema(), output, marker.as_bytes());

    let mut records = 0u64;
    for value in reader {
        let value = value.map_err(|e| ProjectionError::decode(Some(records), e))?;
        let record: P::Source =
            from_value(&value).map_err(|e| ProjectionError::decode(Some(records), e))?;

        writer
            .append_ser(projection.project(record))
            .map_err(ProjectionError::Encode)?;
        records += 1;
    }

    writer.flush().map_err(ProjectionError::Encode)?;
    let mut output = writer.into_inner().map_err(ProjectionError::Encode)?;
    output.flush()?;

    Ok(ProjectionSummary { records })
}

/// Keeps the first error of the wrapped reader.
///
/// The codec only receives a copy, so the original (with its storage
/// classification) survives whatever the codec turns it into.
struct SourceReader<R> {
    inner: R,
    failure: Option<io::Error>,
}

impl<R> SourceReader<R> {
    const fn new(inner: R) -> Self {
        Self {
            inner,
            failure: None,
        }
    }
}

impl<R: Read> Read for SourceReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Err(err),
            Err(err) => {
                let forwarded = io::Error::new(err.kind(), err.to_string());
                self.failure.get_or_insert(err);
                Err(forwarded)
            }
            read => read,
        }
    }
}

#[cfg(test)]
mod tests {
    use apache_avro::Schema;

    use super::*;
    use crate::generator::{random_clients, write_container};
    use crate::schema::{Client, ClientMandatory, ClientProjection};

    fn read_mandatory(bytes: &[u8]) -> Vec<ClientMandatory> {
        let schema = Schema::parse_str(crate::schema::CLIENT_MANDATORY_SCHEMA).unwrap();
        Reader::with_schema(&schema, bytes)
            .unwrap()
            .map(|v| from_value::<ClientMandatory>(&v.unwrap()).unwrap())
            .collect()
    }

    fn source_file(clients: &[Client]) -> Vec<u8> {
        let projection = ClientProjection::new().unwrap();
        write_container(projection.source_schema(), clients, Vec::new()).unwrap()
    }

    #[test]
    fn projects_every_record_in_order() {
        let clients = random_clients(&mut rand::thread_rng(), 5);
        let input = source_file(&clients);
        let projection = ClientProjection::new().unwrap();

        let mut output = Vec::new();
        let summary = project(
            &projection,
            input.as_slice(),
            &mut output,
            SyncMarker::derive("gs://ingest/clients0.avro"),
        )
        .unwrap();

        assert_eq!(summary.records, 5);
        let expected: Vec<ClientMandatory> = clients.into_iter().map(Into::into).collect();
        assert_eq!(read_mandatory(&output), expected);
    }

    #[test]
    fn output_is_byte_identical_across_runs() {
        let input = source_file(&random_clients(&mut rand::thread_rng(), 50));
        let projection = ClientProjection::new().unwrap();
        let marker = SyncMarker::derive("gs://ingest/clients0.avro");

        let mut first = Vec::new();
        project(&projection, input.as_slice(), &mut first, marker).unwrap();
        let mut second = Vec::new();
        project(&projection, input.as_slice(), &mut second, marker).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn empty_source_yields_empty_container() {
        let input = source_file(&[]);
        let projection = ClientProjection::new().unwrap();

        let mut output = Vec::new();
        let summary = project(
            &projection,
            input.as_slice(),
            &mut output,
            SyncMarker::derive("seed"),
        )
        .unwrap();

        assert_eq!(summary.records, 0);
        assert!(read_mandatory(&output).is_empty());
    }

    #[test]
    fn garbage_fails_before_writing() {
        let projection = ClientProjection::new().unwrap();
        let mut output = Vec::new();
        let err = project(
            &projection,
            b"invalid avro file content".as_slice(),
            &mut output,
            SyncMarker::derive("seed"),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            ProjectionError::Decode {
                record_index: None,
                ..
            }
        ));
        assert!(output.is_empty());
    }

    #[test]
    fn schema_mismatch_reports_first_record() {
        let other = Schema::parse_str(
            r#"{"type":"record","name":"Order","fields":[{"name":"sku","type":"string"}]}"#,
        )
        .unwrap();
        let mut writer = Writer::new(&other, Vec::new());
        writer
            .append(apache_avro::types::Value::Record(vec![(
                "sku".to_owned(),
                apache_avro::types::Value::String("A-1".to_owned()),
            )]))
            .unwrap();
        let input = writer.into_inner().unwrap();

        let projection = ClientProjection::new().unwrap();
        let err = project(
            &projection,
            input.as_slice(),
            Vec::new(),
            SyncMarker::derive("seed"),
        )
        .unwrap_err();

        assert!(err.is_validation());
        assert!(matches!(
            err,
            ProjectionError::Decode {
                record_index: Some(0),
                ..
            }
        ));
    }

    /// Yields a prefix of `body`, then fails like a dropped connection.
    struct BrokenStream<'a> {
        body: &'a [u8],
    }

    impl Read for BrokenStream<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.body.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                ));
            }
            let n = buf.len().min(self.body.len());
            buf[..n].copy_from_slice(&self.body[..n]);
            self.body = &self.body[n..];
            Ok(n)
        }
    }

    #[test]
    fn broken_stream_is_a_read_failure() {
        let input = source_file(&random_clients(&mut rand::thread_rng(), 500));
        let projection = ClientProjection::new().unwrap();

        let err = project(
            &projection,
            BrokenStream {
                body: &input[..input.len() / 2],
            },
            Vec::new(),
            SyncMarker::derive("seed"),
        )
        .unwrap_err();

        assert!(!err.is_validation());
        match err {
            ProjectionError::Read(cause) => {
                assert_eq!(cause.kind(), io::ErrorKind::ConnectionReset);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn broken_stream_after_last_block_still_fails() {
        let input = source_file(&random_clients(&mut rand::thread_rng(), 3));
        let projection = ClientProjection::new().unwrap();

        let err = project(
            &projection,
            BrokenStream { body: &input },
            Vec::new(),
            SyncMarker::derive("seed"),
        )
        .unwrap_err();

        assert!(matches!(err, ProjectionError::Read(_)));
    }

    #[test]
    fn truncated_source_is_a_validation_failure() {
        let input = source_file(&random_clients(&mut rand::thread_rng(), 20));
        let truncated = &input[..input.len() - 40];
        let projection = ClientProjection::new().unwrap();

        let err = project(
            &projection,
            truncated,
            Vec::new(),
            SyncMarker::derive("seed"),
        )
        .unwrap_err();

        assert!(err.is_validation());
    }
}
