//! Random `Client` container files for manual runs and tests.

use std::io::Write;

use apache_avro::{AvroResult, Schema, Writer};
use avroload_object::{ArtifactRef, ObjectStoreClient};
use rand::Rng;
use rand::distributions::Uniform;
use serde::Serialize;
use tokio_util::io::SyncIoBridge;

use crate::error::{BoxedError, PipelineError, Result};
use crate::schema::{Client, ClientProjection, RecordProjection};

/// Tracing target for file generation.
pub const TRACING_TARGET: &str = "avroload_pipeline::generator";

const NAME_LENGTH: usize = 10;
const PHONE_LENGTH: usize = 8;
const ADDRESS_LENGTH: usize = 30;

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn pick<R: Rng + ?Sized>(rng: &mut R, charset: &[u8], len: usize) -> String {
    let index = Uniform::from(0..charset.len());
    (0..len)
        .map(|_| char::from(charset[rng.sample(index)]))
        .collect()
}

/// A client with a non-negative id, alphabetic name, numeric phone and
/// alphanumeric address.
pub fn random_client<R: Rng + ?Sized>(rng: &mut R) -> Client {
    Client {
        id: rng.gen_range(0..i64::MAX),
        name: pick(rng, LETTERS, NAME_LENGTH),
        phone: Some(pick(rng, DIGITS, PHONE_LENGTH)),
        address: Some(pick(rng, ALPHANUMERIC, ADDRESS_LENGTH)),
    }
}

pub fn random_clients<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Client> {
    (0..count).map(|_| random_client(rng)).collect()
}

/// Writes `records` as one Avro container file and returns the sink.
pub fn write_container<W, I>(schema: &Schema, records: I, out: W) -> AvroResult<W>
where
    W: Write,
    I: IntoIterator,
    I::Item: Serialize,
{
    let mut writer = Writer::new(schema, out);
    for record in records {
        writer.append_ser(record)?;
    }
    writer.into_inner()
}

fn encode<W: Write>(
    schema: &Schema,
    records: impl Iterator<Item = Client>,
    output: &mut W,
) -> std::result::Result<(), BoxedError> {
    write_container(schema, records, &mut *output)?;
    output.flush()?;
    Ok(())
}

/// Uploads `files` container files named `{prefix}{i}.avro`, each holding
/// `clients` random records.
///
/// Records are generated and encoded on a blocking thread while the upload
/// streams, so large files never sit in memory.
#[tracing::instrument(
    name = "generator.generate_files",
    skip(storage),
    target = TRACING_TARGET
)]
pub async fn generate_files(
    storage: &ObjectStoreClient,
    prefix: &str,
    files: usize,
    clients: usize,
) -> Result<Vec<ArtifactRef>> {
    let projection = ClientProjection::new()
        .map_err(|e| PipelineError::worker_with_source("failed to parse client schema", e))?;
    let schema = projection.source_schema().clone();

    let mut written = Vec::with_capacity(files);
    for index in 0..files {
        let artifact = storage.artifact(format!("{prefix}{index}.avro"));
        let output = SyncIoBridge::new(storage.open_write(&artifact)?);
        let schema = schema.clone();

        let (result, output) = tokio::task::spawn_blocking(move || {
            let mut output = output;
            let mut rng = rand::thread_rng();
            let records = (0..clients).map(|_| random_client(&mut rng));
            let result = encode(&schema, records, &mut output);
            (result, output)
        })
        .await
        .map_err(|e| PipelineError::worker_with_source("generator task failed", e))?;

        let writer = output.into_inner();
        if let Err(err) = result {
            if let Err(abort_error) = writer.abort().await {
                tracing::warn!(
                    target: TRACING_TARGET,
                    artifact = %artifact,
                    error = %abort_error,
                    "Failed to abort partial upload"
                );
            }
            return Err(PipelineError::Worker {
                message: "failed to encode generated clients".into(),
                source: Some(err),
            });
        }
        let artifact = writer.finish().await?;

        tracing::info!(
            target: TRACING_TARGET,
            artifact = %artifact,
            clients,
            "Generated client file"
        );
        written.push(artifact);
    }

    Ok(written)
}
