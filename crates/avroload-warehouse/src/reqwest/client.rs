//! Reqwest-based BigQuery REST client.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response};

use super::model::{ApiErrorBody, Job};
use super::{BigQueryConfig, Error, TRACING_TARGET};
use crate::{JobHandle, JobStatus, LoadRequest, WarehouseProvider, WarehouseService};

/// Inner client that holds the HTTP client and configuration.
struct BigQueryClientInner {
    http: Client,
    config: BigQueryConfig,
}

/// BigQuery client submitting load jobs through `jobs.insert` and polling
/// them through `jobs.get`.
///
/// # Examples
///
/// ```rust,ignore
/// use avroload_warehouse::reqwest::{BigQueryClient, BigQueryConfig};
///
/// let config = BigQueryConfig::new("my-project").with_access_token(token);
/// let warehouse = BigQueryClient::new(config)?.into_service();
/// ```
#[derive(Clone)]
pub struct BigQueryClient {
    inner: Arc<BigQueryClientInner>,
}

impl std::fmt::Debug for BigQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryClient")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl BigQueryClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: BigQueryConfig) -> crate::Result<Self> {
        let timeout = config.effective_timeout();
        let user_agent = config.effective_user_agent();

        tracing::debug!(
            target: TRACING_TARGET,
            project_id = %config.project_id,
            timeout_ms = timeout.as_millis(),
            "Creating BigQuery client"
        );

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(&user_agent)
            .build()
            .map_err(Error::from)?;

        let inner = BigQueryClientInner { http, config };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &BigQueryConfig {
        &self.inner.config
    }

    /// Converts this client into a [`WarehouseService`] for use with dependency injection.
    pub fn into_service(self) -> WarehouseService {
        WarehouseService::new(self)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config().access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request and decodes a `Job` resource from a 2xx response.
    async fn send_job(&self, request: RequestBuilder) -> Result<Job, Error> {
        let response = self.authorize(request).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<Job>().await?)
    }
}

/// Turns a non-2xx response into [`Error::Api`] with the API's message.
async fn ensure_success(response: Response) -> Result<Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or(body);
    Err(Error::Api { status, message })
}

#[async_trait::async_trait]
impl WarehouseProvider for BigQueryClient {
    async fn submit_load(&self, request: &LoadRequest) -> crate::Result<JobHandle> {
        let job_id = format!("avroload_{}", uuid::Uuid::now_v7().simple());
        let body = Job::load(
            &self.config().project_id,
            job_id,
            self.config().location.clone(),
            request,
        );

        tracing::debug!(
            target: TRACING_TARGET,
            job_id = %body.job_reference.job_id,
            table = %request.table,
            source_uri = %request.source_uri,
            "Submitting load job"
        );

        let http_request = self.inner.http.post(self.config().jobs_url()).json(&body);
        let job = self.send_job(http_request).await?;
        let handle = job.handle();

        tracing::info!(
            target: TRACING_TARGET,
            job_id = %handle.job_id,
            table = %request.table,
            "Load job submitted"
        );

        Ok(handle)
    }

    async fn poll_status(&self, handle: &JobHandle) -> crate::Result<JobStatus> {
        let url = format!("{}/{}", self.config().jobs_url(), handle.job_id);
        let mut http_request = self.inner.http.get(url);
        if let Some(location) = handle.location.as_ref().or(self.config().location.as_ref()) {
            http_request = http_request.query(&[("location", location)]);
        }

        let job = self.send_job(http_request).await?;
        let status = job.job_status();

        tracing::trace!(
            target: TRACING_TARGET,
            job_id = %handle.job_id,
            status = ?status,
            "Polled load job"
        );

        Ok(status)
    }
}
