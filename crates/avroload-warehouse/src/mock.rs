//! In-memory warehouse for tests and local runs.
//!
//! # Feature Flag
//!
//! This module is only available when the `test-utils` feature is enabled:
//!
//! ```toml
//! [dev-dependencies]
//! avroload-warehouse = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use avroload_warehouse::mock::{MockBehavior, MockWarehouse};
//!
//! let warehouse = MockWarehouse::new()
//!     .with_table("clients_full", MockBehavior::succeed_after(Duration::from_secs(5)))
//!     .with_table("clients_mandatory", MockBehavior::fail("invalid", "bad row"));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::{
    Error, ErrorKind, JobHandle, JobStatus, LoadRequest, Result, TRACING_TARGET,
    WarehouseProvider, WarehouseService,
};

/// How a simulated job behaves once submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Reports `Done` once `after` has elapsed since submission.
    Succeed { after: Duration },
    /// Reports `Failed` once `after` has elapsed since submission.
    Fail {
        after: Duration,
        reason: String,
        message: String,
    },
    /// Stays `Running` forever.
    Hang,
    /// Submission itself fails.
    RejectSubmit,
    /// The first `failures` polls fail with a retryable network error.
    FlakyPoll {
        failures: u32,
        then: Box<MockBehavior>,
    },
    /// Every poll fails with a non-retryable authentication error.
    PollRejected,
}

impl MockBehavior {
    pub fn succeed_after(after: Duration) -> Self {
        Self::Succeed { after }
    }

    /// Fails on the first poll.
    pub fn fail(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fail {
            after: Duration::ZERO,
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn flaky(failures: u32, then: MockBehavior) -> Self {
        Self::FlakyPoll {
            failures,
            then: Box::new(then),
        }
    }

    fn evaluate(&self, elapsed: Duration, polls: u32) -> Result<JobStatus> {
        match self {
            Self::Succeed { after } if elapsed >= *after => Ok(JobStatus::Done),
            Self::Fail {
                after,
                reason,
                message,
            } if elapsed >= *after => Ok(JobStatus::Failed {
                reason: reason.clone(),
                message: message.clone(),
            }),
            Self::Succeed { .. } | Self::Fail { .. } | Self::Hang | Self::RejectSubmit => {
                Ok(JobStatus::Running)
            }
            Self::FlakyPoll { failures, .. } if polls <= *failures => {
                Err(Error::network_error().with_message("simulated connection reset"))
            }
            Self::FlakyPoll { then, .. } => then.evaluate(elapsed, polls),
            Self::PollRejected => {
                Err(Error::new(ErrorKind::Authentication).with_message("simulated expired token"))
            }
        }
    }
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self::succeed_after(Duration::ZERO)
    }
}

struct MockJob {
    behavior: MockBehavior,
    submitted_at: Instant,
    polls: u32,
}

#[derive(Default)]
struct MockState {
    default: MockBehavior,
    tables: HashMap<String, MockBehavior>,
    jobs: HashMap<String, MockJob>,
    submissions: Vec<LoadRequest>,
    next_id: u64,
}

/// Simulated warehouse that tracks submissions and answers polls from
/// per-table [`MockBehavior`]s.
///
/// Job age is measured with [`tokio::time::Instant`], so tests can drive it
/// with a paused clock.
#[derive(Clone, Default)]
pub struct MockWarehouse {
    state: Arc<Mutex<MockState>>,
}

impl std::fmt::Debug for MockWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockWarehouse").finish_non_exhaustive()
    }
}

impl MockWarehouse {
    /// Creates a warehouse where every job succeeds on its first poll.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the behavior for tables without an explicit one.
    #[must_use]
    pub fn with_default(self, behavior: MockBehavior) -> Self {
        self.lock().default = behavior;
        self
    }

    /// Sets the behavior for jobs loading into `table`.
    #[must_use]
    pub fn with_table(self, table: impl Into<String>, behavior: MockBehavior) -> Self {
        self.lock().tables.insert(table.into(), behavior);
        self
    }

    /// Every request submitted so far, in submission order.
    pub fn submissions(&self) -> Vec<LoadRequest> {
        self.lock().submissions.clone()
    }

    /// Number of status polls received for `job_id`.
    pub fn poll_count(&self, job_id: &str) -> u32 {
        self.lock().jobs.get(job_id).map_or(0, |job| job.polls)
    }

    /// Converts this mock into a [`WarehouseService`].
    pub fn into_service(self) -> WarehouseService {
        WarehouseService::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl WarehouseProvider for MockWarehouse {
    async fn submit_load(&self, request: &LoadRequest) -> Result<JobHandle> {
        let mut state = self.lock();
        let behavior = state
            .tables
            .get(&request.table.table)
            .unwrap_or(&state.default)
            .clone();

        if behavior == MockBehavior::RejectSubmit {
            return Err(Error::invalid_input()
                .with_message(format!("simulated rejection for {}", request.table)));
        }

        state.next_id += 1;
        let job_id = format!("mock_{}", state.next_id);
        state.submissions.push(request.clone());
        state.jobs.insert(
            job_id.clone(),
            MockJob {
                behavior,
                submitted_at: Instant::now(),
                polls: 0,
            },
        );

        tracing::debug!(
            target: TRACING_TARGET,
            job_id = %job_id,
            table = %request.table,
            "Mock load job submitted"
        );

        Ok(JobHandle::new(job_id))
    }

    async fn poll_status(&self, handle: &JobHandle) -> Result<JobStatus> {
        let mut state = self.lock();
        let Some(job) = state.jobs.get_mut(&handle.job_id) else {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message(format!("unknown job {}", handle.job_id)));
        };

        job.polls += 1;
        job.behavior.evaluate(job.submitted_at.elapsed(), job.polls)
    }
}
