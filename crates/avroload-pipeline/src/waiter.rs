//! Bounded polling of submitted load jobs.

use std::fmt;
use std::time::Duration;

use avroload_warehouse::{JobHandle, JobStatus, TableRef, WarehouseProvider, WarehouseService};
use jiff::Timestamp;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Tracing target for job waiting.
pub const TRACING_TARGET: &str = "avroload_pipeline::waiter";

/// Default total time a job may take before it counts as timed out.
pub const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(600);
/// Default pause before the second status poll.
pub const DEFAULT_INITIAL_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default upper bound of the pause between polls.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Default growth factor of the pause between polls.
pub const DEFAULT_POLL_MULTIPLIER: f64 = 2.0;
/// Default timeout of a single status request.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);
/// Default number of consecutive transient poll failures tolerated.
pub const DEFAULT_MAX_RPC_RETRIES: u32 = 5;

/// Deadline horizon for budgets too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Timing and retry budget for waiting on one job.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitPolicy {
    /// Budget from the first poll until the job counts as timed out.
    pub total_timeout: Duration,
    pub initial_poll_interval: Duration,
    pub max_poll_interval: Duration,
    pub multiplier: f64,
    /// Timeout of each status request.
    pub rpc_timeout: Duration,
    /// Consecutive transient status failures tolerated before giving up.
    pub max_rpc_retries: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            total_timeout: DEFAULT_TOTAL_TIMEOUT,
            initial_poll_interval: DEFAULT_INITIAL_POLL_INTERVAL,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
            multiplier: DEFAULT_POLL_MULTIPLIER,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            max_rpc_retries: DEFAULT_MAX_RPC_RETRIES,
        }
    }
}

impl WaitPolicy {
    pub fn with_total_timeout(mut self, total_timeout: Duration) -> Self {
        self.total_timeout = total_timeout;
        self
    }

    pub fn with_poll_interval(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_poll_interval = initial;
        self.max_poll_interval = max;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_rpc_timeout(mut self, rpc_timeout: Duration) -> Self {
        self.rpc_timeout = rpc_timeout;
        self
    }

    pub fn with_max_rpc_retries(mut self, max_rpc_retries: u32) -> Self {
        self.max_rpc_retries = max_rpc_retries;
        self
    }

    /// Pause after the poll numbered `attempt` (zero-based).
    pub fn poll_interval(&self, attempt: u32) -> Duration {
        let millis = (self.initial_poll_interval.as_millis() as f64)
            * self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let interval = Duration::from_millis(millis.min(u64::MAX as f64) as u64);
        interval.min(self.max_poll_interval)
    }
}

/// Where a waited-on job stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitState {
    Submitted,
    Polling,
    /// The job finished and committed its data.
    DoneSuccess,
    /// The job finished with an error.
    DoneError { detail: String },
    /// The wait budget ran out before the job finished.
    TimedOut,
    /// Waiting stopped early on shutdown or unrecoverable status failures.
    Interrupted { reason: String },
}

impl WaitState {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Submitted | Self::Polling)
    }

    /// Only [`WaitState::DoneSuccess`] counts as success.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::DoneSuccess)
    }
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => f.write_str("submitted"),
            Self::Polling => f.write_str("polling"),
            Self::DoneSuccess => f.write_str("done"),
            Self::DoneError { detail } => write!(f, "failed ({detail})"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Interrupted { reason } => write!(f, "interrupted ({reason})"),
        }
    }
}

/// A submitted load job, observable only through polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    pub handle: JobHandle,
    pub table: TableRef,
    pub submitted_at: Timestamp,
}

impl LoadJob {
    pub fn new(handle: JobHandle, table: TableRef) -> Self {
        Self {
            handle,
            table,
            submitted_at: Timestamp::now(),
        }
    }
}

/// Polls one job at a time until it reaches a terminal [`WaitState`].
///
/// Waiting never fails: every way a wait can end is a state, and each one is
/// logged before it is returned.
#[derive(Debug, Clone)]
pub struct JobWaiter {
    warehouse: WarehouseService,
    policy: WaitPolicy,
    cancel: CancellationToken,
}

impl JobWaiter {
    pub fn new(warehouse: WarehouseService, policy: WaitPolicy, cancel: CancellationToken) -> Self {
        Self {
            warehouse,
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    pub fn warehouse(&self) -> &WarehouseService {
        &self.warehouse
    }

    /// Polls `job` until it finishes, the budget is spent or the waiter is
    /// cancelled.
    #[tracing::instrument(
        name = "waiter.wait",
        skip(self, job),
        fields(job_id = %job.handle, table = %job.table),
        target = TRACING_TARGET
    )]
    pub async fn wait(&self, job: &LoadJob) -> WaitState {
        let started = Instant::now();
        let deadline = deadline_after(started, self.policy.total_timeout);
        let state = self.poll_until_terminal(job, deadline).await;
        self.report(job, &state, started.elapsed());
        state
    }

    async fn poll_until_terminal(&self, job: &LoadJob, deadline: Instant) -> WaitState {
        let mut state = WaitState::Submitted;
        let mut attempt = 0u32;
        let mut failures = 0u32;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return WaitState::TimedOut;
            }

            let budget = remaining.min(self.policy.rpc_timeout);
            let polled = tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    return WaitState::Interrupted {
                        reason: "shutdown requested".to_owned(),
                    };
                }

                polled = tokio::time::timeout(budget, self.warehouse.poll_status(&job.handle)) => polled,
            };

            match polled {
                Ok(Ok(JobStatus::Done)) => return WaitState::DoneSuccess,
                Ok(Ok(JobStatus::Failed { reason, message })) => {
                    return WaitState::DoneError {
                        detail: format!("{reason}: {message}"),
                    };
                }
                Ok(Ok(status)) => {
                    failures = 0;
                    if state == WaitState::Submitted {
                        state = WaitState::Polling;
                    }
                    tracing::trace!(
                        target: TRACING_TARGET,
                        job_id = %job.handle,
                        status = ?status,
                        state = %state,
                        "Load job still running"
                    );
                }
                Ok(Err(err)) if err.is_retryable() => {
                    failures += 1;
                    if failures > self.policy.max_rpc_retries {
                        return WaitState::Interrupted {
                            reason: format!("status polling failed {failures} times in a row: {err}"),
                        };
                    }
                    tracing::warn!(
                        target: TRACING_TARGET,
                        job_id = %job.handle,
                        failures,
                        error = %err,
                        "Transient status poll failure"
                    );
                }
                Ok(Err(err)) => {
                    return WaitState::Interrupted {
                        reason: format!("status polling failed: {err}"),
                    };
                }
                Err(_) if Instant::now() >= deadline => return WaitState::TimedOut,
                Err(_) => {
                    failures += 1;
                    if failures > self.policy.max_rpc_retries {
                        return WaitState::Interrupted {
                            reason: format!("status polling timed out {failures} times in a row"),
                        };
                    }
                    tracing::warn!(
                        target: TRACING_TARGET,
                        job_id = %job.handle,
                        failures,
                        timeout_ms = budget.as_millis(),
                        "Status poll timed out"
                    );
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return WaitState::TimedOut;
            }
            let pause = self.policy.poll_interval(attempt).min(remaining);
            attempt = attempt.saturating_add(1);

            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    return WaitState::Interrupted {
                        reason: "shutdown requested".to_owned(),
                    };
                }

                () = tokio::time::sleep(pause) => {}
            }
        }
    }

    fn report(&self, job: &LoadJob, state: &WaitState, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis();
        match state {
            WaitState::DoneSuccess => tracing::info!(
                target: TRACING_TARGET,
                job_id = %job.handle,
                table = %job.table,
                submitted_at = %job.submitted_at,
                elapsed_ms,
                "Load job completed"
            ),
            WaitState::DoneError { detail } => tracing::error!(
                target: TRACING_TARGET,
                job_id = %job.handle,
                table = %job.table,
                detail = %detail,
                elapsed_ms,
                "Load job failed"
            ),
            WaitState::TimedOut => tracing::error!(
                target: TRACING_TARGET,
                job_id = %job.handle,
                table = %job.table,
                timeout_ms = self.policy.total_timeout.as_millis(),
                "Load job did not finish in time"
            ),
            WaitState::Interrupted { reason } => tracing::warn!(
                target: TRACING_TARGET,
                job_id = %job.handle,
                table = %job.table,
                reason = %reason,
                elapsed_ms,
                "Stopped waiting on load job"
            ),
            WaitState::Submitted | WaitState::Polling => {}
        }
    }
}

fn deadline_after(start: Instant, budget: Duration) -> Instant {
    start
        .checked_add(budget)
        .unwrap_or_else(|| start + FAR_FUTURE)
}
