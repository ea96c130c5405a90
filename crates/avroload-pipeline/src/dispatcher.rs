//! Submission of load tasks onto the bounded worker pool.

use std::sync::Arc;

use avroload_warehouse::{WarehouseProvider, WarehouseService};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::cleanup::{CleanupCoordinator, CleanupOutcome};
use crate::error::{PipelineError, Result};
use crate::task::LoadTask;
use crate::waiter::{JobWaiter, LoadJob, WaitState};

/// Tracing target for dispatch.
pub const TRACING_TARGET: &str = "avroload_pipeline::dispatcher";

/// Final result of one load task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task: LoadTask,
    /// Warehouse job id, absent when submission failed.
    pub job_id: Option<String>,
    pub state: WaitState,
    pub cleanup: CleanupOutcome,
    /// True only for [`WaitState::DoneSuccess`].
    pub success: bool,
}

/// A dispatched task whose outcome is not yet known.
#[derive(Debug)]
pub struct TaskHandle {
    task: LoadTask,
    join: JoinHandle<TaskOutcome>,
}

impl TaskHandle {
    pub fn task(&self) -> &LoadTask {
        &self.task
    }

    pub(crate) fn into_parts(self) -> (LoadTask, JoinHandle<TaskOutcome>) {
        (self.task, self.join)
    }
}

/// Submits load tasks and tracks each on its own pool task.
///
/// Every dispatched task holds one pool permit from submission until its
/// cleanup has run. Dispatching the same task twice creates two jobs.
#[derive(Debug, Clone)]
pub struct JobDispatcher {
    waiter: JobWaiter,
    cleanup: CleanupCoordinator,
    pool: Arc<Semaphore>,
}

impl JobDispatcher {
    pub fn new(waiter: JobWaiter, cleanup: CleanupCoordinator, max_concurrent_jobs: usize) -> Self {
        Self::with_pool(
            waiter,
            cleanup,
            Arc::new(Semaphore::new(max_concurrent_jobs)),
        )
    }

    /// Creates a dispatcher drawing permits from a shared pool.
    pub fn with_pool(waiter: JobWaiter, cleanup: CleanupCoordinator, pool: Arc<Semaphore>) -> Self {
        Self {
            waiter,
            cleanup,
            pool,
        }
    }

    fn warehouse(&self) -> &WarehouseService {
        self.waiter.warehouse()
    }

    pub fn cleanup(&self) -> &CleanupCoordinator {
        &self.cleanup
    }

    /// Number of permits currently free.
    pub fn available_slots(&self) -> usize {
        self.pool.available_permits()
    }

    /// Submits `task` and returns without waiting for the job.
    ///
    /// Fails only when the pool is closed. The task's artifact is cleaned up
    /// before that error is returned, and also when the returned future is
    /// dropped before the task reaches the pool.
    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, task),
        fields(artifact = %task.artifact, table = %task.table),
        target = TRACING_TARGET
    )]
    pub async fn dispatch(&self, task: LoadTask) -> Result<TaskHandle> {
        let pending = self.cleanup.guard_task(&task);
        let permit = match self.pool.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    artifact = %task.artifact,
                    "Worker pool closed, load task not submitted"
                );
                pending.discard().await;
                return Err(PipelineError::worker_with_source("worker pool closed", err));
            }
        };

        let submitted = self.warehouse().submit_load(&task.request()).await;
        let job = match submitted {
            Ok(handle) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    job_id = %handle,
                    table = %task.table,
                    artifact = %task.artifact,
                    temporary = task.temporary,
                    "Load job submitted"
                );
                Ok(LoadJob::new(handle, task.table.clone()))
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    table = %task.table,
                    artifact = %task.artifact,
                    error = %err,
                    "Load job submission failed"
                );
                Err(WaitState::DoneError {
                    detail: format!("submission failed: {err}"),
                })
            }
        };

        let waiter = self.waiter.clone();
        let cleanup = self.cleanup.clone();
        let owned = task.clone();

        let join = tokio::spawn(async move {
            // Hold permit until cleanup completes
            let _permit = permit;

            let (job_id, state) = match job {
                Ok(job) => {
                    let job_id = job.handle.job_id.clone();
                    let inner = tokio::spawn(async move { waiter.wait(&job).await });
                    let state = inner.await.unwrap_or_else(|err| {
                        tracing::error!(
                            target: TRACING_TARGET,
                            job_id = %job_id,
                            error = %err,
                            "Waiter task failed"
                        );
                        WaitState::Interrupted {
                            reason: format!("waiter task failed: {err}"),
                        }
                    });
                    (Some(job_id), state)
                }
                Err(state) => (None, state),
            };

            let cleanup = cleanup.finalize(&owned).await;
            pending.release();
            let success = state.is_success();
            TaskOutcome {
                task: owned,
                job_id,
                state,
                cleanup,
                success,
            }
        });

        Ok(TaskHandle { task, join })
    }
}
