//! Joining dispatched tasks into one verdict.

use futures::future::join_all;

use crate::dispatcher::{TaskHandle, TaskOutcome};
use crate::error::{PipelineError, Result};

/// Tracing target for aggregation.
pub const TRACING_TARGET: &str = "avroload_pipeline::aggregate";

/// Combined result of every load task of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// True iff every task succeeded.
    pub success: bool,
    /// Outcomes in dispatch order.
    pub outcomes: Vec<TaskOutcome>,
}

impl Verdict {
    fn from_outcomes(outcomes: Vec<TaskOutcome>) -> Self {
        let success = outcomes.iter().all(|outcome| outcome.success);
        Self { success, outcomes }
    }

    pub fn failed(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.success)
    }
}

/// Waits for every handle and folds the outcomes.
///
/// No task is cancelled when a sibling fails. Errors only if a task's own
/// pool task panicked or was aborted.
pub async fn aggregate(handles: Vec<TaskHandle>) -> Result<Verdict> {
    let (tasks, joins): (Vec<_>, Vec<_>) = handles.into_iter().map(TaskHandle::into_parts).unzip();

    let mut outcomes = Vec::with_capacity(joins.len());
    let mut failure = None;
    for (task, joined) in tasks.into_iter().zip(join_all(joins).await) {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    artifact = %task.artifact,
                    table = %task.table,
                    error = %err,
                    "Load task aborted"
                );
                failure.get_or_insert(err);
            }
        }
    }

    if let Some(err) = failure {
        return Err(PipelineError::worker_with_source("load task aborted", err));
    }

    let verdict = Verdict::from_outcomes(outcomes);
    tracing::info!(
        target: TRACING_TARGET,
        success = verdict.success,
        tasks = verdict.outcomes.len(),
        failed = verdict.failed().count(),
        "Load tasks finished"
    );

    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use avroload_object::ObjectStoreClient;
    use avroload_warehouse::TableRef;
    use avroload_warehouse::mock::{MockBehavior, MockWarehouse};
    use object_store::memory::InMemory;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::cleanup::CleanupCoordinator;
    use crate::dispatcher::JobDispatcher;
    use crate::task::LoadTask;
    use crate::waiter::{JobWaiter, WaitPolicy};

    fn dispatcher(warehouse: &MockWarehouse, slots: usize) -> (JobDispatcher, ObjectStoreClient) {
        let storage = ObjectStoreClient::new(InMemory::new(), "ingest");
        let waiter = JobWaiter::new(
            warehouse.clone().into_service(),
            WaitPolicy::default().with_poll_interval(Duration::from_secs(1), Duration::from_secs(1)),
            CancellationToken::new(),
        );
        let dispatcher = JobDispatcher::new(waiter, CleanupCoordinator::new(storage.clone()), slots);
        (dispatcher, storage)
    }

    fn task(storage: &ObjectStoreClient, table: &str) -> LoadTask {
        LoadTask {
            artifact: storage.artifact(format!("{table}.avro")),
            table: TableRef::new("clients_dataset", table),
            temporary: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_wait_in_parallel() {
        let warehouse =
            MockWarehouse::new().with_default(MockBehavior::succeed_after(Duration::from_secs(10)));
        let (dispatcher, storage) = dispatcher(&warehouse, 10);
        let started = Instant::now();

        let handles = vec![
            dispatcher.dispatch(task(&storage, "clients_full")).await.unwrap(),
            dispatcher.dispatch(task(&storage, "clients_mandatory")).await.unwrap(),
        ];
        let verdict = aggregate(handles).await.unwrap();

        assert!(verdict.success);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn single_slot_serializes_jobs() {
        let warehouse =
            MockWarehouse::new().with_default(MockBehavior::succeed_after(Duration::from_secs(10)));
        let (dispatcher, storage) = dispatcher(&warehouse, 1);
        let started = Instant::now();

        let first = dispatcher.dispatch(task(&storage, "clients_full")).await.unwrap();
        let second = dispatcher.dispatch(task(&storage, "clients_mandatory")).await.unwrap();
        let verdict = aggregate(vec![first, second]).await.unwrap();

        assert!(verdict.success);
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_fails_verdict_without_cancelling_sibling() {
        let warehouse = MockWarehouse::new()
            .with_default(MockBehavior::succeed_after(Duration::from_secs(10)))
            .with_table("clients_mandatory", MockBehavior::fail("invalid", "bad row"));
        let (dispatcher, storage) = dispatcher(&warehouse, 10);

        let handles = vec![
            dispatcher.dispatch(task(&storage, "clients_full")).await.unwrap(),
            dispatcher.dispatch(task(&storage, "clients_mandatory")).await.unwrap(),
        ];
        let verdict = aggregate(handles).await.unwrap();

        assert!(!verdict.success);
        assert!(verdict.outcomes[0].success);
        assert!(!verdict.outcomes[1].success);
        assert_eq!(verdict.failed().count(), 1);
    }

    #[tokio::test]
    async fn empty_join_succeeds() {
        let verdict = aggregate(Vec::new()).await.unwrap();
        assert!(verdict.success);
        assert!(verdict.outcomes.is_empty());
    }
}
