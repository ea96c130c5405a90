//! Removal of temporary artifacts once their load job is terminal.

use std::fmt;

use avroload_object::{ArtifactRef, ObjectStoreClient};

use crate::task::LoadTask;

/// Tracing target for cleanup.
pub const TRACING_TARGET: &str = "avroload_pipeline::cleanup";

/// What cleanup did for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The task's artifact is durable and was left in place.
    Skipped,
    Deleted,
    /// Deletion failed; the artifact may still exist.
    Failed(String),
}

impl fmt::Display for CleanupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped => f.write_str("skipped"),
            Self::Deleted => f.write_str("deleted"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Deletes the artifacts of temporary tasks.
///
/// Failures are logged and reported in the outcome. They never reach the
/// verdict.
#[derive(Debug, Clone)]
pub struct CleanupCoordinator {
    storage: ObjectStoreClient,
}

impl CleanupCoordinator {
    pub fn new(storage: ObjectStoreClient) -> Self {
        Self { storage }
    }

    /// Deletes the artifact of `task` if it is temporary.
    #[tracing::instrument(
        name = "cleanup.finalize",
        skip(self, task),
        fields(artifact = %task.artifact, temporary = task.temporary),
        target = TRACING_TARGET
    )]
    pub async fn finalize(&self, task: &LoadTask) -> CleanupOutcome {
        if !task.temporary {
            return CleanupOutcome::Skipped;
        }
        self.remove(&task.artifact).await
    }

    /// Guards a freshly written temporary artifact until it is handed to
    /// the task that finalizes it.
    pub fn guard(&self, artifact: ArtifactRef) -> CleanupGuard {
        CleanupGuard {
            cleanup: self.clone(),
            artifact: Some(artifact),
        }
    }

    /// Guards the artifact of `task` if it is temporary.
    pub fn guard_task(&self, task: &LoadTask) -> CleanupGuard {
        CleanupGuard {
            cleanup: self.clone(),
            artifact: task.temporary.then(|| task.artifact.clone()),
        }
    }

    async fn remove(&self, artifact: &ArtifactRef) -> CleanupOutcome {
        match self.storage.delete(artifact).await {
            Ok(()) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    artifact = %artifact,
                    "Temporary artifact deleted"
                );
                CleanupOutcome::Deleted
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    artifact = %artifact,
                    error = %err,
                    "Failed to delete temporary artifact"
                );
                CleanupOutcome::Failed(err.to_string())
            }
        }
    }
}

/// Owns a temporary artifact that no task is responsible for yet.
///
/// Dropping the guard schedules deletion of the artifact on the current
/// runtime, so a caller that goes away (a disconnected request, an aborted
/// task) does not leave it behind. [`release`](Self::release) hands
/// responsibility on; [`discard`](Self::discard) deletes it in place.
#[must_use = "dropping the guard deletes the artifact"]
#[derive(Debug)]
pub struct CleanupGuard {
    cleanup: CleanupCoordinator,
    artifact: Option<ArtifactRef>,
}

impl CleanupGuard {
    /// Gives up ownership without deleting anything.
    pub fn release(mut self) {
        self.artifact = None;
    }

    /// Deletes the artifact now.
    pub async fn discard(mut self) -> CleanupOutcome {
        let outcome = match &self.artifact {
            Some(artifact) => self.cleanup.remove(artifact).await,
            None => CleanupOutcome::Skipped,
        };
        self.artifact = None;
        outcome
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let Some(artifact) = self.artifact.take() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!(
                target: TRACING_TARGET,
                artifact = %artifact,
                "Abandoned temporary artifact left in place, no runtime to delete it"
            );
            return;
        };

        tracing::warn!(
            target: TRACING_TARGET,
            artifact = %artifact,
            "Deleting abandoned temporary artifact"
        );
        let cleanup = self.cleanup.clone();
        runtime.spawn(async move {
            cleanup.remove(&artifact).await;
        });
    }
}
