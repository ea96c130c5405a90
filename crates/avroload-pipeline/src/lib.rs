#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod aggregate;
pub mod cleanup;
pub mod config;
pub mod dispatcher;
mod error;
pub mod generator;
mod pipeline;
pub mod projector;
pub mod schema;
pub mod task;
pub mod waiter;

pub use aggregate::{Verdict, aggregate};
pub use cleanup::{CleanupCoordinator, CleanupGuard, CleanupOutcome};
pub use config::PipelineConfig;
pub use dispatcher::{JobDispatcher, TaskHandle, TaskOutcome};
pub use error::{BoxedError, PipelineError, Result};
pub use pipeline::{IngestPipeline, TRACING_TARGET};
pub use projector::{ProjectionError, ProjectionSummary, project, project_artifact};
pub use task::{LoadTask, TableNames, build_load_tasks};
pub use waiter::{JobWaiter, LoadJob, WaitPolicy, WaitState};
