//! HTTP server startup and graceful shutdown.

/// Tracing target for server startup events.
pub const TRACING_TARGET_STARTUP: &str = "avroload_cli::server::startup";

/// Tracing target for server shutdown events.
pub const TRACING_TARGET_SHUTDOWN: &str = "avroload_cli::server::shutdown";

mod error;
mod http_server;
mod shutdown;

pub use error::{ServerError, ServerResult as Result};
pub use http_server::serve_http as serve;
pub use shutdown::shutdown_signal;
