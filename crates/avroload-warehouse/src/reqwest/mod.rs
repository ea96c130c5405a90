//! Reqwest-based BigQuery REST client.
//!
//! This module provides a BigQuery implementation of the
//! [`WarehouseProvider`](crate::WarehouseProvider) trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use avroload_warehouse::reqwest::{BigQueryClient, BigQueryConfig};
//! use avroload_warehouse::WarehouseService;
//!
//! let client = BigQueryClient::new(BigQueryConfig::new("my-project"))?;
//!
//! // Convert to a service for dependency injection
//! let service: WarehouseService = client.into_service();
//! ```

mod client;
mod config;
mod error;
mod model;

pub use client::BigQueryClient;
pub use config::{BigQueryConfig, DEFAULT_ENDPOINT, DEFAULT_TIMEOUT_SECS};
pub use error::{Error, Result};

/// Tracing target for BigQuery client operations.
pub const TRACING_TARGET: &str = "avroload_warehouse::reqwest";
