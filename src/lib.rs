/// Error types for the summary tool
pub mod error;

/// Monitoring server descriptors keyed by instance name
pub mod registry;

/// Per-target result record and its flat output form
pub mod summary;

/// Prometheus HTTP API client and test doubles
pub mod client;

/// Per-target probe sequence
pub mod collector;

/// Thread-safe result aggregation
pub mod aggregator;

/// Concurrent collection driver
pub mod runner;

/// Report rendering in table, JSON, YAML and CSV
pub mod report;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use error::{ClientInitError, ConfigError, OutputError, ProbeError, QueryError};
pub use report::{OutputFormat, Reporter};
pub use summary::{ProbeResult, ProbeStatus};
