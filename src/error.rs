use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while constructing a probe client for a target
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientInitError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to build HTTP transport: {0}")]
    Transport(String),
}

/// Errors returned by a single remote call against a monitoring server
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{error_type}: {message}")]
    Api { error_type: String, message: String },

    #[error("invalid response format: {0}")]
    InvalidResponse(String),

    #[error("unsupported result type: '{0}'")]
    UnsupportedResultType(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            QueryError::InvalidResponse(err.to_string())
        } else {
            QueryError::Http(err.to_string())
        }
    }
}

/// The step of the probe sequence that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStep {
    InitClient,
    BuildInfo,
    Targets,
    RuntimeInfo,
    IngestionRate,
}

impl fmt::Display for ProbeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProbeStep::InitClient => "initializing client",
            ProbeStep::BuildInfo => "getting build info",
            ProbeStep::Targets => "getting targets",
            ProbeStep::RuntimeInfo => "getting runtime info",
            ProbeStep::IngestionRate => "querying ingestion rate",
        };
        f.write_str(label)
    }
}

/// First failure of a target's probe sequence
///
/// The `Display` output is the cause recorded in the target's result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    #[error("initializing client: {0}")]
    Init(#[from] ClientInitError),

    #[error("{step}: {source}")]
    Query {
        step: ProbeStep,
        #[source]
        source: QueryError,
    },

    #[error("collection task failed: {0}")]
    Task(String),
}

impl ProbeError {
    /// Wrap a remote query failure with the step it happened in
    pub fn query(step: ProbeStep, source: QueryError) -> Self {
        ProbeError::Query { step, source }
    }

    /// The step that failed, if the failure belongs to the probe sequence
    pub fn step(&self) -> Option<ProbeStep> {
        match self {
            ProbeError::Init(_) => Some(ProbeStep::InitClient),
            ProbeError::Query { step, .. } => Some(*step),
            ProbeError::Task(_) => None,
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Errors that can occur while rendering or writing the report
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("unsupported output format: '{0}' (expected table, json, yaml or csv)")]
    UnsupportedFormat(String),

    #[error("failed to serialize report: {0}")]
    Serialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for OutputError {
    fn from(err: serde_json::Error) -> Self {
        OutputError::Serialize(err.to_string())
    }
}

impl From<serde_yaml::Error> for OutputError {
    fn from(err: serde_yaml::Error) -> Self {
        OutputError::Serialize(err.to_string())
    }
}
