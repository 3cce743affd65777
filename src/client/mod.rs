//! Probe clients for the Prometheus HTTP API
//!
//! The collector only talks to a server through the `ProbeApi` trait, and
//! obtains one client per target from a `ClientFactory`.

pub mod http;
pub mod mock;

pub use http::{BasicAuthTransport, HttpClientFactory, PrometheusClient};
pub use mock::{MockClientFactory, MockProbeApi};

use crate::error::{ClientInitError, QueryError};
use crate::registry::TargetDescriptor;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by every remote call
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, QueryError>> + Send + 'a>>;

/// Remote operations the collector needs from one monitoring server
pub trait ProbeApi: Send + Sync {
    /// Fetch build and version information
    fn build_info(&self) -> ApiFuture<'_, BuildInfo>;

    /// Fetch the active and dropped scrape targets
    fn targets(&self) -> ApiFuture<'_, TargetsSummary>;

    /// Fetch runtime and storage information
    fn runtime_info(&self) -> ApiFuture<'_, RuntimeInfo>;

    /// Evaluate an instant query at the given time
    fn query<'a>(&'a self, expr: &'a str, time: DateTime<Utc>) -> ApiFuture<'a, QueryValue>;
}

/// Builds a probe client for a target
///
/// Implementations must not perform network I/O; construction only fails on
/// bad local input such as an unparseable address.
pub trait ClientFactory: Send + Sync {
    fn create(&self, target: &TargetDescriptor) -> Result<Box<dyn ProbeApi>, ClientInitError>;
}

/// Response of `/api/v1/status/buildinfo`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildInfo {
    pub version: String,
    pub revision: String,
    pub branch: String,
    pub build_user: String,
    pub build_date: String,
    pub go_version: String,
}

/// Response of `/api/v1/targets`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TargetsSummary {
    #[serde(rename = "activeTargets", default)]
    pub active: Vec<ActiveTarget>,
    #[serde(rename = "droppedTargets", default)]
    pub dropped: Vec<DroppedTarget>,
}

/// A target currently being scraped
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActiveTarget {
    pub discovered_labels: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub scrape_pool: String,
    pub scrape_url: String,
    pub health: String,
    pub last_error: String,
}

/// A target dropped by relabelling
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DroppedTarget {
    pub discovered_labels: BTreeMap<String, String>,
}

/// Response of `/api/v1/status/runtimeinfo`
///
/// Newer servers no longer report the head series and chunk counts; those
/// fields are `None` when absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeInfo {
    pub storage_retention: String,
    pub time_series_count: Option<u64>,
    pub chunk_count: Option<u64>,
}

/// A timestamped scalar value, encoded on the wire as `[<unix seconds>, "<value>"]`
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "(f64, String)")]
pub struct SamplePair {
    pub timestamp: f64,
    pub value: f64,
}

impl SamplePair {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

impl TryFrom<(f64, String)> for SamplePair {
    type Error = String;

    fn try_from((timestamp, raw): (f64, String)) -> Result<Self, Self::Error> {
        let value = raw
            .parse::<f64>()
            .map_err(|e| format!("invalid sample value '{}': {}", raw, e))?;
        Ok(Self { timestamp, value })
    }
}

/// A labelled sample of an instant vector
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    pub value: SamplePair,
}

impl Sample {
    pub fn new(value: f64) -> Self {
        Self {
            metric: BTreeMap::new(),
            value: SamplePair::new(0.0, value),
        }
    }
}

/// A labelled series of a range vector
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SampleStream {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    #[serde(default)]
    pub values: Vec<SamplePair>,
}

/// A timestamped string, encoded on the wire as `[<unix seconds>, "<value>"]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(f64, String)")]
pub struct StringValue {
    pub timestamp: f64,
    pub value: String,
}

impl From<(f64, String)> for StringValue {
    fn from((timestamp, value): (f64, String)) -> Self {
        Self { timestamp, value }
    }
}

/// Result of an instant query
///
/// Result types this client does not model decode to `Other` with their
/// wire name, so callers can report them instead of failing to decode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawQueryValue")]
pub enum QueryValue {
    Vector(Vec<Sample>),
    Scalar(SamplePair),
    Matrix(Vec<SampleStream>),
    String(StringValue),
    Other(String),
}

impl QueryValue {
    /// Wire name of the result type
    pub fn kind(&self) -> &str {
        match self {
            QueryValue::Vector(_) => "vector",
            QueryValue::Scalar(_) => "scalar",
            QueryValue::Matrix(_) => "matrix",
            QueryValue::String(_) => "string",
            QueryValue::Other(kind) => kind,
        }
    }
}

/// `{"resultType": ..., "result": ...}` before the result is interpreted
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQueryValue {
    result_type: String,
    #[serde(default)]
    result: serde_json::Value,
}

impl TryFrom<RawQueryValue> for QueryValue {
    type Error = String;

    fn try_from(raw: RawQueryValue) -> Result<Self, Self::Error> {
        let invalid = |e: serde_json::Error| format!("invalid {} result: {}", raw.result_type, e);
        match raw.result_type.as_str() {
            "vector" => serde_json::from_value(raw.result)
                .map(QueryValue::Vector)
                .map_err(invalid),
            "scalar" => serde_json::from_value(raw.result)
                .map(QueryValue::Scalar)
                .map_err(invalid),
            "matrix" => serde_json::from_value(raw.result)
                .map(QueryValue::Matrix)
                .map_err(invalid),
            "string" => serde_json::from_value(raw.result)
                .map(QueryValue::String)
                .map_err(invalid),
            other => Ok(QueryValue::Other(other.to_string())),
        }
    }
}
