//! Per-target probe result model
//!
//! A `ProbeResult` is the unit the aggregator collects and the reporter
//! renders. Its status is set once, when the result is constructed from the
//! outcome of the probe sequence, and `NotOk` carries the failure cause so
//! that a status without an error (or the reverse) cannot be represented.

use crate::error::ProbeError;
use crate::registry::TargetDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output columns in their fixed order
pub const COLUMNS: [&str; 11] = [
    "name",
    "address",
    "status",
    "error",
    "version",
    "storage_retention",
    "number_of_active_targets",
    "number_of_dropped_targets",
    "number_of_time_series",
    "number_of_chunks",
    "number_of_ingested_samples_per_second",
];

/// Health of a monitoring server after its probe sequence concluded
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeStatus {
    /// Every step of the probe sequence succeeded
    Ok,
    /// A step failed; holds the human-readable cause
    NotOk(String),
}

impl ProbeStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeStatus::Ok)
    }

    /// The failure cause, `None` when the status is `Ok`
    pub fn error(&self) -> Option<&str> {
        match self {
            ProbeStatus::Ok => None,
            ProbeStatus::NotOk(cause) => Some(cause),
        }
    }

    /// Rendered label used in every output format
    pub fn label(&self) -> &'static str {
        match self {
            ProbeStatus::Ok => "OK",
            ProbeStatus::NotOk(_) => "NotOK",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Values gathered by the probe sequence
///
/// Each field is `None` until the step that produces it succeeds. A field is
/// never written by any other step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeFields {
    /// Set by the build info step
    pub version: Option<String>,
    /// Set by the target list step
    pub active_target_count: Option<u64>,
    pub dropped_target_count: Option<u64>,
    /// Set by the runtime info step; the counts stay empty if the server omits them
    pub storage_retention: Option<String>,
    pub time_series_count: Option<u64>,
    pub chunk_count: Option<u64>,
    /// Set by the ingestion rate query step, left empty for an empty vector
    pub ingested_samples_per_second: Option<f64>,
}

/// Summary of one monitoring server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "SummaryRecord", try_from = "SummaryRecord")]
pub struct ProbeResult {
    name: String,
    address: String,
    status: ProbeStatus,
    fields: ProbeFields,
}

impl ProbeResult {
    /// Build the final result of a target's probe sequence
    ///
    /// # Arguments
    ///
    /// * `target` - The probed target; name and address are copied
    /// * `fields` - Values gathered by the steps that completed
    /// * `outcome` - `Ok(())` if every step succeeded, otherwise the first failure
    pub fn completed(
        target: &TargetDescriptor,
        fields: ProbeFields,
        outcome: Result<(), ProbeError>,
    ) -> Self {
        let status = match outcome {
            Ok(()) => ProbeStatus::Ok,
            Err(err) => ProbeStatus::NotOk(err.to_string()),
        };
        Self {
            name: target.name.clone(),
            address: target.address.clone(),
            status,
            fields,
        }
    }

    /// Build a result for a target that produced no values at all
    pub fn failed(target: &TargetDescriptor, error: ProbeError) -> Self {
        Self::completed(target, ProbeFields::default(), Err(error))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn status(&self) -> &ProbeStatus {
        &self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.status.error()
    }

    pub fn fields(&self) -> &ProbeFields {
        &self.fields
    }

    /// Cells of this result in `COLUMNS` order
    pub fn row(&self) -> [String; 11] {
        let record = SummaryRecord::from(self.clone());
        [
            record.name,
            record.address,
            record.status,
            record.error,
            record.version,
            record.storage_retention,
            record.number_of_active_targets,
            record.number_of_dropped_targets,
            record.number_of_time_series,
            record.number_of_chunks,
            record.number_of_ingested_samples_per_second,
        ]
    }
}

/// Flat, string-only wire form of a `ProbeResult`
///
/// Numbers are rendered as decimal text so every output format carries the
/// same digits. Empty fields are empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryRecord {
    pub name: String,
    pub address: String,
    pub status: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub storage_retention: String,
    #[serde(default)]
    pub number_of_active_targets: String,
    #[serde(default)]
    pub number_of_dropped_targets: String,
    #[serde(default)]
    pub number_of_time_series: String,
    #[serde(default)]
    pub number_of_chunks: String,
    #[serde(default)]
    pub number_of_ingested_samples_per_second: String,
}

impl From<ProbeResult> for SummaryRecord {
    fn from(result: ProbeResult) -> Self {
        let fields = result.fields;
        Self {
            name: result.name,
            address: result.address,
            status: result.status.label().to_string(),
            error: result.status.error().unwrap_or_default().to_string(),
            version: fields.version.unwrap_or_default(),
            storage_retention: fields.storage_retention.unwrap_or_default(),
            number_of_active_targets: format_count(fields.active_target_count),
            number_of_dropped_targets: format_count(fields.dropped_target_count),
            number_of_time_series: format_count(fields.time_series_count),
            number_of_chunks: format_count(fields.chunk_count),
            number_of_ingested_samples_per_second: fields
                .ingested_samples_per_second
                .map(format_rate)
                .unwrap_or_default(),
        }
    }
}

impl TryFrom<SummaryRecord> for ProbeResult {
    type Error = String;

    fn try_from(record: SummaryRecord) -> Result<Self, Self::Error> {
        let status = match (record.status.as_str(), record.error.is_empty()) {
            ("OK", true) => ProbeStatus::Ok,
            ("NotOK", false) => ProbeStatus::NotOk(record.error),
            ("OK", false) => return Err("status OK must not carry an error".to_string()),
            ("NotOK", true) => return Err("status NotOK requires an error".to_string()),
            (other, _) => return Err(format!("unknown status '{}'", other)),
        };

        let fields = ProbeFields {
            version: non_empty(record.version),
            storage_retention: non_empty(record.storage_retention),
            active_target_count: parse_field(
                "number_of_active_targets",
                &record.number_of_active_targets,
            )?,
            dropped_target_count: parse_field(
                "number_of_dropped_targets",
                &record.number_of_dropped_targets,
            )?,
            time_series_count: parse_field("number_of_time_series", &record.number_of_time_series)?,
            chunk_count: parse_field("number_of_chunks", &record.number_of_chunks)?,
            ingested_samples_per_second: parse_field(
                "number_of_ingested_samples_per_second",
                &record.number_of_ingested_samples_per_second,
            )?,
        };

        Ok(Self {
            name: record.name,
            address: record.address,
            status,
            fields,
        })
    }
}

fn format_count(count: Option<u64>) -> String {
    count.map(|c| c.to_string()).unwrap_or_default()
}

/// Render a rate as the shortest decimal that parses back to the same value
///
/// Whole numbers keep a trailing `.0` so rates are recognisable as floats.
pub fn format_rate(rate: f64) -> String {
    let text = rate.to_string();
    if rate.is_finite() && !text.contains('.') {
        format!("{}.0", text)
    } else {
        text
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_field<T: std::str::FromStr>(column: &str, value: &str) -> Result<Option<T>, String>
where
    T::Err: fmt::Display,
{
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|e| format!("invalid {} '{}': {}", column, value, e))
}
