//! Report rendering and delivery
//!
//! Renders the aggregated results in one of a closed set of formats and
//! writes them to stdout or a file.

pub mod csv;
pub mod table;

use crate::config::OutputConfig;
use crate::error::OutputError;
use crate::summary::ProbeResult;
use log::{debug, info};
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;

/// Supported report encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable aligned columns
    #[default]
    Table,
    /// Pretty-printed JSON array of records
    Json,
    /// YAML sequence of records
    Yaml,
    /// Header row plus one row per record
    Csv,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Table,
        OutputFormat::Json,
        OutputFormat::Yaml,
        OutputFormat::Csv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    /// Parse a format selector, ignoring case and surrounding whitespace
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let selector = s.trim().to_lowercase();
        OutputFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == selector)
            .ok_or_else(|| OutputError::UnsupportedFormat(s.to_string()))
    }
}

/// Where the rendered report goes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Destination {
    #[default]
    Stdout,
    /// Created, or truncated if it exists
    File(PathBuf),
}

/// Renders and delivers the final report
#[derive(Debug, Clone)]
pub struct Reporter {
    format: OutputFormat,
    destination: Destination,
}

impl Reporter {
    /// Create a reporter for an explicit format and destination
    ///
    /// # Examples
    ///
    /// ```
    /// use prom_summary::report::{Destination, OutputFormat, Reporter};
    ///
    /// let reporter = Reporter::new(OutputFormat::Csv, Destination::Stdout);
    /// let rendered = reporter.render(&[]).unwrap();
    /// assert!(rendered.starts_with("name,address,status,error"));
    /// ```
    pub fn new(format: OutputFormat, destination: Destination) -> Self {
        Self {
            format,
            destination,
        }
    }

    /// Build a reporter from the output section of the configuration
    ///
    /// # Errors
    ///
    /// Returns `OutputError::UnsupportedFormat` for an unknown format selector.
    pub fn from_config(config: &OutputConfig) -> Result<Self, OutputError> {
        let format = config.format()?;
        let destination = match &config.file {
            Some(path) => Destination::File(path.clone()),
            None => Destination::Stdout,
        };
        Ok(Self::new(format, destination))
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Render the results in the configured format
    pub fn render(&self, results: &[ProbeResult]) -> Result<String, OutputError> {
        let rendered = match self.format {
            OutputFormat::Table => table::render(results),
            OutputFormat::Json => {
                let mut json = serde_json::to_string_pretty(results)?;
                json.push('\n');
                json
            }
            OutputFormat::Yaml => serde_yaml::to_string(results)?,
            OutputFormat::Csv => csv::render(results),
        };
        Ok(rendered)
    }

    /// Render the results and write them to the destination
    ///
    /// The report is rendered before the destination is opened, so a
    /// rendering failure never truncates an existing file.
    pub fn write(&self, results: &[ProbeResult]) -> Result<(), OutputError> {
        let rendered = self.render(results)?;
        debug!(
            "Rendered {} result(s) as {} ({} bytes)",
            results.len(),
            self.format,
            rendered.len()
        );

        match &self.destination {
            Destination::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(rendered.as_bytes())?;
                stdout.flush()?;
            }
            Destination::File(path) => {
                let mut file = File::create(path)?;
                file.write_all(rendered.as_bytes())?;
                file.flush()?;
                info!("Report written to {}", path.display());
            }
        }
        Ok(())
    }
}
