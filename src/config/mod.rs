//! Configuration management
//!
//! The configuration file lists the monitoring servers to probe and how the
//! report should be written. YAML is the default format; files with a
//! `.toml` extension are read as TOML. Unknown fields are rejected.
//!
//! ```yaml
//! prometheus_configs:
//!   prod:
//!     address: http://prometheus.prod:9090
//!     basic_auth:
//!       username: admin
//!       password: secret
//! output_config:
//!   format: table
//!   file: /tmp/summary.txt
//! probe_config:
//!   timeout_seconds: 30
//! ```

use crate::collector::{DEFAULT_CALL_TIMEOUT, DEFAULT_INGESTION_RATE_QUERY};
use crate::error::{ConfigError, OutputError};
use crate::registry::{Credentials, TargetDescriptor, TargetRegistry};
use crate::report::OutputFormat;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Monitoring servers keyed by instance name
    #[serde(default)]
    pub prometheus_configs: BTreeMap<String, PrometheusConfig>,

    #[serde(default)]
    pub output_config: OutputConfig,

    #[serde(default)]
    pub probe_config: ProbeConfig,
}

/// Connection settings for one monitoring server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
}

/// HTTP Basic Authentication settings
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicAuth {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Report settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// One of `table`, `json`, `yaml`, `csv` (case-insensitive)
    #[serde(default = "default_format")]
    pub format: String,

    /// Write the report here instead of stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            file: None,
        }
    }
}

impl OutputConfig {
    /// The parsed format selector
    pub fn format(&self) -> Result<OutputFormat, OutputError> {
        self.format.parse()
    }
}

/// Probe sequence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Deadline for each remote call
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Instant query whose mean is reported as the ingestion rate
    #[serde(default = "default_ingestion_rate_query")]
    pub ingestion_rate_query: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            ingestion_rate_query: default_ingestion_rate_query(),
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_format() -> String {
    OutputFormat::default().to_string()
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_CALL_TIMEOUT.as_secs()
}

fn default_ingestion_rate_query() -> String {
    DEFAULT_INGESTION_RATE_QUERY.to_string()
}

impl Config {
    /// Load and validate a configuration file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a YAML file, or a TOML file if it has a `.toml` extension
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, a parse
    /// error if it is malformed or has unknown fields, and
    /// `ConfigError::ValidationError` if a value is unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let is_toml = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Parse and validate YAML configuration
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value that parsing alone cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, target) in &self.prometheus_configs {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "prometheus_configs: instance name must not be empty".to_string(),
                ));
            }
            if target.address.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "prometheus_configs.{}: address must not be empty",
                    name
                )));
            }
            if let Some(auth) = &target.basic_auth {
                if auth.username.is_empty() != auth.password.is_empty() {
                    warn!(
                        "prometheus_configs.{}: basic_auth needs both username and password, sending requests unauthenticated",
                        name
                    );
                }
            }
        }

        if self.prometheus_configs.is_empty() {
            warn!("No targets configured in prometheus_configs");
        }

        self.output_config
            .format()
            .map_err(|e| ConfigError::ValidationError(format!("output_config.format: {}", e)))?;

        if self.probe_config.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "probe_config.timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.probe_config.ingestion_rate_query.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "probe_config.ingestion_rate_query must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the target registry
    ///
    /// Credentials are attached only when both username and password are set.
    pub fn registry(&self) -> TargetRegistry {
        self.prometheus_configs
            .iter()
            .map(|(name, target)| {
                let descriptor = TargetDescriptor::new(name.clone(), target.address.trim());
                match &target.basic_auth {
                    Some(auth) if !auth.username.is_empty() && !auth.password.is_empty() => {
                        descriptor.with_credentials(Credentials::new(
                            auth.username.clone(),
                            auth.password.clone(),
                        ))
                    }
                    _ => descriptor,
                }
            })
            .collect()
    }

    /// Copy of this configuration with every password masked
    pub fn redacted(&self) -> Config {
        let mut config = self.clone();
        for target in config.prometheus_configs.values_mut() {
            if let Some(auth) = target.basic_auth.as_mut() {
                if !auth.password.is_empty() {
                    auth.password = "<secret>".to_string();
                }
            }
        }
        config
    }
}

impl fmt::Display for Config {
    /// YAML representation with passwords masked
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_yaml::to_string(&self.redacted()) {
            Ok(yaml) => f.write_str(&yaml),
            Err(e) => write!(f, "<error creating config string: {}>", e),
        }
    }
}
