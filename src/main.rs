use clap::Parser;
use log::{debug, error, info, warn};
use prom_summary::client::HttpClientFactory;
use prom_summary::collector::Collector;
use prom_summary::config::Config;
use prom_summary::report::{OutputFormat, Reporter};
use prom_summary::runner::SummaryRunner;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Exit status for unusable configuration, matching clap's usage errors
const EXIT_CONFIG_ERROR: i32 = 2;

/// Command-line arguments for the Prometheus summary tool
#[derive(Parser, Debug)]
#[command(
    name = "prom-summary",
    about = "Summarize the health of a fleet of Prometheus servers",
    long_about = "Probes every configured Prometheus server concurrently for its version, \
                  scrape targets, TSDB statistics and ingestion rate, then prints one \
                  summary row per server as a table, JSON, YAML or CSV."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        long = "config.file",
        value_name = "FILE",
        default_value = "etc/config.yml",
        help = "Configuration file path (YAML, or TOML with a .toml extension)"
    )]
    config_file: PathBuf,

    /// Report format override
    #[arg(
        short = 'o',
        long = "output.format",
        value_name = "FORMAT",
        help = "Output format: table, json, yaml or csv"
    )]
    output_format: Option<OutputFormat>,

    /// Report destination override
    #[arg(
        long = "output.file",
        value_name = "FILE",
        help = "Write the report to this file instead of stdout"
    )]
    output_file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if self.config_file.exists() && !self.config_file.is_file() {
            return Err(format!(
                "Configuration path is not a file: {}",
                self.config_file.display()
            ));
        }

        if let Some(ref output_file) = self.output_file {
            if output_file.is_dir() {
                return Err(format!(
                    "Output path is a directory: {}",
                    output_file.display()
                ));
            }
        }

        Ok(())
    }

    /// Apply command-line overrides on top of the loaded configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(format) = self.output_format {
            config.output_config.format = format.to_string();
        }
        if let Some(ref output_file) = self.output_file {
            config.output_config.file = Some(output_file.clone());
        }
    }
}

fn init_logging(verbose: bool) {
    if verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
}

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(EXIT_CONFIG_ERROR);
    }

    let mut config = match Config::from_file(&cli.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };
    cli.apply_overrides(&mut config);
    debug!("Loaded configuration:\n{}", config);

    let reporter = match Reporter::from_config(&config.output_config) {
        Ok(reporter) => reporter,
        Err(e) => {
            error!("Invalid output configuration: {}", e);
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    // Ctrl-C cancels in-flight calls; the partial report is still written
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), cancelling in-flight requests...");
        handler_token.cancel();
    }) {
        warn!("Failed to set SIGINT handler: {}", e);
    }

    let probe = &config.probe_config;
    let factory = Arc::new(HttpClientFactory::new(probe.timeout()));
    let collector = Collector::new(factory, cancel)
        .with_call_timeout(probe.timeout())
        .with_ingestion_query(probe.ingestion_rate_query.clone());

    let results = SummaryRunner::new(collector).run(&config.registry()).await;

    if let Err(e) = reporter.write(&results) {
        warn!("Error printing result: {}", e);
    }
}
