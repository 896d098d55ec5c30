//! Command-line interface parsing for segwatch
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into the provider and refresh configuration the store starts with.

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::data::weather::{ProviderConfig, DEFAULT_REQUEST_TIMEOUT, OPEN_METEO_BASE_URL};
use crate::data::{all_segments, resolve};
use crate::store::{RefreshConfig, DEFAULT_REFRESH_INTERVAL};

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified segment id is not in the registry
    #[error("Unknown segment: '{0}'. Valid segments: {1}")]
    UnknownSegment(String, String),

    /// A zero refresh interval was requested
    #[error("Invalid interval: must be at least 1 second")]
    InvalidInterval,

    /// A zero fetch timeout was requested
    #[error("Invalid timeout: must be at least 1 second")]
    InvalidTimeout,
}

/// segwatch - weather snapshots for monitored segments
#[derive(Parser, Debug)]
#[command(name = "segwatch")]
#[command(about = "Weather snapshots for monitored segments, refreshed in the background")]
#[command(version)]
pub struct Cli {
    /// Segment to select on start (defaults to the first registry entry)
    ///
    /// Type another segment id on stdin while running to switch, or
    /// `refresh` to refresh immediately.
    #[arg(long, short, value_name = "SEGMENT")]
    pub segment: Option<String>,

    /// Base URL of the Open-Meteo compatible forecast API
    #[arg(long, env = "SEGWATCH_PROVIDER_URL", default_value = OPEN_METEO_BASE_URL)]
    pub provider_url: String,

    /// Seconds between background refreshes
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_REFRESH_INTERVAL.as_secs())]
    pub interval: u64,

    /// Seconds before an in-flight fetch is abandoned (defaults to the interval)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print the first snapshot and exit
    #[arg(long)]
    pub once: bool,

    /// Print snapshots as JSON lines
    #[arg(long)]
    pub json: bool,

    /// List the known segments and exit
    #[arg(long)]
    pub list: bool,
}

/// Configuration derived from CLI arguments for application startup
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub provider: ProviderConfig,
    pub refresh: RefreshConfig,
    /// Exit after the first published snapshot
    pub once: bool,
    /// Emit JSON lines instead of text summaries
    pub json: bool,
    /// Print the registry and exit
    pub list_segments: bool,
}

/// Comma separated list of registry ids, for error messages
fn valid_segment_ids() -> String {
    all_segments()
        .iter()
        .map(|segment| segment.id)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validates a segment argument against the registry.
///
/// # Returns
/// * `Ok(String)` with the id if it is known
/// * `Err(CliError::UnknownSegment)` otherwise
pub fn parse_segment_arg(s: &str) -> Result<String, CliError> {
    resolve(s)
        .map(|segment| segment.id.to_string())
        .map_err(|_| CliError::UnknownSegment(s.to_string(), valid_segment_ids()))
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(StartupConfig)` with appropriate settings
    /// * `Err(CliError)` for an unknown segment or a zero duration
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.interval == 0 {
            return Err(CliError::InvalidInterval);
        }
        if cli.timeout == Some(0) {
            return Err(CliError::InvalidTimeout);
        }

        let initial_segment = cli.segment.as_deref().map(parse_segment_arg).transpose()?;

        Ok(StartupConfig {
            provider: ProviderConfig {
                base_url: cli.provider_url.clone(),
                request_timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            refresh: RefreshConfig {
                refresh_interval: Duration::from_secs(cli.interval),
                fetch_timeout: cli.timeout.map(Duration::from_secs),
                initial_segment,
            },
            once: cli.once,
            json: cli.json,
            list_segments: cli.list,
        })
    }
}
