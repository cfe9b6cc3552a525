//! # mq-drain CLI
//!
//! Connects to a queue manager over a TLS client channel, drains one queue
//! with exclusive input, prints each message and exits with the connection's
//! completion code.
//!
//! Connection parameters come from the `QUEUE_MANAGER`, `QUEUE`, `CHANNEL`,
//! `CONNECTION_URL` and `KEY_PATH` environment variables. Built with the `mqi`
//! feature the binary connects through the native IBM MQ client. `--embedded`
//! runs it against an in-memory queue manager defined from the same values
//! instead, with `--seed` and `--seed-file` preloading its queue.

use clap::Parser;
use mq_runtime::{MessageId, QueueManagerConnector};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod config;
pub mod drain;
mod embedded;

pub use config::{ConfigError, DrainConfig};
pub use drain::{DrainClient, DrainOptions, DrainReport, DEFAULT_WAIT_INTERVAL_MS};

// ============================================================================
// CLI Structure
// ============================================================================

/// mq-drain - drain a queue over a TLS client channel
#[derive(Parser, Debug)]
#[command(name = "mq-drain")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drain a queue over a TLS client channel and print each message")]
pub struct Cli {
    /// Fetch only the message with this id (hex, up to 24 bytes)
    #[arg(long, env = "MSG_ID")]
    pub msg_id: Option<String>,

    /// Get wait interval in milliseconds
    #[arg(long, default_value_t = DEFAULT_WAIT_INTERVAL_MS)]
    pub wait_ms: u32,

    /// Use an in-memory queue manager instead of the native MQ client
    #[arg(long)]
    pub embedded: bool,

    /// Message to preload onto the embedded queue (repeatable)
    #[arg(long = "seed", requires = "embedded")]
    pub seeds: Vec<String>,

    /// File of messages to preload onto the embedded queue, one per line
    #[arg(long, requires = "embedded")]
    pub seed_file: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("Cannot read seed file {path}: {source}")]
    SeedFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging initialization failed: {message}")]
    Logging { message: String },

    #[error("No queue manager provider: {message}")]
    ProviderUnavailable { message: String },
}

impl CliError {
    /// Process exit code, following the BSD `sysexits` values
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 78,
            Self::InvalidArgument { .. } => 64,
            Self::SeedFile { .. } => 66,
            Self::Io(_) => 74,
            Self::Logging { .. } => 70,
            Self::ProviderUnavailable { .. } => 69,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point; returns the process exit code
pub async fn run_cli() -> Result<i32, CliError> {
    let cli = Cli::parse();
    initialize_logging(&cli)?;
    run(cli).await
}

/// Execute a drain run for already-parsed arguments.
///
/// Configuration is read from the process environment.
pub async fn run(cli: Cli) -> Result<i32, CliError> {
    let options = DrainOptions {
        wait_interval_ms: cli.wait_ms,
        msg_id: parse_msg_id(cli.msg_id.as_deref())?,
    };

    let config = DrainConfig::from_env()?;
    let connector: Box<dyn QueueManagerConnector> = if cli.embedded {
        let seeds = collect_seeds(&cli)?;
        debug!(seeds = seeds.len(), "Preparing embedded queue manager");
        Box::new(embedded::connector_for(&config, &seeds))
    } else {
        native_connector()?
    };

    let stdout = std::io::stdout();
    let mut client = DrainClient::new(config, options, stdout.lock());
    let report = client.run(connector.as_ref()).await?;

    info!(
        exit_code = report.exit_code,
        messages = report.messages_received,
        "mq-drain complete"
    );
    Ok(report.exit_code)
}

#[cfg(feature = "mqi")]
fn native_connector() -> Result<Box<dyn QueueManagerConnector>, CliError> {
    debug!("Using the native IBM MQ client");
    Ok(Box::new(mq_runtime::IbmMqConnector::new()))
}

#[cfg(not(feature = "mqi"))]
fn native_connector() -> Result<Box<dyn QueueManagerConnector>, CliError> {
    Err(CliError::ProviderUnavailable {
        message: "built without the `mqi` feature; rebuild with it or pass --embedded"
            .to_string(),
    })
}

/// Initialize logging based on CLI arguments.
///
/// `RUST_LOG` takes precedence over `--log-level`. Logs go to stderr.
fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .map_err(|e| CliError::Logging {
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

/// Parse the optional `--msg-id` value; blank means no filter
fn parse_msg_id(value: Option<&str>) -> Result<Option<MessageId>, CliError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(hex) => MessageId::from_hex(hex)
            .map(Some)
            .map_err(|e| CliError::InvalidArgument {
                arg: "--msg-id".to_string(),
                message: e.to_string(),
            }),
    }
}

/// Gather `--seed` values followed by the non-empty lines of `--seed-file`
fn collect_seeds(cli: &Cli) -> Result<Vec<String>, CliError> {
    let mut seeds = cli.seeds.clone();

    if let Some(path) = &cli.seed_file {
        let contents = std::fs::read_to_string(path).map_err(|source| CliError::SeedFile {
            path: path.clone(),
            source,
        })?;
        seeds.extend(embedded::read_seed_lines(&contents));
    }

    Ok(seeds)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
