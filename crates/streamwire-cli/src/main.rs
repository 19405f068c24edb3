//! streamwire CLI - probe RTMP endpoints and inspect H.264 input
//!
//! `probe` drives a queued socket against a live endpoint and reports what
//! the listener saw. `inspect` frames an Annex-B elementary stream into AVC
//! video messages and prints the FLV tags they would be recorded as.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use streamwire_transport::SocketConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod inspect;
mod probe;

/// streamwire - RTMP-style media framing tools
#[derive(Parser)]
#[command(name = "streamwire")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Socket configuration file (TOML)
    #[arg(short, long, global = true, env = "STREAMWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to an endpoint and report connect, timeout or close
    Probe {
        /// Remote host
        host: String,

        /// Remote port
        #[arg(default_value_t = streamwire_core::DEFAULT_RTMP_PORT)]
        port: u16,

        /// Connect timeout in milliseconds (overrides the config file)
        #[arg(short, long)]
        timeout_ms: Option<u64>,

        /// Stay connected this long and report inbound bytes
        #[arg(long, default_value = "0")]
        hold_ms: u64,
    },

    /// Frame an Annex-B H.264 file into AVC video messages
    Inspect {
        /// Annex-B elementary stream
        file: PathBuf,

        /// Milliseconds between pictures
        #[arg(long, default_value = "40")]
        frame_ms: u32,

        /// Only print the summary
        #[arg(short, long)]
        quiet: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.log_level, cli.json_logs)?;

    match cli.command {
        Commands::Probe {
            host,
            port,
            timeout_ms,
            hold_ms,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(ms) = timeout_ms {
                config.connect_timeout_ms = ms;
            }
            probe::run_probe(config, &host, port, hold_ms).await?;
        }

        Commands::Inspect {
            file,
            frame_ms,
            quiet,
        } => {
            inspect::run_inspect(&file, frame_ms, quiet)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SocketConfig> {
    let Some(path) = path else {
        return Ok(SocketConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SocketConfig = toml::from_str(&text)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}
