//! Tracing subscriber setup for the CLI.
//!
//! Logs go to stderr (or a file) so stdout stays free for command output.
//! `RUST_LOG` overrides the default level unless `--verbose` is given.

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

fn build_filter(verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new(default_directive(true));
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(false)))
}

/// Install the global subscriber. Call once, at startup.
pub fn init_logging(verbose: bool, format: LogFormat, log_file: Option<&Path>) -> Result<()> {
    let filter = build_filter(verbose);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let writer = Mutex::new(file);
            match format {
                LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(false).boxed(),
                LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
            }
        }
        None => match format {
            LogFormat::Text => fmt::layer().with_writer(std::io::stderr).boxed(),
            LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        },
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")
}
