//! Binary crate for the `forecast` command-line weather widget.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Interactive configuration and the interactive widget loop
//! - Rendering the session's view state

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod position;
mod render;

const DEFAULT_LOG_FILTER: &str = "warn";

/// Directives from `RUST_LOG` if they parse, otherwise `warn`.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cmd = cli::Cli::parse();
    cmd.run().await
}
