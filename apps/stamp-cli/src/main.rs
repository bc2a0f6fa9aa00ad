//! stamp-cli binary
//!
//! Logs go to stderr so stdout carries only the JSON report.

use clap::Parser;
use stamp_cli::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting stamp-cli v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = stamp_cli::run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
