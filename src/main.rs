//! Similar-products service.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────┐
//!                       │               SIMILAR PRODUCTS                   │
//!   GET /product/{id}/  │  ┌────────┐   ┌─────────────┐   ┌─────────────┐  │
//!   similar ────────────┼─▶│  http  │──▶│ aggregation │──▶│  upstream   │  │
//!                       │  │ server │   │ fan-out     │   │ resilient   │  │
//!                       │  └────────┘   └─────────────┘   └──────┬──────┘  │
//!                       │                                        │         │
//!                       │         ┌──────────────────────────────┤         │
//!                       │         ▼                              ▼         │
//!                       │  ┌─────────────────────────┐   ┌─────────────┐   │    Product
//!                       │  │ resilience              │   │ upstream    │───┼──▶ catalog
//!                       │  │ cache / circuit / retry │   │ http client │   │
//!                       │  └─────────────────────────┘   └─────────────┘   │
//!                       │                                                  │
//!                       │  config · observability · lifecycle             │
//!                       └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use similar_products::config::{load_config, validation::validate_config, ConfigError, ServiceConfig};
use similar_products::lifecycle::startup;
use similar_products::observability::logging;

#[derive(Debug, Parser)]
#[command(name = "similar-products", version, about = "Similar products aggregation service")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `upstream.base_url`.
    #[arg(long)]
    upstream_url: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<ServiceConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(url) = &cli.upstream_url {
        config.upstream.base_url = url.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    logging::init(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "similar-products starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        max_concurrency = config.aggregation.max_concurrency,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
