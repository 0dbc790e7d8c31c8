//! Device map generator.
//!
//! Runs one batch: every configured product, variant and resolution, then
//! exits non-zero if any product failed outright.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use map_common::{LightingVariant, Resolution};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use map_generator::config::DEFAULT_CONFIG_PATH;
use map_generator::{Dispatcher, GeneratorConfig, Overrides, ProductStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Parser, Debug)]
#[command(name = "map-generator")]
#[command(about = "Render day/night RGB565 device maps from gridded geophysical data")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "MAP_GENERATOR_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Only render these products (repeatable)
    #[arg(short, long = "product")]
    products: Vec<String>,

    /// Render these sizes instead of the configured list (repeatable)
    #[arg(short, long = "resolution")]
    resolutions: Vec<Resolution>,

    /// Render a single lighting variant
    #[arg(long)]
    variant: Option<LightingVariant>,

    /// Maximum units rendered at once
    #[arg(long)]
    concurrency: Option<usize>,

    /// Write a JSON batch report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "json")]
    log_format: LogFormat,
}

fn init_tracing(log_level: &str, format: LogFormat) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);

    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format)?;

    info!(config = %args.config.display(), "Starting map generator");

    let mut config = GeneratorConfig::load(&args.config)?;
    config.apply_overrides(&Overrides {
        products: args.products.clone(),
        resolutions: args.resolutions.clone(),
        variant: args.variant,
        concurrency: args.concurrency,
    })?;
    info!(
        products = ?config.products.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
        resolutions = ?config.resolutions.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        "Loaded configuration"
    );

    let report = Dispatcher::new(config).run().await;

    if let Some(path) = &args.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write batch report {:?}", path))?;
        info!(report = %path.display(), "Wrote batch report");
    }

    if !report.is_success() {
        for product in report.products.iter().filter(|p| p.status == ProductStatus::Failed) {
            error!(
                product = %product.name,
                error = product.error.as_deref().unwrap_or_default(),
                "Product failed"
            );
        }
        std::process::exit(report.exit_code());
    }

    Ok(())
}
