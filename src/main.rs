use anyhow::{Context, Result};
use clap::Parser;
use humansize::{format_size, DECIMAL};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bucketsync::cli::{Cli, Commands, SyncArgs};
use bucketsync::config::{FileConfig, Settings};
use bucketsync::fs::S3Connector;
use bucketsync::sync::{SyncEngine, SyncReport};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.log_level()) {
        eprintln!("Error: {:#}", err);
        std::process::exit(2);
    }

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over the verbosity flags when set
fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let file = FileConfig::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync(args) => sync(file, args).await,
    }
}

async fn sync(file: FileConfig, args: SyncArgs) -> Result<()> {
    let settings = Settings::merge(file, args.overrides())?;
    let connector = S3Connector::new(settings.endpoint.clone(), settings.credentials.clone());

    let mut engine = SyncEngine::new(settings.sync_pair(&args.source, &args.target), Arc::new(connector))
        .with_options(settings.sync_options()?);

    let report = engine
        .run()
        .await
        .with_context(|| format!("sync {} -> {} failed", args.source, args.target))?;

    println!("{}", summary(&report));
    Ok(())
}

fn summary(report: &SyncReport) -> String {
    if report.dry_run {
        return format!(
            "Dry run ({}): {} file(s) would be transferred.",
            report.mode, report.planned
        );
    }
    format!(
        "Synced {} ({}): {} file(s), {} in {:.2}s.",
        report.mode,
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.transferred,
        format_size(report.bytes, DECIMAL),
        report.elapsed.as_secs_f64()
    )
}
