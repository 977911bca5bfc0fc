//! tp - smoke binary for the taskprogress library
//!
//! Runs a synthetic workload through the reporter so the emission path can
//! be observed from a shell. Progress traffic goes to the dedicated
//! `progress` target at DEBUG; it is enabled by default here and filterable
//! with --log-filter or RUST_LOG.

use std::ops::ControlFlow;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use taskprogress::cli::{Cli, Command};
use taskprogress::{LogSink, Reporter, ReporterConfig, TaskId};

fn setup_logging(filter: Option<&str>) -> Result<()> {
    let filter = match filter {
        Some(directives) => tracing_subscriber::EnvFilter::try_new(directives).context("Invalid log filter")?,
        None => tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("info".parse()?)
            .add_directive("progress=debug".parse()?),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_filter.as_deref())?;

    match cli.command {
        Command::Demo { iterations, threshold } => {
            let mut config = ReporterConfig::default();
            if let Some(threshold) = threshold {
                config.threshold = threshold;
            }
            let reporter = Reporter::with_config(Arc::new(LogSink), config)?;

            info!(iterations, "starting demo workload");
            let run = reporter.scope("demo")?;

            let mut checksum = 0u64;
            reporter.drive("warmup", 0..iterations, |i| {
                checksum = checksum.wrapping_add(i as u64);
                ControlFlow::Continue(())
            })?;
            info!(checksum, "warmup finished");

            let table = reporter.collect2("table", 0..8, 0..4, |col, row| col * row)?;
            info!(cells = table.len(), "table computed");

            run.exit();
            info!("demo complete");
        }
        Command::Derive { key } => {
            println!("{}", TaskId::derive(key.as_bytes()));
        }
    }

    Ok(())
}
