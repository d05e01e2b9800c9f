//! dump-diff command line tool
//!
//! Compares two SQL dump snapshots and writes the data-change statements
//! per table into an output directory.

mod args;
mod workflow;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,dump_diff_cli=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let options = args::Cli::parse().into_options()?;

    info!("starting dump diff run");
    let summary = workflow::Workflow::new(options).run();
    info!(
        tables = summary.tables.len(),
        inserts = summary.total_inserts,
        updates = summary.total_updates,
        deletes = summary.total_deletes,
        "run completed"
    );

    Ok(())
}
