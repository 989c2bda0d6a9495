//! Command-line entry point for mysql-river.

use anyhow::Context;
use clap::Parser;
use mysql_river::{ElasticOpts, ElasticSink, MysqlSource, RiverConfig, RiverOpts, Scheduler};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "mysql-river")]
#[command(about = "Periodically mirrors a MySQL query result into a document index")]
struct Cli {
    #[command(flatten)]
    river: RiverOpts,

    #[command(flatten)]
    elastic: ElasticOpts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = RiverConfig::resolve(cli.river).context("invalid river configuration")?;
    info!("Creating river {} for index {}", config.name, config.index);

    let source = Arc::new(MysqlSource::new(&config));
    let sink = Arc::new(ElasticSink::new(&cli.elastic).context("failed to build sink client")?);
    let scheduler = Scheduler::new(Arc::new(config), source, sink);

    scheduler.start();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            scheduler.stop().await;
        }
        // One-shot rivers finish on their own.
        _ = scheduler.join() => {}
    }

    Ok(())
}
