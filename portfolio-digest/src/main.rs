use chrono::{Datelike, Utc};
use clap::Parser;
use email_delivery::{construct_emailer, Stage};
use interfaces::{due_subscribers, SubscriberStore};
use portfolio_digest::config::Cli;
use portfolio_digest::{dispatch_bundles, DabbleClient, DigestPipeline, HtmlDigestRenderer, JsonSubscriberStore};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let pipeline_config = cli.pipeline_config()?;
    let stage = Stage::from_env()?;
    info!("Starting portfolio digest ({:?})", stage);

    let store = JsonSubscriberStore::new(&cli.subscribers);
    let subscribers = store.load_subscribers().await?;

    let subscribers = if cli.ignore_schedule {
        subscribers
    } else {
        let today = Utc::now().weekday();
        let due = due_subscribers(subscribers, today);
        info!("{} subscribers due on {}", due.len(), today);
        due
    };

    if subscribers.is_empty() {
        info!("No users");
        return Ok(());
    }

    // Build the notifier before fetching so misconfiguration fails fast.
    let notifier = construct_emailer(stage)?;
    let provider = Arc::new(DabbleClient::new(cli.fetch_config())?);
    let pipeline = DigestPipeline::new(provider, pipeline_config);

    let run = pipeline.run(subscribers).await.map_err(|e| {
        error!("Digest run aborted: {}", e);
        e
    })?;
    info!("Aggregation finished: {}", run.stats);

    let sender = tokio::spawn(dispatch_bundles(
        run.bundles,
        Arc::new(HtmlDigestRenderer::default()),
        notifier,
    ));
    let report = sender.await?;

    info!("Portfolio digest finished: {} sent, {} failed", report.sent, report.failed);
    Ok(())
}
