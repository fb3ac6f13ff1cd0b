use crate::aggregator::{aggregate, CategoryAggregates};
use crate::assembler::{recency_cutoff, UserContentAssembler};
use crate::index::build_index;
use crate::resolver::{CategoryResolver, PortfolioResolver};
use crate::types::{ContentBundle, DigestError, PipelineConfig, Result, RunStats, Subscriber};
use chrono::{DateTime, Utc};
use interfaces::{category_set, CategoryId, ContentProvider};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Staged aggregation from subscriber interests to per-subscriber bundles.
///
/// Each stage runs as its own task; stages are connected by unbounded
/// channels and a stage finishes when its upstream sender is dropped.
pub struct DigestPipeline {
    provider: Arc<dyn ContentProvider>,
    config: PipelineConfig,
}

/// Output of one pipeline run.
pub struct DigestRun {
    pub stats: RunStats,
    /// Closed by the assembler after the last subscriber's bundle.
    pub bundles: mpsc::UnboundedReceiver<ContentBundle>,
}

impl DigestRun {
    fn empty() -> Self {
        let (_, bundles) = mpsc::unbounded_channel();
        Self {
            stats: RunStats::default(),
            bundles,
        }
    }

    /// Drain every bundle until the assembler closes the queue.
    pub async fn collect(mut self) -> Vec<ContentBundle> {
        let mut bundles = Vec::new();
        while let Some(bundle) = self.bundles.recv().await {
            bundles.push(bundle);
        }
        bundles
    }
}

impl DigestPipeline {
    pub fn new(provider: Arc<dyn ContentProvider>, config: PipelineConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, subscribers: Vec<Subscriber>) -> Result<DigestRun> {
        self.run_at(subscribers, Utc::now()).await
    }

    /// Run with an explicit clock for the recency cutoff.
    pub async fn run_at(&self, subscribers: Vec<Subscriber>, now: DateTime<Utc>) -> Result<DigestRun> {
        let span = info_span!("digest_run", run_id = %Uuid::new_v4());
        async move {
            if subscribers.is_empty() {
                info!("No subscribers, nothing to aggregate");
                return Ok(DigestRun::empty());
            }

            let cutoff = recency_cutoff(now, self.config.lookback)?;
            let categories = category_set(&subscribers);
            info!("{} subscribers across {} categories", subscribers.len(), categories.len());

            let (aggregates, stats) = self.aggregate_categories(categories).await?;
            info!("Run stats: {}", stats);

            if let Some(limit) = self.config.max_fetch_failures {
                if stats.total_failures() > limit {
                    return Err(DigestError::TooManyFailures {
                        failures: stats.total_failures(),
                        limit,
                    });
                }
            }

            let assembler = UserContentAssembler::new(Arc::new(aggregates), cutoff);
            let (bundle_tx, bundles) = mpsc::unbounded_channel();
            tokio::spawn(assembler.run(subscribers, bundle_tx).in_current_span());

            Ok(DigestRun { stats, bundles })
        }
        .instrument(span)
        .await
    }

    /// Resolve categories to portfolios, fetch them, and fold the results
    /// back onto categories. The returned mapping is final.
    pub async fn aggregate_categories(&self, categories: Vec<CategoryId>) -> Result<(CategoryAggregates, RunStats)> {
        let concurrency = self.config.max_concurrent_fetches;

        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let category_task = tokio::spawn(
            CategoryResolver::new(self.provider.clone(), concurrency)
                .run(categories, link_tx)
                .in_current_span(),
        );
        let index_task = tokio::spawn(build_index(link_rx).in_current_span());

        let category_report = category_task.await?;
        let index = Arc::new(index_task.await?);

        let (page_tx, page_rx) = mpsc::unbounded_channel();
        let portfolio_task = tokio::spawn(
            PortfolioResolver::new(self.provider.clone(), concurrency)
                .run(index.portfolio_ids(), page_tx)
                .in_current_span(),
        );
        let aggregate_task = {
            let index = index.clone();
            tokio::spawn(async move { aggregate(&index, page_rx).await }.in_current_span())
        };

        let portfolio_report = portfolio_task.await?;
        let aggregates = aggregate_task.await?;

        let stats = RunStats {
            categories_requested: category_report.requested,
            categories_resolved: category_report.resolved,
            category_failures: category_report.failures,
            portfolios_requested: portfolio_report.requested,
            portfolios_resolved: portfolio_report.resolved,
            portfolio_failures: portfolio_report.failures,
            aggregates: aggregates.len(),
        };
        Ok((aggregates, stats))
    }
}
