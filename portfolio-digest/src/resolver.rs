use crate::types::{CategoryPortfolios, PortfolioPage};
use futures::stream::{self, StreamExt};
use interfaces::{CategoryId, ContentProvider, PortfolioId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome counters for one resolver pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub requested: usize,
    pub resolved: usize,
    pub failures: usize,
}

/// Resolves categories into the portfolios related to them.
pub struct CategoryResolver {
    provider: Arc<dyn ContentProvider>,
    concurrency: usize,
}

impl CategoryResolver {
    pub fn new(provider: Arc<dyn ContentProvider>, concurrency: usize) -> Self {
        Self {
            provider,
            concurrency: concurrency.max(1),
        }
    }

    /// Send one link per category that resolved at least one portfolio, then
    /// close `out` by dropping it. Provider failures are logged and skipped.
    pub async fn run(
        self,
        categories: Vec<CategoryId>,
        out: mpsc::UnboundedSender<CategoryPortfolios>,
    ) -> ResolveReport {
        let mut report = ResolveReport {
            requested: categories.len(),
            ..Default::default()
        };

        let provider = self.provider;
        let mut results = stream::iter(categories)
            .map(|category| {
                let provider = provider.clone();
                async move {
                    let result = provider.fetch_category(&category).await;
                    (category, result)
                }
            })
            .buffered(self.concurrency);

        while let Some((category, result)) = results.next().await {
            let portfolios = match result {
                Ok(portfolios) => portfolios,
                Err(e) => {
                    warn!("Failed to retrieve category {}: {:#}", category, e);
                    report.failures += 1;
                    continue;
                }
            };

            if portfolios.is_empty() {
                debug!("Category {} has no portfolios, dropping", category);
                continue;
            }

            report.resolved += 1;
            if out.send(CategoryPortfolios { category, portfolios }).is_err() {
                warn!("Index builder went away, stopping category resolution");
                break;
            }
        }

        info!(
            "Resolved {}/{} categories ({} failed)",
            report.resolved, report.requested, report.failures
        );
        report
    }
}

/// Fetches news and holdings for each portfolio.
pub struct PortfolioResolver {
    provider: Arc<dyn ContentProvider>,
    concurrency: usize,
}

impl PortfolioResolver {
    pub fn new(provider: Arc<dyn ContentProvider>, concurrency: usize) -> Self {
        Self {
            provider,
            concurrency: concurrency.max(1),
        }
    }

    /// Send one page per successfully fetched portfolio, then close `out`.
    pub async fn run(
        self,
        portfolios: Vec<PortfolioId>,
        out: mpsc::UnboundedSender<PortfolioPage>,
    ) -> ResolveReport {
        let mut report = ResolveReport {
            requested: portfolios.len(),
            ..Default::default()
        };

        let provider = self.provider;
        let mut results = stream::iter(portfolios)
            .map(|portfolio| {
                let provider = provider.clone();
                async move {
                    let result = provider.fetch_portfolio(&portfolio).await;
                    (portfolio, result)
                }
            })
            .buffered(self.concurrency);

        while let Some((portfolio, result)) = results.next().await {
            match result {
                Ok(page) => {
                    report.resolved += 1;
                    if out.send(page).is_err() {
                        warn!("Aggregator went away, stopping portfolio resolution");
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to retrieve portfolio {}: {:#}", portfolio, e);
                    report.failures += 1;
                }
            }
        }

        info!(
            "Resolved {}/{} portfolios ({} failed)",
            report.resolved, report.requested, report.failures
        );
        report
    }
}
