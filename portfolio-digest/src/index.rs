use crate::types::CategoryPortfolios;
use interfaces::{CategoryId, PortfolioId};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Inverted index of portfolio -> interested categories.
///
/// Built once per run and read-only afterwards. The same category may be
/// listed more than once under a portfolio; the aggregator's dedup pass
/// absorbs the repeated records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioCategoryIndex {
    entries: HashMap<PortfolioId, Vec<CategoryId>>,
}

impl PortfolioCategoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_link(&mut self, link: &CategoryPortfolios) {
        for portfolio in &link.portfolios {
            self.entries
                .entry(portfolio.clone())
                .or_default()
                .push(link.category.clone());
        }
    }

    pub fn categories_for(&self, portfolio: &PortfolioId) -> Option<&[CategoryId]> {
        self.entries.get(portfolio).map(|c| c.as_slice())
    }

    /// The deduplicated portfolio universe to fetch.
    pub fn portfolio_ids(&self) -> Vec<PortfolioId> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<CategoryPortfolios> for PortfolioCategoryIndex {
    fn from_iter<I: IntoIterator<Item = CategoryPortfolios>>(links: I) -> Self {
        let mut index = Self::new();
        for link in links {
            index.insert_link(&link);
        }
        index
    }
}

/// Drain category links until the resolver closes the channel.
pub async fn build_index(mut links: mpsc::UnboundedReceiver<CategoryPortfolios>) -> PortfolioCategoryIndex {
    let mut index = PortfolioCategoryIndex::new();
    while let Some(link) = links.recv().await {
        debug!("Category {} has {} portfolios", link.category, link.portfolios.len());
        index.insert_link(&link);
    }
    info!("{} unique portfolios", index.len());
    index
}
