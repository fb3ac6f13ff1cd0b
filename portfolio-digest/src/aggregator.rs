use crate::dedup::dedup_in_place;
use crate::index::PortfolioCategoryIndex;
use crate::types::{CategoryAggregate, PortfolioPage};
use futures::StreamExt;
use interfaces::CategoryId;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info};

pub type CategoryAggregates = HashMap<CategoryId, CategoryAggregate>;

/// Joins fetched portfolio pages back onto every category that asked for them.
pub struct Aggregator<'a> {
    index: &'a PortfolioCategoryIndex,
    aggregates: CategoryAggregates,
}

impl<'a> Aggregator<'a> {
    pub fn new(index: &'a PortfolioCategoryIndex) -> Self {
        Self {
            index,
            aggregates: HashMap::new(),
        }
    }

    /// Merge one page into each interested category. Returns false when no
    /// category references the portfolio and the page was discarded.
    pub fn add_page(&mut self, page: PortfolioPage) -> bool {
        let Some(categories) = self.index.categories_for(&page.slug) else {
            debug!("No category references portfolio {}, discarding", page.slug);
            return false;
        };

        for category in categories {
            let aggregate = self
                .aggregates
                .entry(category.clone())
                .or_insert_with(|| CategoryAggregate::new(category.clone()));
            aggregate.news.extend(page.news.iter().cloned());
            aggregate.holdings.extend(page.holdings.iter().cloned());
        }
        true
    }

    /// Deduplicate every aggregate and hand the mapping over.
    pub fn finish(mut self) -> CategoryAggregates {
        for (category, aggregate) in self.aggregates.iter_mut() {
            let (news_before, holdings_before) = (aggregate.news.len(), aggregate.holdings.len());
            dedup_in_place(&mut aggregate.news);
            dedup_in_place(&mut aggregate.holdings);
            debug!(
                "Category {}: news {} -> {}, holdings {} -> {} after reduction",
                category,
                news_before,
                aggregate.news.len(),
                holdings_before,
                aggregate.holdings.len()
            );
        }
        info!("Aggregated content for {} categories", self.aggregates.len());
        self.aggregates
    }
}

/// Consume portfolio pages until the resolver closes the channel.
pub async fn aggregate(
    index: &PortfolioCategoryIndex,
    pages: mpsc::UnboundedReceiver<PortfolioPage>,
) -> CategoryAggregates {
    let mut aggregator = Aggregator::new(index);
    let mut pages = UnboundedReceiverStream::new(pages);
    while let Some(page) = pages.next().await {
        aggregator.add_page(page);
    }
    aggregator.finish()
}
