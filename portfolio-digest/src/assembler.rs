use crate::aggregator::CategoryAggregates;
use crate::dedup::dedup_by_id;
use crate::types::{ContentBundle, DigestError, HoldingRecord, NewsRecord, Result, Subscriber};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Parse a provider timestamp. Only RFC 3339 is accepted.
pub fn parse_published(published_on: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(published_on)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// News published strictly after `cutoff`; unparsable timestamps are dropped.
pub fn filter_news_after(news: Vec<NewsRecord>, cutoff: DateTime<Utc>) -> Vec<NewsRecord> {
    news.into_iter()
        .filter(|n| matches!(parse_published(&n.published_on), Some(t) if t > cutoff))
        .collect()
}

/// `now - lookback`, or a config error when that instant is out of range.
pub fn recency_cutoff(now: DateTime<Utc>, lookback: Duration) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(lookback).ok_or_else(|| {
        DigestError::Config(format!(
            "lookback of {} hours reaches past the representable time range",
            lookback.num_hours()
        ))
    })
}

/// Builds each subscriber's bundle from the finalized category aggregates.
pub struct UserContentAssembler {
    aggregates: Arc<CategoryAggregates>,
    cutoff: DateTime<Utc>,
}

impl UserContentAssembler {
    pub fn new(aggregates: Arc<CategoryAggregates>, cutoff: DateTime<Utc>) -> Self {
        Self { aggregates, cutoff }
    }

    pub fn cutoff(&self) -> DateTime<Utc> {
        self.cutoff
    }

    pub fn assemble(&self, subscriber: &Subscriber) -> ContentBundle {
        let mut news: Vec<NewsRecord> = Vec::new();
        let mut holdings: Vec<HoldingRecord> = Vec::new();
        for category in &subscriber.categories {
            if let Some(aggregate) = self.aggregates.get(category) {
                news.extend(aggregate.news.iter().cloned());
                holdings.extend(aggregate.holdings.iter().cloned());
            }
        }

        let news = dedup_by_id(news);
        let holdings = dedup_by_id(holdings);
        let news_before = news.len();
        let news = filter_news_after(news, self.cutoff);

        debug!(
            "User {}: {} news before time filtering, {} after; {} holdings",
            subscriber.name,
            news_before,
            news.len(),
            holdings.len()
        );

        ContentBundle {
            email: subscriber.email.clone(),
            name: subscriber.name.clone(),
            news,
            holdings,
        }
    }

    /// Emit one bundle per subscriber in list order, then close `out`.
    pub async fn run(self, subscribers: Vec<Subscriber>, out: mpsc::UnboundedSender<ContentBundle>) {
        let total = subscribers.len();
        for subscriber in &subscribers {
            if out.send(self.assemble(subscriber)).is_err() {
                warn!("Bundle consumer went away, stopping assembly");
                return;
            }
        }
        info!("Assembled content for {} subscribers", total);
    }
}
