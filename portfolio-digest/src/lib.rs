pub mod types;
pub mod dedup;
pub mod resolver;
pub mod index;
pub mod aggregator;
pub mod assembler;
pub mod pipeline;
pub mod fetcher;
pub mod mock_provider;
pub mod subscribers;
pub mod render;
pub mod dispatch;
pub mod config;

pub use types::*;
pub use dedup::dedup_by_id;
pub use index::PortfolioCategoryIndex;
pub use aggregator::{Aggregator, CategoryAggregates};
pub use assembler::{filter_news_after, recency_cutoff, UserContentAssembler};
pub use pipeline::{DigestPipeline, DigestRun};
pub use fetcher::DabbleClient;
pub use mock_provider::MockContentProvider;
pub use subscribers::JsonSubscriberStore;
pub use render::HtmlDigestRenderer;
pub use dispatch::{dispatch_bundles, DeliveryReport};
