use chrono::Duration;
use interfaces::{CategoryId, PortfolioId};
use std::fmt;
use std::path::PathBuf;

pub use interfaces::{CategoryPage, ContentBundle, HoldingRecord, NewsRecord, PortfolioPage, Subscriber};

/// Default recency lookback for news, in hours.
pub const DEFAULT_LOOKBACK_HOURS: i64 = 124;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dabble.com/api".to_string(),
            user_agent: "Portfolio-Digest/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// News published at or before `now - lookback` is dropped.
    pub lookback: Duration,
    /// Provider calls in flight at once, per resolver stage.
    pub max_concurrent_fetches: usize,
    /// Abort before assembling when category plus portfolio failures exceed this.
    pub max_fetch_failures: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::hours(DEFAULT_LOOKBACK_HOURS),
            max_concurrent_fetches: 8,
            max_fetch_failures: None,
        }
    }
}

/// A category together with the portfolios it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPortfolios {
    pub category: CategoryId,
    pub portfolios: Vec<PortfolioId>,
}

/// Merged content for one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAggregate {
    pub category: CategoryId,
    pub news: Vec<NewsRecord>,
    pub holdings: Vec<HoldingRecord>,
}

impl CategoryAggregate {
    pub fn new(category: CategoryId) -> Self {
        Self {
            category,
            news: Vec::new(),
            holdings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub categories_requested: usize,
    pub categories_resolved: usize,
    pub category_failures: usize,
    pub portfolios_requested: usize,
    pub portfolios_resolved: usize,
    pub portfolio_failures: usize,
    pub aggregates: usize,
}

impl RunStats {
    pub fn total_failures(&self) -> usize {
        self.category_failures + self.portfolio_failures
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "categories {}/{} ({} failed), portfolios {}/{} ({} failed), {} aggregates",
            self.categories_resolved,
            self.categories_requested,
            self.category_failures,
            self.portfolios_resolved,
            self.portfolios_requested,
            self.portfolio_failures,
            self.aggregates,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Provider returned {status} for {url}")]
    Provider { url: String, status: u16 },

    #[error("{failures} fetch failures exceed the limit of {limit}")]
    TooManyFailures { failures: usize, limit: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Identifier {0:?} cannot be used in a request path")]
    InvalidIdentifier(String),

    #[error("Pipeline stage panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("failed reading JSON file {}: {source}", .path.display())]
    SubscriberFile { path: PathBuf, source: std::io::Error },

    #[error("failed parsing JSON from file {}: {source}", .path.display())]
    SubscriberFormat { path: PathBuf, source: serde_json::Error },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;
