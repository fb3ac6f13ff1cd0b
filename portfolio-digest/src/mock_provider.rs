use crate::types::PortfolioPage;
use anyhow::anyhow;
use async_trait::async_trait;
use interfaces::{CategoryId, ContentProvider, HoldingRecord, NewsRecord, PortfolioId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory content provider for development and testing.
#[derive(Default)]
pub struct MockContentProvider {
    categories: HashMap<CategoryId, Vec<PortfolioId>>,
    portfolios: HashMap<PortfolioId, PortfolioPage>,
    failing: HashSet<String>,
    response_delay_ms: u64,
    category_calls: AtomicUsize,
    portfolio_calls: AtomicUsize,
    portfolio_requests: std::sync::Mutex<Vec<PortfolioId>>,
}

impl MockContentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: &str, portfolios: &[&str]) -> Self {
        self.categories.insert(
            CategoryId::from(category),
            portfolios.iter().map(|p| PortfolioId::from(*p)).collect(),
        );
        self
    }

    pub fn with_portfolio(mut self, portfolio: &str, news: Vec<NewsRecord>, holdings: Vec<HoldingRecord>) -> Self {
        let slug = PortfolioId::from(portfolio);
        self.portfolios.insert(slug.clone(), PortfolioPage { slug, news, holdings });
        self
    }

    /// Any category or portfolio with this slug fails to fetch.
    pub fn with_failure(mut self, slug: &str) -> Self {
        self.failing.insert(slug.to_string());
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    pub fn category_calls(&self) -> usize {
        self.category_calls.load(Ordering::SeqCst)
    }

    pub fn portfolio_calls(&self) -> usize {
        self.portfolio_calls.load(Ordering::SeqCst)
    }

    /// Every portfolio id requested so far, in request order.
    pub fn portfolio_requests(&self) -> Vec<PortfolioId> {
        self.portfolio_requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    async fn simulate_latency(&self) {
        if self.response_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.response_delay_ms)).await;
        }
    }
}

#[async_trait]
impl ContentProvider for MockContentProvider {
    async fn fetch_category(&self, category: &CategoryId) -> anyhow::Result<Vec<PortfolioId>> {
        self.category_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.failing.contains(category.as_str()) {
            return Err(anyhow!("category {} unavailable", category));
        }
        Ok(self.categories.get(category).cloned().unwrap_or_default())
    }

    async fn fetch_portfolio(&self, portfolio: &PortfolioId) -> anyhow::Result<PortfolioPage> {
        self.portfolio_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.portfolio_requests.lock() {
            requests.push(portfolio.clone());
        }
        self.simulate_latency().await;
        if self.failing.contains(portfolio.as_str()) {
            return Err(anyhow!("portfolio {} unavailable", portfolio));
        }
        self.portfolios
            .get(portfolio)
            .cloned()
            .ok_or_else(|| anyhow!("portfolio {} not found", portfolio))
    }
}
