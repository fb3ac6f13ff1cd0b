use crate::types::{CategoryPage, DigestError, FetchConfig, PortfolioPage, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use interfaces::{CategoryId, ContentProvider, PortfolioId};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// HTTP client for the portfolio content API.
pub struct DabbleClient {
    client: Client,
    base_url: Url,
    config: FetchConfig,
}

impl DabbleClient {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(DigestError::Config(format!("{} cannot be used as an API base", base_url)));
        }

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    pub fn category_url(&self, category: &CategoryId) -> Result<Url> {
        self.endpoint("categories", category.as_str())
    }

    pub fn portfolio_url(&self, portfolio: &PortfolioId) -> Result<Url> {
        self.endpoint("portfolios", portfolio.as_str())
    }

    /// Appends `collection/slug` as path segments; the slug is percent-encoded
    /// so reserved characters stay inside the one segment.
    fn endpoint(&self, collection: &str, slug: &str) -> Result<Url> {
        if matches!(slug, "" | "." | "..") {
            return Err(DigestError::InvalidIdentifier(slug.to_string()));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DigestError::Config(format!("{} cannot be used as an API base", self.base_url)))?
            .pop_if_empty()
            .extend([collection, slug]);
        Ok(url)
    }

    pub async fn category_page(&self, category: &CategoryId) -> Result<CategoryPage> {
        let url = self.category_url(category)?;
        self.get_json(url).await
    }

    pub async fn portfolio_page(&self, portfolio: &PortfolioId) -> Result<PortfolioPage> {
        let url = self.portfolio_url(portfolio)?;
        self.get_json(url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let start_time = Instant::now();
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            let err = match self.try_get_json(&url).await {
                Ok(value) => {
                    debug!("Fetched {} in {}ms", url, start_time.elapsed().as_millis());
                    return Ok(value);
                }
                Err(e) => e,
            };

            if attempt >= self.config.max_retries || !is_retryable(&err) {
                return Err(err);
            }
            match backoff.next_backoff() {
                Some(delay) => {
                    warn!("Attempt {} failed for {}: {}, retrying in {:?}", attempt + 1, url, err, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(err),
            }
        }
    }

    async fn try_get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DigestError::Provider {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Client errors other than rate limiting will not improve on retry.
fn is_retryable(err: &DigestError) -> bool {
    match err {
        DigestError::Provider { status, .. } => *status == 429 || *status >= 500,
        DigestError::Http(_) => true,
        _ => false,
    }
}

#[async_trait]
impl ContentProvider for DabbleClient {
    async fn fetch_category(&self, category: &CategoryId) -> anyhow::Result<Vec<PortfolioId>> {
        let page = self.category_page(category).await?;
        Ok(page.portfolio_ids())
    }

    async fn fetch_portfolio(&self, portfolio: &PortfolioId) -> anyhow::Result<PortfolioPage> {
        Ok(self.portfolio_page(portfolio).await?)
    }
}
