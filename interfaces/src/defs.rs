use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::schedule::EmailFrequency;

/// Opaque identifier of a subject grouping of portfolios.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub String);

/// Opaque identifier of an individual investable entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortfolioId(pub String);

macro_rules! slug_impls {
    ($ty:ident) => {
        impl $ty {
            pub fn new(slug: impl Into<String>) -> Self {
                Self(slug.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(slug: &str) -> Self {
                Self(slug.to_owned())
            }
        }
    };
}

slug_impls!(CategoryId);
slug_impls!(PortfolioId);

/// Anything carrying a string identifier that deduplication keys on.
pub trait Identified {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsRecord {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// Raw provider timestamp, expected as RFC 3339 (e.g. "2022-04-05T21:39:16Z").
    pub published_on: String,
}

impl Identified for NewsRecord {
    fn id(&self) -> &str {
        &self.slug
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRecord {
    pub slug: String,
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub movement_24h: f64,
    #[serde(default)]
    pub movement_7d: f64,
    #[serde(default)]
    pub movement_1y: f64,
}

impl Identified for HoldingRecord {
    fn id(&self) -> &str {
        &self.slug
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub slug: PortfolioId,
}

/// A category as returned by the content provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPage {
    pub slug: CategoryId,
    #[serde(default)]
    pub portfolios: Vec<PortfolioSummary>,
}

impl CategoryPage {
    pub fn portfolio_ids(&self) -> Vec<PortfolioId> {
        self.portfolios.iter().map(|p| p.slug.clone()).collect()
    }
}

/// News and holdings fetched for one portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPage {
    pub slug: PortfolioId,
    #[serde(default)]
    pub news: Vec<NewsRecord>,
    #[serde(default)]
    pub holdings: Vec<HoldingRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
    pub frequency: EmailFrequency,
}

/// Final per-subscriber payload handed to rendering and delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBundle {
    pub email: String,
    pub name: String,
    pub news: Vec<NewsRecord>,
    pub holdings: Vec<HoldingRecord>,
}

// Object style note:
// Implementations of these traits are collaborators of the digest pipeline.
// The pipeline only ever sees the data they return; transport, storage and
// markup are their own business.

#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Related portfolios for a category, in provider order.
    async fn fetch_category(&self, category: &CategoryId) -> Result<Vec<PortfolioId>>;

    async fn fetch_portfolio(&self, portfolio: &PortfolioId) -> Result<PortfolioPage>;
}

#[async_trait]
pub trait SubscriberStore: Send + Sync {
    async fn load_subscribers(&self) -> Result<Vec<Subscriber>>;
}

pub trait Renderer: Send + Sync {
    fn render(&self, bundle: &ContentBundle) -> Result<String>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, name: &str, address: &str, document: &str) -> Result<()>;
}
