use crate::assembler::recency_cutoff;
use crate::types::{DigestError, FetchConfig, PipelineConfig, Result, DEFAULT_LOOKBACK_HOURS};
use chrono::{Duration, Utc};
use clap::Parser;
use std::path::PathBuf;

/// Build and send portfolio news digests to subscribers.
#[derive(Debug, Clone, Parser)]
#[command(name = "portfolio-digest", version, about)]
pub struct Cli {
    /// JSON file with the subscriber list
    #[arg(long, env = "SUBSCRIBERS_PATH", default_value = "subscribers.json")]
    pub subscribers: PathBuf,

    /// Base URL of the portfolio content API
    #[arg(long, env = "DABBLE_API_URL", default_value = "https://dabble.com/api")]
    pub api_base_url: String,

    /// Only news newer than this many hours is included
    #[arg(long, env = "LOOKBACK_HOURS", default_value_t = DEFAULT_LOOKBACK_HOURS)]
    pub lookback_hours: i64,

    #[arg(long, env = "MAX_CONCURRENT_FETCHES", default_value_t = 8)]
    pub max_concurrent_fetches: usize,

    /// Fail the run when more provider fetches than this fail
    #[arg(long, env = "MAX_FETCH_FAILURES")]
    pub max_fetch_failures: Option<usize>,

    #[arg(long, env = "FETCH_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Send to every subscriber regardless of their frequency
    #[arg(long)]
    pub ignore_schedule: bool,
}

impl Cli {
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        if self.lookback_hours <= 0 {
            return Err(DigestError::Config(format!(
                "lookback must be positive, got {} hours",
                self.lookback_hours
            )));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(DigestError::Config("max concurrent fetches must be at least 1".to_string()));
        }
        let lookback = Duration::try_hours(self.lookback_hours).ok_or_else(|| {
            DigestError::Config(format!("lookback of {} hours is out of range", self.lookback_hours))
        })?;
        recency_cutoff(Utc::now(), lookback)?;
        Ok(PipelineConfig {
            lookback,
            max_concurrent_fetches: self.max_concurrent_fetches,
            max_fetch_failures: self.max_fetch_failures,
        })
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            base_url: self.api_base_url.clone(),
            max_retries: self.max_retries,
            ..FetchConfig::default()
        }
    }
}
