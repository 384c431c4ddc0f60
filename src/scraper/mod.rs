pub mod cleaner;
pub mod error;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use self::error::FetchError;
use self::http_client::{HttpClient, detail_url};

// ── Source trait ──────────────────────────────────────────────────────────────

/// Anything that can hand back the raw detail page for a ticker.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, ticker: &str) -> Result<String, FetchError>;
}

// ── fundamentus scraper ───────────────────────────────────────────────────────

pub struct FundamentusScraper {
    client: HttpClient,
    base_url: String,
}

impl FundamentusScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PageSource for FundamentusScraper {
    async fn fetch_page(&self, ticker: &str) -> Result<String, FetchError> {
        info!("Getting stock data for {}", ticker);
        let url = detail_url(&self.base_url, ticker)?;
        self.client.get_text(&url).await
    }
}
