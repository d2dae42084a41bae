//! justETF scrape adapter: fund database listing, ticker resolution, profile
//! pages and the follow-up breakdown tables.
//!
//! All extraction is regex-on-markup and stays inside this module; callers
//! only see the typed values from `core::composition`. When an expected
//! structural marker is missing the adapter logs it (layout drift on the
//! upstream page) and degrades instead of failing.

mod breakdown;
mod profile;

use crate::core::cache::TtlCache;
use crate::core::composition::{FundDatabaseProvider, FundRecord, TickerResolver};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) const USER_AGENT: &str = "fundlens/1.0";
pub(crate) const SCRAPE_TIMEOUT: Duration = Duration::from_secs(12);
const DATABASE_TTL: Duration = Duration::from_secs(60 * 60 * 24);
const DATABASE_CACHE_KEY: &str = "all";

// Embedded listing arrays: `var etfsData = [...];` (one or more per page).
static LISTING_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)(?:var|const|let)\s+etfs\w*\s*=\s*(\[.*?\])\s*;").unwrap());

static TICKER_CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Ticker</td>\s*<td[^>]*>([^<]+)</td>").unwrap());

pub struct JustEtfProvider {
    base_url: String,
    db_cache: Arc<TtlCache<String, Vec<FundRecord>>>,
    ticker_cache: Arc<TtlCache<String, String>>,
}

impl JustEtfProvider {
    pub fn new(
        base_url: &str,
        db_cache: Arc<TtlCache<String, Vec<FundRecord>>>,
        ticker_cache: Arc<TtlCache<String, String>>,
    ) -> Self {
        Self {
            base_url: base_url.to_string(),
            db_cache,
            ticker_cache,
        }
    }

    pub(crate) fn profile_url(&self, isin: &str) -> String {
        format!("{}/en/etf-profile.html?isin={}", self.base_url, isin)
    }
}

#[derive(Debug, Deserialize)]
struct ListingRecord {
    isin: String,
    name: String,
    #[serde(default)]
    wkn: String,
    #[serde(default)]
    ticker: Option<String>,
}

/// Extracts every embedded JSON listing array from the page. A malformed
/// block is skipped; a page with no block at all is reported as drift.
fn parse_listing(html: &str) -> Vec<FundRecord> {
    let mut blocks = 0;
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for captures in LISTING_BLOCK_RE.captures_iter(html) {
        blocks += 1;
        let raw = &captures[1];
        match serde_json::from_str::<Vec<ListingRecord>>(raw) {
            Ok(listing) => {
                for record in listing {
                    if record.isin.is_empty() || !seen.insert(record.isin.to_uppercase()) {
                        continue;
                    }
                    records.push(FundRecord {
                        isin: record.isin,
                        name: record.name,
                        wkn: record.wkn,
                        ticker: record.ticker,
                    });
                }
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed embedded listing block");
            }
        }
    }

    if blocks == 0 {
        warn!("No embedded listing block found; upstream page layout may have changed");
    }
    records
}

#[async_trait]
impl FundDatabaseProvider for JustEtfProvider {
    async fn list_funds(&self) -> Result<Vec<FundRecord>> {
        let key = DATABASE_CACHE_KEY.to_string();
        if let Some(cached) = self.db_cache.get(&key).await {
            return Ok(cached);
        }

        let url = format!("{}/en/search.html", self.base_url);
        debug!("Requesting fund listing from {}", url);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(SCRAPE_TIMEOUT)
            .build()?;
        let response = client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch fund listing from {url}"))?;
        let html = response
            .text()
            .await
            .context("Failed to read fund listing body")?;

        let records = parse_listing(&html);
        debug!("Parsed {} funds from listing", records.len());

        self.db_cache
            .put(key, records.clone(), Some(DATABASE_TTL))
            .await;
        Ok(records)
    }
}

#[async_trait]
impl TickerResolver for JustEtfProvider {
    /// Resolves a fund's ticker from its profile page. Every outcome,
    /// including failure, is cached permanently so each fund is scraped at
    /// most once.
    async fn resolve_ticker(&self, isin: &str) -> String {
        let key = isin.trim().to_uppercase();
        if let Some(cached) = self.ticker_cache.get(&key).await {
            return cached;
        }

        let ticker = self.scrape_ticker(&key).await.unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to identifier as ticker for {key}");
            key.clone()
        });

        self.ticker_cache.put(key, ticker.clone(), None).await;
        ticker
    }
}

impl JustEtfProvider {
    async fn scrape_ticker(&self, isin: &str) -> Result<String> {
        let url = self.profile_url(isin);
        debug!("Resolving ticker from {}", url);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(SCRAPE_TIMEOUT)
            .build()?;
        let response = client.get(&url).send().await?.error_for_status()?;
        let html = response.text().await?;

        TICKER_CELL_RE
            .captures(&html)
            .map(|c| c[1].trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("No ticker cell on profile page for {isin}"))
    }
}
