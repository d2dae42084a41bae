//! Market-data adapter over the Yahoo Finance JSON API.
//!
//! Four independent calls (text search, trending, predefined screeners, bulk
//! quote), each behind its own failure boundary: any error degrades to an
//! empty result. Only equity results pass through; fund-type results from
//! this provider are discarded, funds resolve through the fund database.

use crate::core::cache::TtlCache;
use crate::core::composition::MarketDataProvider;
use crate::core::model::{Security, SecurityType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const API_TIMEOUT: Duration = Duration::from_secs(8);
const SEARCH_TTL: Duration = Duration::from_secs(60 * 60 * 24);
const EQUITY_QUOTE_TYPE: &str = "EQUITY";

pub struct YahooFinanceProvider {
    base_url: String,
    search_cache: Arc<TtlCache<String, Vec<Security>>>,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, search_cache: Arc<TtlCache<String, Vec<Security>>>) -> Self {
        YahooFinanceProvider {
            base_url: base_url.to_string(),
            search_cache,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        debug!("Requesting market data from {}", url);
        let client = reqwest::Client::builder()
            .user_agent("fundlens/1.0")
            .timeout(API_TIMEOUT)
            .build()?;
        let response = client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Request error for URL: {url}"))?
            .error_for_status()
            .with_context(|| format!("HTTP error for URL: {url}"))?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse JSON response from {url}"))
    }
}

#[derive(Debug, Deserialize)]
struct QuoteItem {
    symbol: String,
    #[serde(alias = "shortname", alias = "shortName")]
    short_name: Option<String>,
    #[serde(alias = "longname", alias = "longName")]
    long_name: Option<String>,
    #[serde(alias = "quoteType")]
    quote_type: Option<String>,
}

impl QuoteItem {
    fn is_equity(&self) -> bool {
        self.quote_type.as_deref() == Some(EQUITY_QUOTE_TYPE)
    }

    fn into_security(self) -> Security {
        let name = self
            .long_name
            .or(self.short_name)
            .unwrap_or_else(|| self.symbol.clone());
        Security {
            ticker: self.symbol,
            isin: String::new(),
            name,
            kind: SecurityType::Stock,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<QuoteItem>,
}

#[derive(Debug, Deserialize)]
struct FinanceEnvelope {
    finance: FinanceResult,
}

#[derive(Debug, Deserialize)]
struct FinanceResult {
    result: Vec<QuoteSet>,
}

#[derive(Debug, Deserialize)]
struct QuoteSet {
    #[serde(default)]
    quotes: Vec<QuoteItem>,
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(alias = "quoteResponse")]
    quote_response: QuoteList,
}

#[derive(Debug, Deserialize)]
struct QuoteList {
    #[serde(default)]
    result: Vec<QuoteItem>,
}

fn equities(quotes: Vec<QuoteItem>) -> Vec<Security> {
    quotes
        .into_iter()
        .filter(QuoteItem::is_equity)
        .map(QuoteItem::into_security)
        .collect()
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    async fn search(&self, query: &str) -> Vec<Security> {
        let key = query.trim().to_lowercase();
        if key.is_empty() {
            return Vec::new();
        }
        if let Some(cached) = self.search_cache.get(&key).await {
            return cached;
        }

        let url = format!("{}/v1/finance/search", self.base_url);
        let params = [("q", query), ("quotesCount", "10"), ("newsCount", "0")];
        let results = match self.get_json::<SearchResponse>(&url, &params).await {
            Ok(response) => equities(response.quotes),
            Err(e) => {
                warn!(error = %e, "Stock search failed for '{query}'");
                return Vec::new();
            }
        };

        self.search_cache
            .put(key, results.clone(), Some(SEARCH_TTL))
            .await;
        results
    }

    async fn trending(&self) -> Vec<String> {
        let url = format!("{}/v1/finance/trending/US", self.base_url);
        match self.get_json::<FinanceEnvelope>(&url, &[("count", "20")]).await {
            Ok(envelope) => envelope
                .finance
                .result
                .into_iter()
                .flat_map(|set| set.quotes)
                .map(|q| q.symbol)
                .collect(),
            Err(e) => {
                warn!(error = %e, "Trending lookup failed");
                Vec::new()
            }
        }
    }

    async fn screener(&self, screener_id: &str) -> Vec<Security> {
        let url = format!("{}/v1/finance/screener/predefined/saved", self.base_url);
        let params = [("scrIds", screener_id), ("count", "25")];
        match self.get_json::<FinanceEnvelope>(&url, &params).await {
            Ok(envelope) => equities(
                envelope
                    .finance
                    .result
                    .into_iter()
                    .flat_map(|set| set.quotes)
                    .collect(),
            ),
            Err(e) => {
                warn!(error = %e, "Screener '{screener_id}' failed");
                Vec::new()
            }
        }
    }

    async fn quotes(&self, symbols: &[String]) -> Vec<Security> {
        if symbols.is_empty() {
            return Vec::new();
        }
        let url = format!("{}/v7/finance/quote", self.base_url);
        let joined = symbols.join(",");
        match self
            .get_json::<QuoteEnvelope>(&url, &[("symbols", joined.as_str())])
            .await
        {
            Ok(envelope) => equities(envelope.quote_response.result),
            Err(e) => {
                warn!(error = %e, "Bulk quote failed for {} symbols", symbols.len());
                Vec::new()
            }
        }
    }
}
