//! Provider seams for composition resolution.
//!
//! The resolver only sees these traits; the concrete scrape/API/process
//! adapters live in `crate::providers`. Only the primary profile fetch can
//! fail in a way that reaches the caller; every other seam degrades to an
//! empty value on its own.

use crate::core::model::{ExtendedHoldings, FundReturns, Security, WeightedItem};
use async_trait::async_trait;
use thiserror::Error;

/// Irrecoverable failure of the primary profile fetch. Everything else in the
/// pipeline is absorbed with a fallback value.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Session context captured from the primary profile response, needed to
/// replay the page's follow-up table requests.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub cookies: Vec<String>,
    pub countries_url: Option<String>,
    pub sectors_url: Option<String>,
}

/// Everything parsed synchronously from one fund profile page.
#[derive(Debug, Clone, Default)]
pub struct FundProfile {
    pub etf_name: Option<String>,
    pub holdings: Vec<WeightedItem>,
    pub countries: Vec<WeightedItem>,
    pub sectors: Vec<WeightedItem>,
    pub asset_class: Option<String>,
    pub has_holdings_section: bool,
    pub total_holdings: Option<u32>,
    pub fund_size: Option<String>,
    pub ter: Option<f64>,
    pub replication: Option<String>,
    pub distribution_policy: Option<String>,
    pub returns: FundReturns,
    pub page: PageContext,
}

/// Expanded country/sector tables fetched via the page's own follow-up
/// requests. Empty lists mean the fetch failed or the page had none.
#[derive(Debug, Clone, Default)]
pub struct Breakdowns {
    pub countries: Vec<WeightedItem>,
    pub sectors: Vec<WeightedItem>,
}

/// One fund in the provider's full listing.
#[derive(Debug, Clone)]
pub struct FundRecord {
    pub isin: String,
    pub name: String,
    pub wkn: String,
    pub ticker: Option<String>,
}

#[async_trait]
pub trait FundProfileProvider: Send + Sync {
    /// Fetches and parses the primary profile page for one fund. This is the
    /// only call whose failure propagates to the caller.
    async fn fetch_profile(&self, isin: &str) -> Result<FundProfile, UpstreamError>;
}

#[async_trait]
pub trait BreakdownProvider: Send + Sync {
    /// Replays the captured follow-up requests. Never fails; missing URLs,
    /// missing cookies or transport errors all yield empty lists.
    async fn fetch_breakdowns(&self, page: &PageContext) -> Breakdowns;
}

#[async_trait]
pub trait ExtendedHoldingsProvider: Send + Sync {
    /// Fetches the deep holdings list from the secondary provider. Never
    /// fails; any error yields an empty result.
    async fn fetch_extended(&self, isin: &str) -> ExtendedHoldings;
}

#[async_trait]
pub trait FundDatabaseProvider: Send + Sync {
    async fn list_funds(&self) -> anyhow::Result<Vec<FundRecord>>;
}

#[async_trait]
pub trait TickerResolver: Send + Sync {
    /// Resolves a fund identifier to its ticker. Never fails; on any error
    /// the identifier itself is returned (and remembered, to bound scrape
    /// volume).
    async fn resolve_ticker(&self, isin: &str) -> String;
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Free-text stock search. Equity results only; fund-type results from
    /// this provider are discarded.
    async fn search(&self, query: &str) -> Vec<Security>;

    /// Trending symbols, names not included.
    async fn trending(&self) -> Vec<String>;

    /// One predefined screener, e.g. "most_actives".
    async fn screener(&self, screener_id: &str) -> Vec<Security>;

    /// Bulk quote lookup for a set of symbols.
    async fn quotes(&self, symbols: &[String]) -> Vec<Security>;
}
