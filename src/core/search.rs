//! Security search: fund-universe matches federated with market stock search.

use crate::core::cache::TtlCache;
use crate::core::composition::{FundDatabaseProvider, MarketDataProvider, TickerResolver};
use crate::core::model::{Security, SecurityType};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const SEARCH_TTL: Duration = Duration::from_secs(60 * 60 * 24);
const MAX_QUERY_LEN: usize = 100;
const MAX_FUND_MATCHES: usize = 10;
const DEFAULT_SCREENER: &str = "most_actives";

pub struct SecuritySearch {
    fund_db: Arc<dyn FundDatabaseProvider>,
    tickers: Arc<dyn TickerResolver>,
    market: Arc<dyn MarketDataProvider>,
    cache: Arc<TtlCache<String, Vec<Security>>>,
}

impl SecuritySearch {
    pub fn new(
        fund_db: Arc<dyn FundDatabaseProvider>,
        tickers: Arc<dyn TickerResolver>,
        market: Arc<dyn MarketDataProvider>,
        cache: Arc<TtlCache<String, Vec<Security>>>,
    ) -> Self {
        Self {
            fund_db,
            tickers,
            market,
            cache,
        }
    }

    /// Searches funds and stocks for a free-text query. Funds are listed
    /// before stocks; a failing branch contributes nothing rather than
    /// failing the query. An empty query returns empty without any upstream
    /// call.
    pub async fn search(&self, query: &str) -> Vec<Security> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let query: String = query.chars().take(MAX_QUERY_LEN).collect();
        let key = query.to_lowercase();

        if let Some(cached) = self.cache.get(&key).await {
            return cached;
        }

        let (funds, stocks) = tokio::join!(self.search_funds(&key), self.market.search(&query));
        debug!(
            funds = funds.len(),
            stocks = stocks.len(),
            "Search results for '{query}'"
        );

        let mut results = funds;
        results.extend(stocks);
        self.cache.put(key, results.clone(), Some(SEARCH_TTL)).await;
        results
    }

    async fn search_funds(&self, needle: &str) -> Vec<Security> {
        let records = match self.fund_db.list_funds().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Fund database unavailable, skipping fund search");
                return Vec::new();
            }
        };

        let matches: Vec<_> = records
            .into_iter()
            .filter(|r| {
                r.name.to_lowercase().contains(needle)
                    || r.isin.to_lowercase().contains(needle)
                    || r.wkn.to_lowercase().contains(needle)
            })
            .take(MAX_FUND_MATCHES)
            .collect();

        let resolved = join_all(matches.into_iter().map(|record| async move {
            let ticker = match &record.ticker {
                Some(ticker) if !ticker.is_empty() => ticker.clone(),
                _ => self.tickers.resolve_ticker(&record.isin).await,
            };
            Security {
                ticker,
                isin: record.isin,
                name: record.name,
                kind: SecurityType::Etf,
            }
        }));
        resolved.await
    }

    /// Best-effort "popular/active" snapshot from trending symbols (bulk
    /// quoted for names) plus a predefined screener. Empty on total failure,
    /// never an error.
    pub async fn list_known_securities(&self) -> Vec<Security> {
        let (trending, screened) = tokio::join!(
            self.market.trending(),
            self.market.screener(DEFAULT_SCREENER)
        );

        let quoted = if trending.is_empty() {
            Vec::new()
        } else {
            self.market.quotes(&trending).await
        };

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for security in quoted.into_iter().chain(screened) {
            if seen.insert(security.identity_key().to_string()) {
                results.push(security);
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;
    use crate::core::composition::FundRecord;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeFundDb {
        records: Vec<FundRecord>,
        call_count: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl FundDatabaseProvider for FakeFundDb {
        async fn list_funds(&self) -> anyhow::Result<Vec<FundRecord>> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("listing page unreachable");
            }
            Ok(self.records.clone())
        }
    }

    struct IdentityTickers;

    #[async_trait]
    impl TickerResolver for IdentityTickers {
        async fn resolve_ticker(&self, isin: &str) -> String {
            isin.to_string()
        }
    }

    struct FakeMarket {
        results: Vec<Security>,
        call_count: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataProvider for FakeMarket {
        async fn search(&self, _query: &str) -> Vec<Security> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.results.clone()
        }

        async fn trending(&self) -> Vec<String> {
            self.results.iter().map(|s| s.ticker.clone()).collect()
        }

        async fn screener(&self, _screener_id: &str) -> Vec<Security> {
            self.results.clone()
        }

        async fn quotes(&self, symbols: &[String]) -> Vec<Security> {
            self.results
                .iter()
                .filter(|s| symbols.contains(&s.ticker))
                .cloned()
                .collect()
        }
    }

    fn stock(ticker: &str, name: &str) -> Security {
        Security {
            ticker: ticker.to_string(),
            isin: String::new(),
            name: name.to_string(),
            kind: SecurityType::Stock,
        }
    }

    fn fund_record(isin: &str, name: &str) -> FundRecord {
        FundRecord {
            isin: isin.to_string(),
            name: name.to_string(),
            wkn: String::new(),
            ticker: None,
        }
    }

    fn federation(
        fund_db: Arc<FakeFundDb>,
        market: Arc<FakeMarket>,
    ) -> SecuritySearch {
        SecuritySearch::new(
            fund_db,
            Arc::new(IdentityTickers),
            market,
            Arc::new(TtlCache::new(64, Arc::new(SystemClock))),
        )
    }

    #[tokio::test]
    async fn test_funds_are_listed_before_stocks() {
        let fund_db = Arc::new(FakeFundDb {
            records: vec![fund_record("IE00B3RBWM25", "Vanguard FTSE All-World")],
            call_count: AtomicUsize::new(0),
            fail: false,
        });
        // A stock ticker that also matches the query.
        let market = Arc::new(FakeMarket {
            results: vec![stock("VANG", "Vanguard Lookalike Corp")],
            call_count: AtomicUsize::new(0),
        });
        let search = federation(fund_db, market);

        let results = search.search("vang").await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "Vanguard FTSE All-World");
        assert_eq!(results[0].kind, SecurityType::Etf);
        assert_eq!(results[1].kind, SecurityType::Stock);
    }

    #[tokio::test]
    async fn test_empty_query_skips_upstream() {
        let fund_db = Arc::new(FakeFundDb {
            records: vec![],
            call_count: AtomicUsize::new(0),
            fail: false,
        });
        let market = Arc::new(FakeMarket {
            results: vec![],
            call_count: AtomicUsize::new(0),
        });
        let db_counter = fund_db.clone();
        let market_counter = market.clone();
        let search = federation(fund_db, market);

        assert!(search.search("   ").await.is_empty());
        assert_eq!(db_counter.call_count.load(Ordering::SeqCst), 0);
        assert_eq!(market_counter.call_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeat_query_hits_cache() {
        let fund_db = Arc::new(FakeFundDb {
            records: vec![fund_record("IE00B3RBWM25", "Vanguard FTSE All-World")],
            call_count: AtomicUsize::new(0),
            fail: false,
        });
        let market = Arc::new(FakeMarket {
            results: vec![],
            call_count: AtomicUsize::new(0),
        });
        let db_counter = fund_db.clone();
        let search = federation(fund_db, market);

        search.search("vanguard").await;
        // Different case, same cache key.
        search.search("VANGUARD").await;
        assert_eq!(db_counter.call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fund_db_failure_degrades_to_stock_results() {
        let fund_db = Arc::new(FakeFundDb {
            records: vec![],
            call_count: AtomicUsize::new(0),
            fail: true,
        });
        let market = Arc::new(FakeMarket {
            results: vec![stock("AAPL", "Apple Inc")],
            call_count: AtomicUsize::new(0),
        });
        let search = federation(fund_db, market);

        let results = search.search("apple").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].ticker, "AAPL");
    }

    #[tokio::test]
    async fn test_list_known_securities_dedups_by_identity() {
        let fund_db = Arc::new(FakeFundDb {
            records: vec![],
            call_count: AtomicUsize::new(0),
            fail: false,
        });
        // Trending and screener both return AAPL; it appears once.
        let market = Arc::new(FakeMarket {
            results: vec![stock("AAPL", "Apple Inc"), stock("NVDA", "Nvidia Corp")],
            call_count: AtomicUsize::new(0),
        });
        let search = federation(fund_db, market);

        let results = search.list_known_securities().await;
        assert_eq!(results.len(), 2);
    }
}
