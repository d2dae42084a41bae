//! Orchestrates the per-fund adapters into cached composition results.
//!
//! The primary profile fetch runs first and alone (its response cookies gate
//! the follow-up table requests); the expanded-table and extended-holdings
//! fetches then run concurrently and are joined before the result is
//! assembled. Results are written through to a bounded 24h cache keyed by
//! uppercased ISIN.

use crate::core::cache::TtlCache;
use crate::core::composition::{
    BreakdownProvider, ExtendedHoldingsProvider, FundProfile, FundProfileProvider, UpstreamError,
};
use crate::core::model::{EtfComposition, EtfFullComposition};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const COMPOSITION_TTL: Duration = Duration::from_secs(60 * 60 * 24);

pub struct CompositionResolver {
    profile_provider: Arc<dyn FundProfileProvider>,
    breakdown_provider: Arc<dyn BreakdownProvider>,
    extended_provider: Arc<dyn ExtendedHoldingsProvider>,
    composition_cache: Arc<TtlCache<String, EtfComposition>>,
    full_cache: Arc<TtlCache<String, EtfFullComposition>>,
}

impl CompositionResolver {
    pub fn new(
        profile_provider: Arc<dyn FundProfileProvider>,
        breakdown_provider: Arc<dyn BreakdownProvider>,
        extended_provider: Arc<dyn ExtendedHoldingsProvider>,
        composition_cache: Arc<TtlCache<String, EtfComposition>>,
        full_cache: Arc<TtlCache<String, EtfFullComposition>>,
    ) -> Self {
        Self {
            profile_provider,
            breakdown_provider,
            extended_provider,
            composition_cache,
            full_cache,
        }
    }

    /// Bounded holdings plus expanded country/sector tables. Skips the
    /// extended-holdings branch and fund facts, trading completeness for
    /// latency on first load.
    pub async fn composition(&self, isin: &str) -> Result<EtfComposition, UpstreamError> {
        let key = isin.trim().to_uppercase();
        if let Some(cached) = self.composition_cache.get(&key).await {
            return Ok(cached);
        }

        let profile = self.profile_provider.fetch_profile(&key).await?;
        let breakdowns = self.breakdown_provider.fetch_breakdowns(&profile.page).await;

        let composition = compose(&profile, breakdowns.countries, breakdowns.sectors);
        self.composition_cache
            .put(key, composition.clone(), Some(COMPOSITION_TTL))
            .await;
        Ok(composition)
    }

    /// Full composition: facts, multi-horizon returns and the extended
    /// holdings list on top of `composition`.
    pub async fn full_composition(&self, isin: &str) -> Result<EtfFullComposition, UpstreamError> {
        let key = isin.trim().to_uppercase();
        if let Some(cached) = self.full_cache.get(&key).await {
            return Ok(cached);
        }

        // Sequential: the follow-up requests need this response's cookies.
        let profile = self.profile_provider.fetch_profile(&key).await?;

        let (breakdowns, extended) = tokio::join!(
            self.breakdown_provider.fetch_breakdowns(&profile.page),
            self.extended_provider.fetch_extended(&key)
        );
        debug!(
            countries = breakdowns.countries.len(),
            sectors = breakdowns.sectors.len(),
            extended = extended.holdings.len(),
            "Joined secondary fetches for {key}"
        );

        let full = EtfFullComposition {
            etf_name: profile.etf_name.clone(),
            total_holdings: profile.total_holdings,
            cbonds_holdings: extended.holdings,
            cbonds_id: extended.cbonds_id,
            fund_size: profile.fund_size.clone(),
            ter: profile.ter,
            replication: profile.replication.clone(),
            distribution_policy: profile.distribution_policy.clone(),
            returns: profile.returns.clone(),
            composition: compose(&profile, breakdowns.countries, breakdowns.sectors),
        };

        self.full_cache
            .put(key, full.clone(), Some(COMPOSITION_TTL))
            .await;
        Ok(full)
    }
}

/// Merge rule: country/sector lists use the expanded result when non-empty,
/// else the bounded lists parsed from the primary page. Holdings stay the
/// primary page's bounded list; the extended list travels separately.
fn compose(
    profile: &FundProfile,
    expanded_countries: Vec<crate::core::model::WeightedItem>,
    expanded_sectors: Vec<crate::core::model::WeightedItem>,
) -> EtfComposition {
    EtfComposition {
        holdings: profile.holdings.clone(),
        countries: if expanded_countries.is_empty() {
            profile.countries.clone()
        } else {
            expanded_countries
        },
        sectors: if expanded_sectors.is_empty() {
            profile.sectors.clone()
        } else {
            expanded_sectors
        },
        asset_class: profile.asset_class.clone(),
        has_holdings_section: profile.has_holdings_section,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SystemClock;
    use crate::core::composition::{Breakdowns, PageContext};
    use crate::core::model::{ExtendedHoldings, WeightedItem};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProfileProvider {
        profile: FundProfile,
        call_count: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl FundProfileProvider for FakeProfileProvider {
        async fn fetch_profile(&self, _isin: &str) -> Result<FundProfile, UpstreamError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(UpstreamError::Status {
                    status: 503,
                    url: "https://example.test/profile".to_string(),
                });
            }
            Ok(self.profile.clone())
        }
    }

    struct FakeBreakdownProvider {
        breakdowns: Breakdowns,
    }

    #[async_trait]
    impl BreakdownProvider for FakeBreakdownProvider {
        async fn fetch_breakdowns(&self, _page: &PageContext) -> Breakdowns {
            Breakdowns {
                countries: self.breakdowns.countries.clone(),
                sectors: self.breakdowns.sectors.clone(),
            }
        }
    }

    struct FakeExtendedProvider {
        extended: ExtendedHoldings,
    }

    #[async_trait]
    impl ExtendedHoldingsProvider for FakeExtendedProvider {
        async fn fetch_extended(&self, _isin: &str) -> ExtendedHoldings {
            self.extended.clone()
        }
    }

    fn sample_profile() -> FundProfile {
        FundProfile {
            etf_name: Some("Vanguard FTSE All-World".to_string()),
            holdings: vec![
                WeightedItem::new("Apple Inc", 4.5),
                WeightedItem::new("Microsoft Corp", 4.1),
            ],
            countries: vec![WeightedItem::new("United States", 60.0)],
            sectors: vec![WeightedItem::new("Technology", 25.0)],
            asset_class: Some("Equity".to_string()),
            has_holdings_section: true,
            total_holdings: Some(3650),
            ter: Some(0.22),
            ..Default::default()
        }
    }

    fn resolver(
        profile: Arc<FakeProfileProvider>,
        breakdowns: Breakdowns,
        extended: ExtendedHoldings,
    ) -> CompositionResolver {
        let clock: Arc<dyn crate::core::clock::Clock> = Arc::new(SystemClock);
        CompositionResolver::new(
            profile,
            Arc::new(FakeBreakdownProvider { breakdowns }),
            Arc::new(FakeExtendedProvider { extended }),
            Arc::new(TtlCache::new(16, clock.clone())),
            Arc::new(TtlCache::new(16, clock)),
        )
    }

    #[tokio::test]
    async fn test_expanded_tables_win_over_bounded_lists() {
        let profile = Arc::new(FakeProfileProvider {
            profile: sample_profile(),
            call_count: AtomicUsize::new(0),
            fail: false,
        });
        let breakdowns = Breakdowns {
            countries: vec![
                WeightedItem::new("United States", 58.2),
                WeightedItem::new("Japan", 6.1),
            ],
            sectors: vec![],
        };
        let resolver = resolver(profile, breakdowns, ExtendedHoldings::default());

        let composition = resolver.composition("ie00b3rbwm25").await.unwrap();
        // Expanded countries replace the bounded list; empty expanded sectors
        // fall back to the page's own list.
        assert_eq!(composition.countries.len(), 2);
        assert_eq!(composition.sectors, vec![WeightedItem::new("Technology", 25.0)]);
        assert_eq!(composition.holdings.len(), 2);
    }

    #[tokio::test]
    async fn test_full_composition_carries_extended_holdings_separately() {
        let profile = Arc::new(FakeProfileProvider {
            profile: sample_profile(),
            call_count: AtomicUsize::new(0),
            fail: false,
        });
        let extended = ExtendedHoldings {
            holdings: vec![
                WeightedItem::new("Apple Inc", 4.52),
                WeightedItem::new("Nvidia Corp", 3.9),
                WeightedItem::new("Microsoft Corp", 4.05),
            ],
            cbonds_id: Some("1807".to_string()),
        };
        let resolver = resolver(profile, Breakdowns::default(), extended);

        let full = resolver.full_composition("IE00B3RBWM25").await.unwrap();
        assert_eq!(full.cbonds_holdings.len(), 3);
        assert_eq!(full.cbonds_id.as_deref(), Some("1807"));
        // The bounded list is untouched by the extended one.
        assert_eq!(full.composition.holdings.len(), 2);
        assert_eq!(full.ter, Some(0.22));
    }

    #[tokio::test]
    async fn test_second_request_is_served_from_cache() {
        let profile = Arc::new(FakeProfileProvider {
            profile: sample_profile(),
            call_count: AtomicUsize::new(0),
            fail: false,
        });
        let counter = profile.clone();
        let resolver = resolver(profile, Breakdowns::default(), ExtendedHoldings::default());

        resolver.full_composition("IE00B3RBWM25").await.unwrap();
        // Same fund, different case: one upstream fetch total.
        resolver.full_composition("ie00b3rbwm25").await.unwrap();
        assert_eq!(counter.call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_primary_fetch_failure_propagates() {
        let profile = Arc::new(FakeProfileProvider {
            profile: FundProfile::default(),
            call_count: AtomicUsize::new(0),
            fail: true,
        });
        let resolver = resolver(profile, Breakdowns::default(), ExtendedHoldings::default());

        let err = resolver.composition("IE00B3RBWM25").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 503, .. }));
    }
}
