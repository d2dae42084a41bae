//! Core data types shared across providers, resolver and aggregator.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    Stock,
    Etf,
}

/// A searchable security. Immutable once returned from search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub ticker: String,
    pub isin: String,
    pub name: String,
    pub kind: SecurityType,
}

impl Security {
    /// ISIN when known, ticker otherwise. Stocks from the market-data
    /// provider carry no ISIN.
    pub fn identity_key(&self) -> &str {
        if self.isin.is_empty() {
            &self.ticker
        } else {
            &self.isin
        }
    }
}

/// A named percentage weight, as reported by the source. Lists of these are
/// not normalized to sum to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedItem {
    pub name: String,
    pub weight: f64,
}

impl WeightedItem {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

/// Holdings, country and sector breakdown of one fund.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtfComposition {
    pub holdings: Vec<WeightedItem>,
    pub countries: Vec<WeightedItem>,
    pub sectors: Vec<WeightedItem>,
    pub asset_class: Option<String>,
    /// Distinguishes "this asset class has no equity holdings" from
    /// "parsing found nothing".
    pub has_holdings_section: bool,
}

/// Multi-horizon fund returns, in percent. Absent horizons were not reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundReturns {
    pub one_month: Option<f64>,
    pub three_months: Option<f64>,
    pub six_months: Option<f64>,
    pub ytd: Option<f64>,
    pub one_year: Option<f64>,
    pub three_years: Option<f64>,
    pub five_years: Option<f64>,
    pub max: Option<f64>,
}

/// Extended holdings list from the secondary (cbonds) provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtendedHoldings {
    pub holdings: Vec<WeightedItem>,
    pub cbonds_id: Option<String>,
}

/// Composition plus fund facts, returns and the extended holdings list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EtfFullComposition {
    pub composition: EtfComposition,
    pub etf_name: Option<String>,
    pub total_holdings: Option<u32>,
    pub cbonds_holdings: Vec<WeightedItem>,
    pub cbonds_id: Option<String>,
    pub fund_size: Option<String>,
    pub ter: Option<f64>,
    pub replication: Option<String>,
    pub distribution_policy: Option<String>,
    pub returns: FundReturns,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_prefers_isin() {
        let sec = Security {
            ticker: "VWCE".to_string(),
            isin: "IE00BK5BQT80".to_string(),
            name: "Vanguard FTSE All-World".to_string(),
            kind: SecurityType::Etf,
        };
        assert_eq!(sec.identity_key(), "IE00BK5BQT80");
    }

    #[test]
    fn test_identity_key_falls_back_to_ticker() {
        let sec = Security {
            ticker: "AAPL".to_string(),
            isin: String::new(),
            name: "Apple Inc.".to_string(),
            kind: SecurityType::Stock,
        };
        assert_eq!(sec.identity_key(), "AAPL");
    }
}
