//! Portfolio-level aggregation of resolved fund compositions.
//!
//! Pure functions: positions plus whatever compositions have resolved go in,
//! combined exposure, overlap and cost metrics come out. A fund whose
//! composition is still pending or failed is simply absent from the map and
//! contributes nothing; callers recompute as more fetches land.

use crate::core::config::Position;
use crate::core::model::{EtfFullComposition, SecurityType, WeightedItem};
use crate::core::normalize::{normalize, pick_display_name};
use std::collections::HashMap;

/// Country/sector entries below this combined weight fold into "Other".
pub const SMALL_ENTRY_THRESHOLD: f64 = 2.0;

const OTHER_LABEL: &str = "Other";

#[derive(Debug, Clone)]
pub struct HoldingOverlap {
    pub name: String,
    /// Reported weight per fund, by fund display name.
    pub fund_weights: Vec<(String, f64)>,
    /// Share of resolved funds that contain this holding, in percent.
    pub overlap_pct: f64,
    /// Sum of the reported weights, used as tie-breaker.
    pub total_weight: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PortfolioBreakdown {
    pub holdings: Vec<WeightedItem>,
    pub countries: Vec<WeightedItem>,
    pub sectors: Vec<WeightedItem>,
    pub overlaps: Vec<HoldingOverlap>,
    pub weighted_ter: f64,
    /// Number of fund positions whose composition resolved.
    pub funds_with_data: usize,
}

/// Weight of each position: its value over the sum of all position values.
/// Holds for both amount and percentage entry, so an unnormalized percentage
/// total still yields weights summing to 1.
pub fn position_weights(positions: &[Position]) -> Vec<f64> {
    let total: f64 = positions.iter().map(|p| p.value).sum();
    if total <= 0.0 {
        return vec![0.0; positions.len()];
    }
    positions.iter().map(|p| p.value / total).collect()
}

/// Same computation restricted to fund positions; stock positions get zero.
/// Country/sector exposure is defined only across fund holdings.
pub fn fund_weights(positions: &[Position]) -> Vec<f64> {
    let total: f64 = positions
        .iter()
        .filter(|p| p.kind == SecurityType::Etf)
        .map(|p| p.value)
        .sum();
    if total <= 0.0 {
        return vec![0.0; positions.len()];
    }
    positions
        .iter()
        .map(|p| {
            if p.kind == SecurityType::Etf {
                p.value / total
            } else {
                0.0
            }
        })
        .collect()
}

/// Ordered holdings sources for one fund; the first non-empty list wins.
/// The extended (cbonds) list is preferred over the bounded page list.
pub fn preferred_holdings(composition: &EtfFullComposition) -> &[WeightedItem] {
    let sources: [(&str, &[WeightedItem]); 2] = [
        ("cbonds", &composition.cbonds_holdings),
        ("profile", &composition.composition.holdings),
    ];
    for (_, items) in sources {
        if !items.is_empty() {
            return items;
        }
    }
    &[]
}

struct Accumulator {
    entries: HashMap<String, WeightedItem>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    fn add(&mut self, name: &str, weight: f64) {
        let key = normalize(name);
        match self.entries.get_mut(&key) {
            Some(existing) => {
                existing.name = pick_display_name(&existing.name, name).to_string();
                existing.weight += weight;
            }
            None => {
                self.entries.insert(key, WeightedItem::new(name, weight));
            }
        }
    }

    fn into_sorted(self) -> Vec<WeightedItem> {
        let mut items: Vec<_> = self.entries.into_values().collect();
        items.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        items
    }
}

/// Combines resolved compositions with position weights. `compositions` is
/// keyed by the position identifier (uppercased ISIN).
pub fn aggregate(
    positions: &[Position],
    compositions: &HashMap<String, EtfFullComposition>,
) -> PortfolioBreakdown {
    let full_weights = position_weights(positions);
    let fund_only_weights = fund_weights(positions);

    let mut holdings = Accumulator::new();
    let mut countries = Accumulator::new();
    let mut sectors = Accumulator::new();
    let mut weighted_ter = 0.0;
    let mut funds_with_data = 0;

    // Reported holding weights for overlap, keyed by normalized holding name
    // and position index. Share-class variants inside one fund collapse onto
    // one key, so the inner map sums them per fund instead of listing them.
    let mut per_fund: HashMap<String, HashMap<usize, f64>> = HashMap::new();
    let mut display_names: HashMap<String, String> = HashMap::new();

    for (i, position) in positions.iter().enumerate() {
        match position.kind {
            SecurityType::Stock => {
                // A direct stock position is itself a holding at full weight.
                holdings.add(&position.name, full_weights[i] * 100.0);
            }
            SecurityType::Etf => {
                let Some(composition) = position
                    .identifier()
                    .and_then(|id| compositions.get(&id))
                else {
                    continue;
                };
                funds_with_data += 1;
                weighted_ter += full_weights[i] * composition.ter.unwrap_or(0.0);

                for item in preferred_holdings(composition) {
                    holdings.add(&item.name, item.weight * full_weights[i]);

                    let key = normalize(&item.name);
                    if key == normalize(OTHER_LABEL) {
                        continue;
                    }
                    display_names
                        .entry(key.clone())
                        .and_modify(|existing| {
                            *existing =
                                pick_display_name(existing, &item.name).to_string();
                        })
                        .or_insert_with(|| item.name.clone());
                    *per_fund.entry(key).or_default().entry(i).or_insert(0.0) += item.weight;
                }

                for item in &composition.composition.countries {
                    countries.add(&item.name, item.weight * fund_only_weights[i]);
                }
                for item in &composition.composition.sectors {
                    sectors.add(&item.name, item.weight * fund_only_weights[i]);
                }
            }
        }
    }

    // A holding overlaps iff it appears in at least two distinct funds.
    let mut overlaps: Vec<HoldingOverlap> = per_fund
        .into_iter()
        .filter(|(_, funds)| funds.len() >= 2)
        .map(|(key, funds)| {
            let mut fund_weights: Vec<(String, f64)> = funds
                .into_iter()
                .map(|(index, weight)| (positions[index].name.clone(), weight))
                .collect();
            fund_weights.sort_by(|a, b| a.0.cmp(&b.0));
            let total_weight = fund_weights.iter().map(|(_, w)| w).sum();
            HoldingOverlap {
                name: display_names
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| key.clone()),
                overlap_pct: fund_weights.len() as f64 / funds_with_data as f64 * 100.0,
                fund_weights,
                total_weight,
            }
        })
        .collect();
    overlaps.sort_by(|a, b| {
        b.overlap_pct
            .partial_cmp(&a.overlap_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.total_weight
                    .partial_cmp(&a.total_weight)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.name.cmp(&b.name))
    });

    PortfolioBreakdown {
        // Holdings are not grouped here so consumers can page through them;
        // pie-style views apply `limit_with_others` at render time.
        holdings: holdings.into_sorted(),
        countries: group_small_entries(countries.into_sorted(), SMALL_ENTRY_THRESHOLD),
        sectors: group_small_entries(sectors.into_sorted(), SMALL_ENTRY_THRESHOLD),
        overlaps,
        weighted_ter,
        funds_with_data,
    }
}

/// Folds entries below `threshold` (and literal "Other" entries) into a
/// single trailing "Other" bucket. Total weight is preserved.
pub fn group_small_entries(items: Vec<WeightedItem>, threshold: f64) -> Vec<WeightedItem> {
    let mut kept = Vec::new();
    let mut other_weight = 0.0;

    for item in items {
        if item.weight < threshold || item.name == OTHER_LABEL {
            other_weight += item.weight;
        } else {
            kept.push(item);
        }
    }

    if other_weight > 0.0 {
        kept.push(WeightedItem::new(OTHER_LABEL, other_weight));
    }
    kept
}

/// Truncates to at most `max + 1` entries for pie-style rendering: the top
/// `max` by weight plus one "Other" carrying the truncated remainder.
/// Pre-existing "Other" entries are merged into the synthetic bucket.
pub fn limit_with_others(items: Vec<WeightedItem>, max: usize) -> Vec<WeightedItem> {
    let mut other_weight = 0.0;
    let mut rest: Vec<WeightedItem> = Vec::new();
    for item in items {
        if item.name == OTHER_LABEL {
            other_weight += item.weight;
        } else {
            rest.push(item);
        }
    }

    rest.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if rest.len() > max {
        other_weight += rest.split_off(max).iter().map(|i| i.weight).sum::<f64>();
    }

    if other_weight > 0.0 {
        rest.push(WeightedItem::new(OTHER_LABEL, other_weight));
    }
    rest
}
