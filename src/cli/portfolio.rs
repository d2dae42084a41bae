use super::ui;
use crate::core::CompositionResolver;
use crate::core::aggregate::{self, PortfolioBreakdown};
use crate::core::config::{Position, ValueMode};
use crate::core::model::{EtfFullComposition, SecurityType, WeightedItem};
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;
use std::collections::HashMap;
use tracing::warn;

const TOP_HOLDINGS_SHOWN: usize = 20;
const PIE_SLICES: usize = 8;

pub async fn run(
    positions: &[Position],
    mode: ValueMode,
    resolver: &CompositionResolver,
) -> Result<()> {
    if positions.is_empty() {
        println!("No positions configured. Run `fundlens setup` to create a config.");
        return Ok(());
    }

    // One composition fetch per distinct fund identifier, all concurrent.
    let mut identifiers: Vec<String> = positions
        .iter()
        .filter(|p| p.kind == SecurityType::Etf)
        .filter_map(|p| p.identifier())
        .collect();
    identifiers.sort();
    identifiers.dedup();

    let pb = ui::new_progress_bar(identifiers.len() as u64, true);
    pb.set_message("Resolving fund compositions...");

    let fetches = identifiers.iter().map(|id| {
        let pb_clone = pb.clone();
        async move {
            let result = resolver.full_composition(id).await;
            pb_clone.inc(1);
            (id.clone(), result)
        }
    });
    let results = join_all(fetches).await;
    pb.finish_and_clear();

    // Failed funds are simply absent; the aggregate degrades gracefully.
    let mut compositions: HashMap<String, EtfFullComposition> = HashMap::new();
    for (id, result) in results {
        match result {
            Ok(composition) => {
                compositions.insert(id, composition);
            }
            Err(e) => warn!(error = %e, "Composition unavailable for {id}"),
        }
    }

    let breakdown = aggregate::aggregate(positions, &compositions);
    display_positions(positions, mode);
    display(positions, &breakdown);
    Ok(())
}

/// Entered value formatted per the configured interpretation.
fn format_position_value(mode: ValueMode, value: f64) -> String {
    match mode {
        ValueMode::Amount => format!("{value:.2}"),
        ValueMode::Percent => format!("{value:.1}%"),
    }
}

fn display_positions(positions: &[Position], mode: ValueMode) {
    let value_header = match mode {
        ValueMode::Amount => "Amount",
        ValueMode::Percent => "Entered %",
    };
    let weights = aggregate::position_weights(positions);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Position"),
        ui::header_cell("Type"),
        ui::header_cell(value_header),
        ui::header_cell("Weight"),
    ]);
    for (position, weight) in positions.iter().zip(&weights) {
        let kind = match position.kind {
            SecurityType::Etf => "ETF",
            SecurityType::Stock => "Stock",
        };
        table.add_row(vec![
            Cell::new(&position.name),
            Cell::new(kind),
            Cell::new(format_position_value(mode, position.value)),
            ui::weight_cell(weight * 100.0),
        ]);
    }
    println!("{table}\n");
}

fn weighted_table(title: &str, items: &[WeightedItem]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell(title), ui::header_cell("Weight")]);
    for item in items {
        table.add_row(vec![Cell::new(&item.name), ui::weight_cell(item.weight)]);
    }
    table.to_string()
}

fn display(positions: &[Position], breakdown: &PortfolioBreakdown) {
    println!(
        "{}\n",
        ui::style_text("Portfolio breakdown", ui::StyleType::Title)
    );

    let fund_count = positions
        .iter()
        .filter(|p| p.kind == SecurityType::Etf)
        .count();
    if breakdown.funds_with_data < fund_count {
        println!(
            "{}\n",
            ui::style_text(
                &format!(
                    "Composition data available for {} of {} funds.",
                    breakdown.funds_with_data, fund_count
                ),
                ui::StyleType::Error
            )
        );
    }

    if !breakdown.holdings.is_empty() {
        let mut top = breakdown.holdings.clone();
        top.truncate(TOP_HOLDINGS_SHOWN);
        println!("{}", weighted_table("Combined holdings", &top));
    }
    if !breakdown.countries.is_empty() {
        let grouped = aggregate::limit_with_others(breakdown.countries.clone(), PIE_SLICES);
        println!("{}", weighted_table("Country exposure", &grouped));
    }
    if !breakdown.sectors.is_empty() {
        let grouped = aggregate::limit_with_others(breakdown.sectors.clone(), PIE_SLICES);
        println!("{}", weighted_table("Sector exposure", &grouped));
    }

    if !breakdown.overlaps.is_empty() {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Holding"),
            ui::header_cell("In funds"),
            ui::header_cell("Overlap"),
            ui::header_cell("Weights"),
        ]);
        for overlap in &breakdown.overlaps {
            let weights = overlap
                .fund_weights
                .iter()
                .map(|(fund, weight)| format!("{fund}: {weight:.2}%"))
                .collect::<Vec<_>>()
                .join(", ");
            table.add_row(vec![
                Cell::new(&overlap.name),
                Cell::new(format!(
                    "{}/{}",
                    overlap.fund_weights.len(),
                    breakdown.funds_with_data
                )),
                ui::weight_cell(overlap.overlap_pct),
                Cell::new(weights),
            ]);
        }
        println!("{table}");
    } else if breakdown.funds_with_data >= 2 {
        println!("No overlapping holdings across your funds.\n");
    }

    println!(
        "Weighted TER ({}): {}",
        ui::style_text("portfolio", ui::StyleType::TotalLabel),
        ui::style_text(
            &format!("{:.2}% p.a.", breakdown.weighted_ter),
            ui::StyleType::TotalValue
        )
    );
}
