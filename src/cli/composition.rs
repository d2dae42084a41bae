use super::ui;
use crate::core::CompositionResolver;
use crate::core::aggregate::limit_with_others;
use crate::core::model::{EtfFullComposition, FundReturns, WeightedItem};
use anyhow::Result;
use comfy_table::Cell;

/// Entries shown in the pie-style country/sector views before folding the
/// remainder into "Other".
const PIE_SLICES: usize = 8;

fn weighted_table(title: &str, items: &[WeightedItem]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell(title), ui::header_cell("Weight")]);
    for item in items {
        table.add_row(vec![Cell::new(&item.name), ui::weight_cell(item.weight)]);
    }
    table.to_string()
}

fn returns_line(returns: &FundReturns) -> String {
    let horizons = [
        ("1M", returns.one_month),
        ("3M", returns.three_months),
        ("6M", returns.six_months),
        ("YTD", returns.ytd),
        ("1Y", returns.one_year),
        ("3Y", returns.three_years),
        ("5Y", returns.five_years),
        ("Max", returns.max),
    ];
    horizons
        .iter()
        .map(|(label, value)| match value {
            Some(v) => format!("{label}: {v:+.2}%"),
            None => format!("{label}: N/A"),
        })
        .collect::<Vec<_>>()
        .join("  ")
}

pub async fn run(resolver: &CompositionResolver, isin: &str, full: bool) -> Result<()> {
    if full {
        let composition = resolver.full_composition(isin).await?;
        display_full(isin, &composition);
    } else {
        let composition = resolver.composition(isin).await?;
        display_summary(isin, &composition.holdings, &composition.countries, &composition.sectors, composition.has_holdings_section);
    }
    Ok(())
}

fn display_summary(
    isin: &str,
    holdings: &[WeightedItem],
    countries: &[WeightedItem],
    sectors: &[WeightedItem],
    has_holdings_section: bool,
) {
    println!(
        "{}\n",
        ui::style_text(&format!("Composition of {isin}"), ui::StyleType::Title)
    );

    if holdings.is_empty() {
        if has_holdings_section {
            println!("{}", ui::style_text("No holdings parsed.", ui::StyleType::Error));
        } else {
            println!(
                "{}",
                ui::style_text(
                    "This asset class has no equity holdings.",
                    ui::StyleType::Subtle
                )
            );
        }
    } else {
        println!("{}", weighted_table("Top holdings", holdings));
    }

    if !countries.is_empty() {
        let grouped = limit_with_others(countries.to_vec(), PIE_SLICES);
        println!("{}", weighted_table("Country", &grouped));
    }
    if !sectors.is_empty() {
        let grouped = limit_with_others(sectors.to_vec(), PIE_SLICES);
        println!("{}", weighted_table("Sector", &grouped));
    }
}

fn display_full(isin: &str, full: &EtfFullComposition) {
    let name = full.etf_name.as_deref().unwrap_or(isin);
    println!("{}\n", ui::style_text(name, ui::StyleType::Title));

    let mut facts = ui::new_styled_table();
    facts.set_header(vec![ui::header_cell("Fact"), ui::header_cell("Value")]);
    facts.add_row(vec![
        Cell::new("Fund size"),
        Cell::new(full.fund_size.as_deref().unwrap_or("N/A")),
    ]);
    facts.add_row(vec![
        Cell::new("TER"),
        ui::format_optional_cell(full.ter, |t| format!("{t:.2}% p.a.")),
    ]);
    facts.add_row(vec![
        Cell::new("Replication"),
        Cell::new(full.replication.as_deref().unwrap_or("N/A")),
    ]);
    facts.add_row(vec![
        Cell::new("Distribution"),
        Cell::new(full.distribution_policy.as_deref().unwrap_or("N/A")),
    ]);
    facts.add_row(vec![
        Cell::new("Holdings"),
        ui::format_optional_cell(full.total_holdings, |n| n.to_string()),
    ]);
    println!("{facts}");

    println!("Returns  {}\n", returns_line(&full.returns));

    display_summary(
        isin,
        &full.composition.holdings,
        &full.composition.countries,
        &full.composition.sectors,
        full.composition.has_holdings_section,
    );

    if !full.cbonds_holdings.is_empty() {
        let mut extended = full.cbonds_holdings.clone();
        extended.truncate(25);
        println!("{}", weighted_table("Extended holdings", &extended));
        if let Some(id) = &full.cbonds_id {
            println!(
                "{}",
                ui::style_text(&format!("Extended data: cbonds #{id}"), ui::StyleType::Subtle)
            );
        }
    }
}
