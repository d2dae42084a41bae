use super::ui;
use crate::core::SecuritySearch;
use crate::core::model::SecurityType;
use crate::providers::util::with_retry;
use anyhow::Result;
use comfy_table::Cell;

pub async fn run(search: &SecuritySearch, query: &str) -> Result<()> {
    let results = with_retry(
        || async { Ok::<_, anyhow::Error>(search.search(query).await) },
        1,
        250,
    )
    .await?;

    if results.is_empty() {
        println!("No securities found for '{query}'.");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Type"),
        ui::header_cell("Name"),
        ui::header_cell("Ticker"),
        ui::header_cell("ISIN"),
    ]);

    for security in &results {
        let kind = match security.kind {
            SecurityType::Etf => "ETF",
            SecurityType::Stock => "Stock",
        };
        table.add_row(vec![
            Cell::new(kind),
            Cell::new(&security.name),
            Cell::new(&security.ticker),
            Cell::new(if security.isin.is_empty() {
                "N/A"
            } else {
                security.isin.as_str()
            }),
        ]);
    }

    println!(
        "{}\n\n{table}",
        ui::style_text(&format!("Search results for '{query}'"), ui::StyleType::Title)
    );
    Ok(())
}

pub async fn run_popular(search: &SecuritySearch) -> Result<()> {
    let results = search.list_known_securities().await;

    if results.is_empty() {
        println!("No popular securities available right now.");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Name"), ui::header_cell("Ticker")]);
    for security in &results {
        table.add_row(vec![Cell::new(&security.name), Cell::new(&security.ticker)]);
    }

    println!(
        "{}\n\n{table}",
        ui::style_text("Popular securities", ui::StyleType::Title)
    );
    Ok(())
}
