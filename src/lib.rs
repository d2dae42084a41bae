pub mod cli;
pub mod core;
pub mod providers;

use crate::core::cache::TtlCache;
use crate::core::clock::{Clock, SystemClock};
use crate::core::composition::{
    BreakdownProvider, ExtendedHoldingsProvider, FundDatabaseProvider, FundProfileProvider,
    MarketDataProvider, TickerResolver,
};
use crate::core::resolver::CompositionResolver;
use crate::core::search::SecuritySearch;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

/// Commands the application can run after config is loaded.
pub enum AppCommand {
    Search { query: String },
    Popular,
    Composition { isin: String, full: bool },
    Portfolio,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fundlens starting...");

    let config = match config_path {
        Some(path) => core::config::AppConfig::load_from_path(path)?,
        None => core::config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    // Caches are constructed once here and shared by reference; each
    // key-space has its own size cap and TTL.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let justetf_base = config
        .providers
        .justetf
        .as_ref()
        .map_or("https://www.justetf.com", |p| &p.base_url);
    let justetf = Arc::new(providers::JustEtfProvider::new(
        justetf_base,
        Arc::new(TtlCache::new(4, clock.clone())),
        Arc::new(TtlCache::new(4096, clock.clone())),
    ));

    let yahoo_base = config
        .providers
        .yahoo
        .as_ref()
        .map_or("https://query1.finance.yahoo.com", |p| &p.base_url);
    let yahoo = Arc::new(providers::YahooFinanceProvider::new(
        yahoo_base,
        Arc::new(TtlCache::new(512, clock.clone())),
    ));

    let (cbonds_command, cbonds_args) = config.providers.cbonds.as_ref().map_or_else(
        || {
            (
                "python3",
                vec!["scripts/cbonds_fetch.py".to_string()],
            )
        },
        |p| (p.command.as_str(), p.args.clone()),
    );
    let cbonds = Arc::new(providers::CbondsProvider::new(
        cbonds_command,
        &cbonds_args,
        Arc::new(TtlCache::new(256, clock.clone())),
    ));

    let resolver = CompositionResolver::new(
        justetf.clone() as Arc<dyn FundProfileProvider>,
        justetf.clone() as Arc<dyn BreakdownProvider>,
        cbonds as Arc<dyn ExtendedHoldingsProvider>,
        Arc::new(TtlCache::new(256, clock.clone())),
        Arc::new(TtlCache::new(256, clock.clone())),
    );

    let search = SecuritySearch::new(
        justetf.clone() as Arc<dyn FundDatabaseProvider>,
        justetf as Arc<dyn TickerResolver>,
        yahoo as Arc<dyn MarketDataProvider>,
        Arc::new(TtlCache::new(512, clock)),
    );

    match command {
        AppCommand::Search { query } => cli::search::run(&search, &query).await,
        AppCommand::Popular => cli::search::run_popular(&search).await,
        AppCommand::Composition { isin, full } => {
            cli::composition::run(&resolver, &isin, full).await
        }
        AppCommand::Portfolio => {
            cli::portfolio::run(&config.positions, config.mode, &resolver).await
        }
    }
}
