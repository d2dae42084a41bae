//! Core business logic abstractions

pub mod aggregate;
pub mod cache;
pub mod clock;
pub mod composition;
pub mod config;
pub mod log;
pub mod model;
pub mod normalize;
pub mod resolver;
pub mod search;

// Re-export main types for cleaner imports
pub use cache::TtlCache;
pub use composition::{
    BreakdownProvider, ExtendedHoldingsProvider, FundDatabaseProvider, FundProfileProvider,
    MarketDataProvider, TickerResolver, UpstreamError,
};
pub use model::{EtfComposition, EtfFullComposition, Security, SecurityType, WeightedItem};
pub use resolver::CompositionResolver;
pub use search::SecuritySearch;
