pub mod cbonds;
pub mod justetf;
pub mod util;
pub mod yahoo_finance;

pub use cbonds::CbondsProvider;
pub use justetf::JustEtfProvider;
pub use yahoo_finance::YahooFinanceProvider;
