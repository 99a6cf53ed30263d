//! Ticker universes.
//!
//! Stock and fund listings loaded from the store, plus selectors that resolve which
//! tickers take part in a computation on a given date.

pub mod fund;
pub mod stock;

pub use fund::{FundKind, FundTicker, FundUniverse};
pub use stock::{StockListing, StockSelectionPolicy, StockTickerSelector, SuspendedTickers};

use crate::error::Result;
use crate::factor::FactorContext;
use chrono::NaiveDate;

/// Resolves a set of tickers as of a date.
pub trait TickerSelector {
    /// Tickers selected on `date`, sorted.
    fn tickers(&self, ctx: &FactorContext<'_>, date: NaiveDate) -> Result<Vec<String>>;

    /// Whether `ticker` is selected on `date`.
    fn contains(&self, ctx: &FactorContext<'_>, date: NaiveDate, ticker: &str) -> Result<bool> {
        Ok(self
            .tickers(ctx, date)?
            .binary_search_by(|t| t.as_str().cmp(ticker))
            .is_ok())
    }
}
