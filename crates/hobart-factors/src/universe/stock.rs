//! Stock listings and selection.

use super::TickerSelector;
use crate::error::Result;
use crate::factor::FactorContext;
use chrono::NaiveDate;
use hobart_data::tables::{stock_list, stock_name, suspension};
use hobart_data::{ReadRequest, TableStore, frame};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Marker of special-treatment names.
const ST_MARKER: &str = "ST";

/// A listed stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockListing {
    /// Ticker
    pub ticker: String,
    /// Listing date
    pub list_date: NaiveDate,
    /// Delisting date, if the stock has left the exchange
    pub delist_date: Option<NaiveDate>,
}

impl StockListing {
    /// Whether the stock trades on `date` and has done so for at least `min_days`
    /// calendar days.
    pub fn is_listed(&self, date: NaiveDate, min_days: u32) -> bool {
        let seasoned = (date - self.list_date).num_days() >= i64::from(min_days);
        let alive = self.delist_date.is_none_or(|delisted| date < delisted);
        self.list_date <= date && seasoned && alive
    }

    /// Load every listing of the `stock_list` table.
    pub fn load_all(store: &dyn TableStore) -> Result<Vec<Self>> {
        let request = ReadRequest::new(stock_list::TABLE)
            .fields([stock_list::NAME, stock_list::DELIST_DATE]);
        let df = store.read(&request)?;
        let dates = frame::dates(&df, frame::DATE)?;
        let ids = frame::ids(&df)?;
        let delisted = frame::texts(&df, stock_list::DELIST_DATE)?;

        let mut listings: BTreeMap<String, Self> = BTreeMap::new();
        for ((list_date, ticker), delist) in dates.into_iter().zip(ids).zip(delisted) {
            let delist_date = delist
                .filter(|s| !s.is_empty())
                .map(|s| frame::parse_date(&s))
                .transpose()?;
            listings.entry(ticker.clone()).or_insert(Self {
                ticker,
                list_date,
                delist_date,
            });
        }
        Ok(listings.into_values().collect())
    }
}

/// Filters applied when selecting stocks on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StockSelectionPolicy {
    /// Drop stocks suspended on the date (default: true)
    pub exclude_suspended: bool,
    /// Drop stocks whose name carries the special-treatment marker (default: false)
    pub exclude_st: bool,
    /// Minimum calendar days since listing (default: 0)
    pub min_listed_days: u32,
}

impl Default for StockSelectionPolicy {
    fn default() -> Self {
        Self {
            exclude_suspended: true,
            exclude_st: false,
            min_listed_days: 0,
        }
    }
}

/// Selects listed stocks according to a [`StockSelectionPolicy`].
#[derive(Debug)]
pub struct StockTickerSelector {
    policy: StockSelectionPolicy,
    listings: OnceCell<Vec<StockListing>>,
}

impl StockTickerSelector {
    /// Create a selector; listings are loaded on first use.
    pub const fn new(policy: StockSelectionPolicy) -> Self {
        Self {
            policy,
            listings: OnceCell::new(),
        }
    }

    /// Create a selector over known listings.
    pub fn with_listings(policy: StockSelectionPolicy, listings: Vec<StockListing>) -> Self {
        Self {
            policy,
            listings: OnceCell::from(listings),
        }
    }

    /// The selection policy.
    pub const fn policy(&self) -> &StockSelectionPolicy {
        &self.policy
    }

    fn listings(&self, store: &dyn TableStore) -> Result<&[StockListing]> {
        if let Some(listings) = self.listings.get() {
            return Ok(listings);
        }
        let loaded = StockListing::load_all(store)?;
        debug!(count = loaded.len(), "loaded stock listings");
        Ok(self.listings.get_or_init(|| loaded))
    }
}

impl TickerSelector for StockTickerSelector {
    fn tickers(&self, ctx: &FactorContext<'_>, date: NaiveDate) -> Result<Vec<String>> {
        let mut tickers: Vec<String> = self
            .listings(ctx.store)?
            .iter()
            .filter(|l| l.is_listed(date, self.policy.min_listed_days))
            .map(|l| l.ticker.clone())
            .collect();

        if self.policy.exclude_suspended {
            let suspended = suspended_on(ctx.store, date)?;
            tickers.retain(|t| !suspended.contains(t));
        }
        if self.policy.exclude_st && !tickers.is_empty() {
            let special = special_treatment_on(ctx.store, &tickers, date)?;
            tickers.retain(|t| !special.contains(t));
        }

        tickers.sort();
        Ok(tickers)
    }
}

/// Selects the stocks suspended on a date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuspendedTickers;

impl TickerSelector for SuspendedTickers {
    fn tickers(&self, ctx: &FactorContext<'_>, date: NaiveDate) -> Result<Vec<String>> {
        let mut tickers: Vec<String> = suspended_on(ctx.store, date)?.into_iter().collect();
        tickers.sort();
        Ok(tickers)
    }
}

fn suspended_on(store: &dyn TableStore, date: NaiveDate) -> Result<HashSet<String>> {
    let request = ReadRequest::new(suspension::TABLE)
        .field(suspension::SUSPENSION_TYPE)
        .on_dates([date]);
    Ok(frame::ids(&store.read(&request)?)?.into_iter().collect())
}

/// Tickers whose name in force on `date` carries the special-treatment marker.
fn special_treatment_on(
    store: &dyn TableStore,
    tickers: &[String],
    date: NaiveDate,
) -> Result<HashSet<String>> {
    let request = ReadRequest::new(stock_name::TABLE)
        .field(stock_name::NAME)
        .between(None, Some(date))
        .ids(tickers.iter().cloned());
    let df = store.read(&request)?;

    // Rows come ordered by date, so the last name seen per ticker is the current one
    let mut current: BTreeMap<String, Option<String>> = BTreeMap::new();
    for (id, name) in frame::ids(&df)?.into_iter().zip(frame::texts(&df, stock_name::NAME)?) {
        current.insert(id, name);
    }
    Ok(current
        .into_iter()
        .filter(|(_, name)| name.as_deref().is_some_and(|n| n.contains(ST_MARKER)))
        .map(|(id, _)| id)
        .collect())
}
