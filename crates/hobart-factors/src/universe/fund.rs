//! Fund listings.

use crate::error::Result;
use chrono::NaiveDate;
use derive_more::Display;
use hobart_data::tables::{exchange_fund_daily, fund_list, otc_fund_nav};
use hobart_data::{ReadRequest, TableStore, frame};
use std::collections::BTreeMap;

/// Suffix of over-the-counter fund tickers.
const OTC_SUFFIX: &str = ".OF";

/// Where a fund's units trade.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FundKind {
    /// Listed on an exchange, priced by its daily close
    #[display("exchange-traded")]
    ExchangeTraded,
    /// Subscribed and redeemed at net asset value
    #[display("over-the-counter")]
    OverTheCounter,
}

impl FundKind {
    /// Table and field holding the fund's unit price.
    pub const fn price_source(self) -> (&'static str, &'static str) {
        match self {
            Self::ExchangeTraded => (exchange_fund_daily::TABLE, exchange_fund_daily::CLOSE),
            Self::OverTheCounter => (otc_fund_nav::TABLE, otc_fund_nav::UNIT_NAV),
        }
    }
}

/// A listed fund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundTicker {
    /// Ticker
    pub ticker: String,
    /// Listing venue
    pub kind: FundKind,
    /// Listing date
    pub list_date: NaiveDate,
}

impl FundTicker {
    /// Create a fund entry, classifying it by ticker.
    pub fn new(ticker: impl Into<String>, list_date: NaiveDate) -> Self {
        let ticker = ticker.into();
        Self {
            kind: Self::classify(&ticker),
            ticker,
            list_date,
        }
    }

    /// Classify a ticker: `.OF` tickers are over-the-counter funds.
    pub fn classify(ticker: &str) -> FundKind {
        if ticker.ends_with(OTC_SUFFIX) {
            FundKind::OverTheCounter
        } else {
            FundKind::ExchangeTraded
        }
    }
}

/// All listed funds.
#[derive(Debug, Clone, Default)]
pub struct FundUniverse {
    funds: BTreeMap<String, FundTicker>,
}

impl FundUniverse {
    /// Build a universe from fund entries.
    pub fn new(funds: impl IntoIterator<Item = FundTicker>) -> Self {
        Self {
            funds: funds.into_iter().map(|f| (f.ticker.clone(), f)).collect(),
        }
    }

    /// Load every fund of the `fund_list` table.
    ///
    /// A fund listed more than once keeps its earliest listing date.
    pub fn load(store: &dyn TableStore) -> Result<Self> {
        let df = store.read(&ReadRequest::new(fund_list::TABLE).field(fund_list::NAME))?;
        let dates = frame::dates(&df, frame::DATE)?;
        let ids = frame::ids(&df)?;

        let mut funds: BTreeMap<String, FundTicker> = BTreeMap::new();
        for (date, id) in dates.into_iter().zip(ids) {
            funds
                .entry(id.clone())
                .or_insert_with(|| FundTicker::new(id, date));
        }
        Ok(Self { funds })
    }

    /// Sorted fund tickers.
    pub fn tickers(&self) -> Vec<String> {
        self.funds.keys().cloned().collect()
    }

    /// Look up one fund.
    pub fn get(&self, ticker: &str) -> Option<&FundTicker> {
        self.funds.get(ticker)
    }

    /// Iterate funds in ticker order.
    pub fn iter(&self) -> impl Iterator<Item = &FundTicker> {
        self.funds.values()
    }

    /// Number of funds.
    pub fn len(&self) -> usize {
        self.funds.len()
    }

    /// Whether no fund is listed.
    pub fn is_empty(&self) -> bool {
        self.funds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hobart_data::{Record, SqliteStore};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(FundTicker::classify("000001.OF"), FundKind::OverTheCounter);
        assert_eq!(FundTicker::classify("510300.SH"), FundKind::ExchangeTraded);
        assert_eq!(
            FundKind::OverTheCounter.price_source(),
            (otc_fund_nav::TABLE, otc_fund_nav::UNIT_NAV)
        );
        assert_eq!(FundKind::ExchangeTraded.to_string(), "exchange-traded");
    }

    #[test]
    fn test_load() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert(
                fund_list::TABLE,
                &[
                    Record::new(d(2012, 5, 28), "510300.SH", fund_list::NAME, "CSI 300 ETF"),
                    Record::new(d(2003, 1, 1), "000001.OF", fund_list::NAME, "Growth"),
                ],
            )
            .unwrap();

        let universe = FundUniverse::load(&store).unwrap();
        assert_eq!(universe.len(), 2);
        assert_eq!(universe.tickers(), vec!["000001.OF", "510300.SH"]);

        let otc = universe.get("000001.OF").unwrap();
        assert_eq!(otc.kind, FundKind::OverTheCounter);
        assert_eq!(otc.list_date, d(2003, 1, 1));
    }
}
