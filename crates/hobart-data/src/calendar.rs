//! Trading calendar.

use crate::error::{DataError, Result};
use crate::frame;
use crate::store::{ReadRequest, TableStore};
use crate::tables::trading_calendar;
use chrono::NaiveDate;

/// Ordered set of valid trading dates.
pub trait Calendar {
    /// Trading dates in `[start, end]`, ascending.
    fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate>;

    /// The trading date `days` trading days away from `date`.
    ///
    /// When `date` is not a trading date, a positive offset counts the first trading
    /// date after it as step one, zero returns that same next trading date, and a
    /// negative offset counts the last trading date before it as step minus one.
    fn offset(&self, date: NaiveDate, days: i64) -> Result<NaiveDate>;

    /// Whether the exchange is open on `date`.
    fn is_trading_date(&self, date: NaiveDate) -> bool;
}

/// Vector-backed trading calendar.
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    dates: Vec<NaiveDate>,
}

impl TradingCalendar {
    /// Build a calendar from trading dates in any order.
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        let mut dates: Vec<NaiveDate> = dates.into_iter().collect();
        dates.sort_unstable();
        dates.dedup();
        Self { dates }
    }

    /// Load open dates from the `trading_calendar` table.
    pub fn from_store(store: &dyn TableStore) -> Result<Self> {
        let df = store.read(&ReadRequest::new(trading_calendar::TABLE).field(trading_calendar::OPEN))?;
        let dates = frame::dates(&df, frame::DATE)?;
        let open = frame::numbers(&df, trading_calendar::OPEN)?;

        let calendar = Self::new(
            dates
                .into_iter()
                .zip(open)
                .filter(|(_, open)| open.is_some_and(|o| o != 0.0))
                .map(|(date, _)| date),
        );
        if calendar.is_empty() {
            return Err(DataError::EmptyCalendar);
        }
        Ok(calendar)
    }

    /// All trading dates.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Number of trading dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the calendar holds no dates.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

impl Calendar for TradingCalendar {
    fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        if start > end {
            return Vec::new();
        }
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end);
        self.dates[lo..hi].to_vec()
    }

    fn offset(&self, date: NaiveDate, days: i64) -> Result<NaiveDate> {
        let position = match self.dates.binary_search(&date) {
            Ok(index) => index as i64 + days,
            // `next` is the index of the first trading date after `date`
            Err(next) => {
                let next = next as i64;
                if days > 0 { next + days - 1 } else if days == 0 { next } else { next + days }
            }
        };

        usize::try_from(position)
            .ok()
            .and_then(|i| self.dates.get(i).copied())
            .ok_or(DataError::CalendarOutOfRange { date, offset: days })
    }

    fn is_trading_date(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Record, SqliteStore};
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Mon 4th to Fri 8th and Mon 11th of January 2021.
    fn calendar() -> TradingCalendar {
        TradingCalendar::new([
            d(2021, 1, 11),
            d(2021, 1, 4),
            d(2021, 1, 5),
            d(2021, 1, 6),
            d(2021, 1, 7),
            d(2021, 1, 8),
        ])
    }

    #[test]
    fn test_trading_dates_range() {
        let cal = calendar();
        assert_eq!(
            cal.trading_dates(d(2021, 1, 7), d(2021, 1, 10)),
            vec![d(2021, 1, 7), d(2021, 1, 8)]
        );
        assert!(cal.trading_dates(d(2021, 1, 9), d(2021, 1, 10)).is_empty());
        assert!(cal.trading_dates(d(2021, 1, 8), d(2021, 1, 4)).is_empty());
    }

    #[rstest]
    #[case(d(2021, 1, 5), 1, d(2021, 1, 6))]
    #[case(d(2021, 1, 5), -1, d(2021, 1, 4))]
    #[case(d(2021, 1, 8), 0, d(2021, 1, 8))]
    #[case(d(2021, 1, 9), 1, d(2021, 1, 11))]
    #[case(d(2021, 1, 9), 0, d(2021, 1, 11))]
    #[case(d(2021, 1, 10), -1, d(2021, 1, 8))]
    #[case(d(2021, 1, 10), -2, d(2021, 1, 7))]
    fn test_offset(#[case] date: NaiveDate, #[case] days: i64, #[case] expected: NaiveDate) {
        assert_eq!(calendar().offset(date, days).unwrap(), expected);
    }

    #[test]
    fn test_offset_out_of_range() {
        let cal = calendar();
        assert!(cal.offset(d(2021, 1, 4), -1).is_err());
        assert!(cal.offset(d(2021, 1, 11), 1).is_err());
        assert!(cal.offset(d(2021, 1, 12), 0).is_err());
    }

    #[test]
    fn test_from_store_skips_closed_days() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert(
                trading_calendar::TABLE,
                &[
                    Record::new(d(2021, 1, 4), "SSE", trading_calendar::OPEN, 1.0),
                    Record::new(d(2021, 1, 9), "SSE", trading_calendar::OPEN, 0.0),
                    Record::new(d(2021, 1, 5), "SSE", trading_calendar::OPEN, 1.0),
                ],
            )
            .unwrap();

        let cal = TradingCalendar::from_store(&store).unwrap();
        assert_eq!(cal.dates(), &[d(2021, 1, 4), d(2021, 1, 5)]);
        assert!(!cal.is_trading_date(d(2021, 1, 9)));
    }

    #[test]
    fn test_from_empty_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(matches!(
            TradingCalendar::from_store(&store),
            Err(DataError::EmptyCalendar)
        ));
    }
}
