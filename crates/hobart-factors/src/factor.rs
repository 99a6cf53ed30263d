//! The factor abstraction.
//!
//! A factor is a read-only view keyed by (date, entity). Every factor returns the same
//! frame layout from [`Factor::get_data`]: `date` (Date), `id` (String) and `value`
//! (Float64), sorted by date then id, with no null values.

use crate::error::{FactorError, Result};
use chrono::NaiveDate;
use derive_more::Display;
use hobart_data::frame::{DATE, ID, VALUE};
use hobart_data::{Calendar, TableStore};
use polars::prelude::*;

/// How a factor's values relate to trading dates.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactorKind {
    /// One value per trading date
    Continuous,
    /// Value persists between sparse change events
    Compact,
    /// Keyed by fiscal report period, resolved as of a date
    Accounting,
    /// Computed from other factors
    Derived,
}

/// Collaborators a factor reads through.
#[derive(Clone, Copy)]
pub struct FactorContext<'a> {
    /// Table store
    pub store: &'a dyn TableStore,
    /// Trading calendar
    pub calendar: &'a dyn Calendar,
}

impl<'a> FactorContext<'a> {
    /// Bundle a store and a calendar.
    pub const fn new(store: &'a dyn TableStore, calendar: &'a dyn Calendar) -> Self {
        Self { store, calendar }
    }
}

impl std::fmt::Debug for FactorContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactorContext").finish_non_exhaustive()
    }
}

/// Dates a factor is evaluated on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSelection {
    /// Exactly these dates
    Dates(Vec<NaiveDate>),
    /// Trading dates in an inclusive range
    Range {
        /// First date
        start: NaiveDate,
        /// Last date
        end: NaiveDate,
    },
}

/// Dates and entities to evaluate a factor on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactorQuery {
    /// Date selection
    pub dates: DateSelection,
    /// Entities; `None` means every entity with data
    pub ids: Option<Vec<String>>,
}

impl FactorQuery {
    /// Query exact dates.
    pub fn on(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: DateSelection::Dates(dates.into_iter().collect()),
            ids: None,
        }
    }

    /// Query a single date.
    pub fn on_date(date: NaiveDate) -> Self {
        Self::on([date])
    }

    /// Query every trading date in `[start, end]`.
    pub const fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            dates: DateSelection::Range { start, end },
            ids: None,
        }
    }

    /// Restrict to entities.
    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Same entities, different dates.
    pub fn with_dates(&self, dates: DateSelection) -> Self {
        Self {
            dates,
            ids: self.ids.clone(),
        }
    }

    /// Concrete evaluation dates, ascending and unique.
    pub fn resolve_dates(&self, calendar: &dyn Calendar) -> Vec<NaiveDate> {
        match &self.dates {
            DateSelection::Dates(dates) => {
                let mut dates = dates.clone();
                dates.sort_unstable();
                dates.dedup();
                dates
            }
            DateSelection::Range { start, end } => calendar.trading_dates(*start, *end),
        }
    }

    /// First and last requested date.
    pub fn bounds(&self) -> Result<(NaiveDate, NaiveDate)> {
        match &self.dates {
            DateSelection::Dates(dates) => {
                let first = dates.iter().min();
                let last = dates.iter().max();
                first
                    .zip(last)
                    .map(|(f, l)| (*f, *l))
                    .ok_or_else(|| FactorError::InvalidQuery("no dates requested".to_string()))
            }
            DateSelection::Range { start, end } if start <= end => Ok((*start, *end)),
            DateSelection::Range { start, end } => Err(FactorError::InvalidQuery(format!(
                "range start {start} is after end {end}"
            ))),
        }
    }
}

/// A read-only, possibly derived view keyed by (date, entity).
pub trait Factor: std::fmt::Debug {
    /// Identifier of the series.
    fn name(&self) -> &str;

    /// Relation of values to trading dates.
    fn kind(&self) -> FactorKind;

    /// Evaluate the factor.
    ///
    /// Returns a `date`/`id`/`value` frame restricted to the query.
    fn get_data(&self, ctx: &FactorContext<'_>, query: &FactorQuery) -> Result<DataFrame>;
}

impl Factor for Box<dyn Factor> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn kind(&self) -> FactorKind {
        (**self).kind()
    }

    fn get_data(&self, ctx: &FactorContext<'_>, query: &FactorQuery) -> Result<DataFrame> {
        (**self).get_data(ctx, query)
    }
}

/// Normalise a frame to the factor layout, taking values from `field`.
pub(crate) fn value_frame(df: DataFrame, field: &str) -> Result<DataFrame> {
    Ok(df
        .lazy()
        .select([
            col(DATE),
            col(ID),
            col(field).cast(DataType::Float64).alias(VALUE),
        ])
        .drop_nulls(None)
        .sort([DATE, ID], Default::default())
        .collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hobart_data::TradingCalendar;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_resolve_dates() {
        let cal = TradingCalendar::new([d(2021, 1, 4), d(2021, 1, 5), d(2021, 1, 6)]);

        let query = FactorQuery::on([d(2021, 1, 6), d(2021, 1, 4), d(2021, 1, 6)]);
        assert_eq!(query.resolve_dates(&cal), vec![d(2021, 1, 4), d(2021, 1, 6)]);

        let query = FactorQuery::between(d(2021, 1, 5), d(2021, 1, 9));
        assert_eq!(query.resolve_dates(&cal), vec![d(2021, 1, 5), d(2021, 1, 6)]);
    }

    #[test]
    fn test_bounds() {
        let query = FactorQuery::on([d(2021, 1, 6), d(2021, 1, 4)]);
        assert_eq!(query.bounds().unwrap(), (d(2021, 1, 4), d(2021, 1, 6)));

        assert!(FactorQuery::on(Vec::new()).bounds().is_err());
        assert!(FactorQuery::between(d(2021, 1, 6), d(2021, 1, 4)).bounds().is_err());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(FactorKind::Compact.to_string(), "Compact");
    }
}
