//! Factors with one stored value per trading date.

use crate::error::Result;
use crate::factor::{DateSelection, Factor, FactorContext, FactorKind, FactorQuery, value_frame};
use hobart_data::{ReadRequest, frame};
use polars::prelude::DataFrame;

/// Build the store read behind a query for one field.
pub(crate) fn read_request(table: &str, field: &str, query: &FactorQuery) -> ReadRequest {
    let request = ReadRequest::new(table).field(field);
    let request = match &query.dates {
        DateSelection::Dates(dates) => request.on_dates(dates.iter().copied()),
        DateSelection::Range { start, end } => request.between(Some(*start), Some(*end)),
    };
    match &query.ids {
        Some(ids) => request.ids(ids.iter().cloned()),
        None => request,
    }
}

/// A stored field read as is.
#[derive(Debug, Clone)]
pub struct ContinuousFactor {
    name: String,
    table: String,
    field: String,
}

impl ContinuousFactor {
    /// Factor over `table.field`, named after the field.
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: field.clone(),
            table: table.into(),
            field,
        }
    }

    /// Override the factor name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Source table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Source field.
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl Factor for ContinuousFactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FactorKind {
        FactorKind::Continuous
    }

    fn get_data(&self, ctx: &FactorContext<'_>, query: &FactorQuery) -> Result<DataFrame> {
        let request = read_request(&self.table, &self.field, query);
        if request.is_trivially_empty() {
            return Ok(frame::panel_frame(Vec::new())?);
        }

        let df = value_frame(ctx.store.read(&request)?, &self.field)?;
        match query.dates {
            // Only trading dates belong to a range query
            DateSelection::Range { .. } => {
                Ok(frame::restrict_dates(&df, &query.resolve_dates(ctx.calendar))?)
            }
            DateSelection::Dates(_) => Ok(df),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use hobart_data::tables::stock_daily;
    use hobart_data::{Record, SqliteStore, TableStore, TradingCalendar};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup() -> (SqliteStore, TradingCalendar) {
        let store = SqliteStore::in_memory().unwrap();
        store
            .upsert(
                stock_daily::TABLE,
                &[
                    Record::new(d(2021, 1, 4), "A", stock_daily::CLOSE, 10.0),
                    Record::new(d(2021, 1, 5), "A", stock_daily::CLOSE, 11.0),
                    Record::new(d(2021, 1, 5), "B", stock_daily::CLOSE, 20.0),
                    // Weekend row that the calendar does not know
                    Record::new(d(2021, 1, 9), "B", stock_daily::CLOSE, 99.0),
                ],
            )
            .unwrap();
        let calendar = TradingCalendar::new([d(2021, 1, 4), d(2021, 1, 5)]);
        (store, calendar)
    }

    #[test]
    fn test_range_read() {
        let (store, calendar) = setup();
        let ctx = FactorContext::new(&store, &calendar);
        let close = ContinuousFactor::new(stock_daily::TABLE, stock_daily::CLOSE);

        let df = close
            .get_data(&ctx, &FactorQuery::between(d(2021, 1, 1), d(2021, 1, 31)))
            .unwrap();
        assert_eq!(df.height(), 3);

        let panel = frame::panel(&df, frame::VALUE).unwrap();
        assert_relative_eq!(panel[&(d(2021, 1, 5), "B".to_string())], 20.0);
    }

    #[test]
    fn test_point_read_with_ids() {
        let (store, calendar) = setup();
        let ctx = FactorContext::new(&store, &calendar);
        let close = ContinuousFactor::new(stock_daily::TABLE, stock_daily::CLOSE).named("close");

        let df = close
            .get_data(&ctx, &FactorQuery::on_date(d(2021, 1, 5)).ids(["A"]))
            .unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(close.name(), "close");
        assert_eq!(close.kind(), FactorKind::Continuous);

        let empty = close
            .get_data(&ctx, &FactorQuery::on_date(d(2021, 1, 5)).ids(Vec::<String>::new()))
            .unwrap();
        assert_eq!(empty.height(), 0);
    }
}
