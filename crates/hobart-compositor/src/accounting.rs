//! Accounting factors resolved through the date cache.
//!
//! Statement tables are keyed by announcement date and report period. On any date the
//! date cache tells which statements were current, so a factor value never uses a
//! statement announced after that date.

use crate::date_cache::{DateCacheEntry, DateCacheSnapshot, StatementRef};
use chrono::NaiveDate;
use derive_more::Display;
use hobart_data::{ReadRequest, frame};
use hobart_factors::reporting::is_annual;
use hobart_factors::{Factor, FactorContext, FactorKind, FactorQuery, Result};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::rc::Rc;

/// How statement values combine into a factor value.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccountingMode {
    /// Value of the newest statement
    #[default]
    #[display("latest")]
    Latest,
    /// Growth over the previous quarter
    #[display("qoq")]
    QoQ,
    /// Growth over the same period a year earlier
    #[display("yoy")]
    YoY,
    /// Trailing twelve months of a cumulative year-to-date field
    #[display("ttm")]
    Ttm,
}

type StatementValues = HashMap<(String, StatementRef), f64>;

impl AccountingMode {
    fn evaluate(
        self,
        entry: &DateCacheEntry,
        value: impl Fn(Option<StatementRef>) -> Option<f64>,
    ) -> Option<f64> {
        let current = value(Some(entry.current))?;
        let result = match self {
            Self::Latest => current,
            Self::QoQ => current / value(entry.q1)? - 1.0,
            Self::YoY => current / value(entry.yoy)? - 1.0,
            Self::Ttm if is_annual(entry.current.period) => current,
            Self::Ttm => current + value(entry.y1)? - value(entry.yoy)?,
        };
        result.is_finite().then_some(result)
    }
}

/// A statement field evaluated as of trading dates.
#[derive(Debug, Clone)]
pub struct AccountingFactor {
    name: String,
    table: String,
    field: String,
    mode: AccountingMode,
    cache: Rc<DateCacheSnapshot>,
}

impl AccountingFactor {
    /// Factor over `table.field` in `mode`, resolved through `cache`.
    pub fn new(
        table: impl Into<String>,
        field: impl Into<String>,
        mode: AccountingMode,
        cache: Rc<DateCacheSnapshot>,
    ) -> Self {
        let field = field.into();
        let name = match mode {
            AccountingMode::Latest => field.clone(),
            _ => format!("{field}_{mode}"),
        };
        Self {
            name,
            table: table.into(),
            field,
            mode,
            cache,
        }
    }

    fn statement_values(
        &self,
        ctx: &FactorContext<'_>,
        ids: &[String],
        until: NaiveDate,
    ) -> Result<StatementValues> {
        let df = ctx.store.read(
            &ReadRequest::new(self.table.as_str())
                .field(self.field.as_str())
                .between(None, Some(until))
                .ids(ids.iter().cloned()),
        )?;
        if df.height() == 0 || df.column(frame::REPORT_PERIOD).is_err() {
            return Ok(StatementValues::new());
        }

        let announced = frame::dates(&df, frame::DATE)?;
        let periods = frame::optional_dates(&df, frame::REPORT_PERIOD)?;
        let values = frame::numbers(&df, &self.field)?;
        let mut by_statement = StatementValues::new();
        for (((announced, id), period), value) in
            announced.into_iter().zip(frame::ids(&df)?).zip(periods).zip(values)
        {
            if let (Some(period), Some(value)) = (period, value) {
                by_statement.insert((id, StatementRef::new(announced, period)), value);
            }
        }
        Ok(by_statement)
    }
}

impl Factor for AccountingFactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FactorKind {
        FactorKind::Accounting
    }

    fn get_data(&self, ctx: &FactorContext<'_>, query: &FactorQuery) -> Result<DataFrame> {
        let dates = query.resolve_dates(ctx.calendar);
        let ids: Vec<String> = match &query.ids {
            Some(ids) => ids.clone(),
            None => self.cache.entries.keys().cloned().collect(),
        };
        let (Some(last), false) = (dates.last().copied(), ids.is_empty()) else {
            return Ok(frame::panel_frame(Vec::new())?);
        };

        let values = self.statement_values(ctx, &ids, last)?;
        let mut points = Vec::new();
        for date in &dates {
            for id in &ids {
                let Some((_, entry)) = self.cache.resolve(id, *date) else {
                    continue;
                };
                let lookup = |statement: Option<StatementRef>| {
                    values.get(&(id.clone(), statement?)).copied()
                };
                if let Some(value) = self.mode.evaluate(entry, lookup) {
                    points.push((*date, id.clone(), value));
                }
            }
        }
        Ok(frame::panel_frame(points)?)
    }
}
