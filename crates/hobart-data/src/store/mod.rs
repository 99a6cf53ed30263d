//! Table store contract.
//!
//! A table is a time × entity indexed dataset. Accounting tables additionally key their
//! rows by report period, so one announcement date can carry several statements.

pub mod sqlite;

use crate::error::Result;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

pub use sqlite::{SqliteStore, StoreStats};

/// A stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Numeric value
    Number(f64),
    /// Categorical value
    Text(String),
}

impl Value {
    /// Numeric content, if any.
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    /// Text content, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// One point of a stored series.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Observation date
    pub date: NaiveDate,
    /// Entity id (ticker)
    pub id: String,
    /// Fiscal period the row describes, for accounting tables
    pub report_period: Option<NaiveDate>,
    /// Field name
    pub field: String,
    /// Value
    pub value: Value,
}

impl Record {
    /// Create a record without a report period.
    pub fn new(
        date: NaiveDate,
        id: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            date,
            id: id.into(),
            report_period: None,
            field: field.into(),
            value: value.into(),
        }
    }

    /// Attach a report period.
    pub const fn with_report_period(mut self, period: NaiveDate) -> Self {
        self.report_period = Some(period);
        self
    }
}

/// Date selection of a read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DateFilter {
    /// Every date in the table
    #[default]
    All,
    /// Exactly these dates
    On(Vec<NaiveDate>),
    /// Inclusive range; open ends are unbounded
    Between {
        /// First date, inclusive
        start: Option<NaiveDate>,
        /// Last date, inclusive
        end: Option<NaiveDate>,
    },
}

/// A read against one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    /// Table name
    pub table: String,
    /// Fields to read; empty reads every field of the table
    pub fields: Vec<String>,
    /// Date selection
    pub dates: DateFilter,
    /// Entity selection; `None` reads every entity
    pub ids: Option<Vec<String>>,
    /// Restrict accounting rows to one report period
    pub report_period: Option<NaiveDate>,
}

impl ReadRequest {
    /// Read every row of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
            dates: DateFilter::All,
            ids: None,
            report_period: None,
        }
    }

    /// Add one field.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Add several fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Restrict to exact dates.
    pub fn on_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.dates = DateFilter::On(dates.into_iter().collect());
        self
    }

    /// Restrict to an inclusive date range.
    pub fn between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.dates = DateFilter::Between { start, end };
        self
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

    /// Restrict to one report period.
    pub const fn report_period(mut self, period: NaiveDate) -> Self {
        self.report_period = Some(period);
        self
    }

    /// Whether the request can only match nothing.
    pub fn is_trivially_empty(&self) -> bool {
        matches!(&self.dates, DateFilter::On(d) if d.is_empty())
            || matches!(&self.ids, Some(ids) if ids.is_empty())
    }
}

/// Read/write access to named tables.
///
/// Reads return a frame with a `date` column (Date), an `id` column (String), a
/// `report_period` column (Date) when any returned row carries one, and one column per
/// requested field. Numeric fields are Float64, categorical fields are String; a missing
/// value is null. Rows are ordered by date, id and report period.
pub trait TableStore {
    /// Read rows matching `request`.
    fn read(&self, request: &ReadRequest) -> Result<DataFrame>;

    /// Latest date present in `table`, optionally for one entity.
    fn latest_timestamp(&self, table: &str, id: Option<&str>) -> Result<Option<NaiveDate>>;

    /// Insert or replace records, keyed by date, id, report period and field.
    ///
    /// All records of one call are written atomically. Returns the number written.
    fn upsert(&self, table: &str, records: &[Record]) -> Result<usize>;

    /// Every entity id present in `table`, sorted.
    fn all_ids(&self, table: &str) -> Result<Vec<String>>;
}
