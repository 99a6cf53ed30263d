//! Conversions between store frames and plain collections.
//!
//! Compositors work on small per-date slices, so most of them pull a frame apart into
//! maps keyed by entity rather than staying in polars.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Date column name.
pub const DATE: &str = "date";
/// Entity id column name.
pub const ID: &str = "id";
/// Report period column name.
pub const REPORT_PERIOD: &str = "report_period";
/// Value column name of factor frames.
pub const VALUE: &str = "value";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| DataError::Parse(format!("invalid date {s:?}: {e}")))
}

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| DataError::MissingColumn(name.to_string()))
}

/// Date column as optional dates.
pub fn optional_dates(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDate>>> {
    let as_text = column(df, name)?.cast(&DataType::String)?;
    as_text
        .str()?
        .into_iter()
        .map(|v| v.map(parse_date).transpose())
        .collect()
}

/// Date column; nulls are an error.
pub fn dates(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>> {
    optional_dates(df, name)?
        .into_iter()
        .map(|d| d.ok_or_else(|| DataError::Parse(format!("null in date column {name}"))))
        .collect()
}

/// Column rendered as optional text.
pub fn texts(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let as_text = column(df, name)?.cast(&DataType::String)?;
    Ok(as_text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Entity ids of a frame.
pub fn ids(df: &DataFrame) -> Result<Vec<String>> {
    texts(df, ID)?
        .into_iter()
        .map(|id| id.ok_or_else(|| DataError::Parse("null entity id".to_string())))
        .collect()
}

/// Column cast to Float64.
pub fn numbers(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let as_f64 = column(df, name)?.cast(&DataType::Float64)?;
    Ok(as_f64.f64()?.into_iter().collect())
}

/// Non-null values of `field` keyed by (date, id).
pub fn panel(df: &DataFrame, field: &str) -> Result<BTreeMap<(NaiveDate, String), f64>> {
    let dates = dates(df, DATE)?;
    let ids = ids(df)?;
    let values = numbers(df, field)?;

    Ok(dates
        .into_iter()
        .zip(ids)
        .zip(values)
        .filter_map(|((date, id), value)| value.map(|v| ((date, id), v)))
        .collect())
}

/// Non-null values of `field` keyed by id. Later rows win.
pub fn values_by_id(df: &DataFrame, field: &str) -> Result<HashMap<String, f64>> {
    let ids = ids(df)?;
    let values = numbers(df, field)?;

    Ok(ids
        .into_iter()
        .zip(values)
        .filter_map(|(id, value)| value.map(|v| (id, v)))
        .collect())
}

/// Build a `date`/`id`/`value` frame.
pub fn panel_frame<I>(points: I) -> Result<DataFrame>
where
    I: IntoIterator<Item = (NaiveDate, String, f64)>,
{
    let mut dates = Vec::new();
    let mut ids = Vec::new();
    let mut values = Vec::new();
    for (date, id, value) in points {
        dates.push(date.to_string());
        ids.push(id);
        values.push(value);
    }

    let df = DataFrame::new(vec![
        Series::new(DATE.into(), dates).into(),
        Series::new(ID.into(), ids).into(),
        Series::new(VALUE.into(), values).into(),
    ])?;

    Ok(df
        .lazy()
        .with_column(col(DATE).cast(DataType::Date))
        .collect()?)
}

/// Keep only rows whose date is one of `keep`.
pub fn restrict_dates(df: &DataFrame, keep: &[NaiveDate]) -> Result<DataFrame> {
    let keep: HashSet<NaiveDate> = keep.iter().copied().collect();
    let mask: BooleanChunked = dates(df, DATE)?
        .iter()
        .map(|d| keep.contains(d))
        .collect();
    Ok(df.filter(&mask)?)
}
