//! Error types for data operations.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur during data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Calendar offset fell outside the known trading dates
    #[error("Trading calendar has no date {offset} trading days from {date}")]
    CalendarOutOfRange {
        /// Date the offset was taken from
        date: NaiveDate,
        /// Requested offset in trading days
        offset: i64,
    },

    /// Trading calendar is empty
    #[error("Trading calendar is empty")]
    EmptyCalendar,

    /// Column missing from a frame
    #[error("Missing column: {0}")]
    MissingColumn(String),
}

impl DataError {
    /// Whether the error comes from the backing store itself rather than the data in it.
    ///
    /// Store failures abort a whole compositor run; everything else is scoped to the
    /// entity or date being processed.
    pub const fn is_store_failure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let err = DataError::CalendarOutOfRange { date, offset: -3 };
        assert_eq!(
            err.to_string(),
            "Trading calendar has no date -3 trading days from 2021-01-04"
        );
    }

    #[test]
    fn test_store_failure_classification() {
        let err = DataError::Database(rusqlite::Error::InvalidQuery);
        assert!(err.is_store_failure());

        let err = DataError::Parse("bad date".to_string());
        assert!(!err.is_store_failure());
    }
}
