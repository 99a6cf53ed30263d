//! The compositor contract and shared resume logic.

use crate::error::Result;
use chrono::NaiveDate;
use hobart_data::{Calendar, CheckpointStore, TableStore};
use hobart_factors::FactorContext;
use serde::Serialize;
use std::fmt;

/// Collaborators a compositor runs against.
#[derive(Clone, Copy)]
pub struct CompositorContext<'a> {
    /// Table store holding raw and derived tables
    pub store: &'a dyn TableStore,
    /// Trading calendar
    pub calendar: &'a dyn Calendar,
    /// Resume points per stream
    pub checkpoints: &'a dyn CheckpointStore,
}

impl<'a> CompositorContext<'a> {
    /// Bundle the collaborators.
    pub const fn new(
        store: &'a dyn TableStore,
        calendar: &'a dyn Calendar,
        checkpoints: &'a dyn CheckpointStore,
    ) -> Self {
        Self {
            store,
            calendar,
            checkpoints,
        }
    }

    /// Context for evaluating factors.
    pub const fn factors(&self) -> FactorContext<'a> {
        FactorContext::new(self.store, self.calendar)
    }

    /// Last fully processed date of a stream.
    ///
    /// This is the later of the stream's checkpoint and the latest date already present
    /// in `table` (restricted to `id` when given), so tables written without checkpoints
    /// still resume where they stopped.
    pub fn watermark(&self, stream: &str, table: &str, id: Option<&str>) -> Result<Option<NaiveDate>> {
        let checkpoint = self.checkpoints.load_checkpoint(stream)?;
        let latest = self.store.latest_timestamp(table, id)?;
        Ok(checkpoint.max(latest))
    }

    /// Trading dates still to process up to `end`.
    ///
    /// Without a watermark processing starts at `default_start`; otherwise on the first
    /// trading date after the watermark.
    pub fn pending_dates(
        &self,
        watermark: Option<NaiveDate>,
        default_start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<NaiveDate> {
        let start = match watermark {
            Some(last) => match last.succ_opt() {
                Some(next) => next.max(default_start),
                None => return Vec::new(),
            },
            None => default_start,
        };
        self.calendar.trading_dates(start, end)
    }
}

impl fmt::Debug for CompositorContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositorContext").finish_non_exhaustive()
    }
}

/// Outcome of one compositor run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSummary {
    /// Compositor name
    pub compositor: String,
    /// Watermark the run resumed from
    pub resumed_from: Option<NaiveDate>,
    /// Dates or entities processed
    pub processed: usize,
    /// Rows written
    pub rows_written: usize,
    /// Entities or dates skipped because of incomplete data
    pub skipped: usize,
}

impl UpdateSummary {
    /// Empty summary for a compositor.
    pub fn new(compositor: impl Into<String>) -> Self {
        Self {
            compositor: compositor.into(),
            ..Default::default()
        }
    }
}

impl fmt::Display for UpdateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} processed, {} rows written, {} skipped",
            self.compositor, self.processed, self.rows_written, self.skipped
        )?;
        if let Some(date) = self.resumed_from {
            write!(f, " (resumed after {date})")?;
        }
        Ok(())
    }
}

/// An update procedure that incrementally computes and persists one derived series.
///
/// Running `update` twice without new upstream data writes nothing the second time.
pub trait Compositor {
    /// Name used in logs and summaries.
    fn name(&self) -> &str;

    /// Bring the derived series up to date.
    fn update(&self, ctx: &CompositorContext<'_>) -> Result<UpdateSummary>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use hobart_data::{MemoryCheckpoints, Record, SqliteStore, TradingCalendar};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_watermark_is_max_of_checkpoint_and_table() {
        let store = SqliteStore::in_memory().unwrap();
        let calendar = TradingCalendar::new([d(2021, 1, 4)]);
        let checkpoints = MemoryCheckpoints::new();
        let ctx = CompositorContext::new(&store, &calendar, &checkpoints);

        assert_eq!(ctx.watermark("s", "t", None).unwrap(), None);

        store
            .upsert("t", &[Record::new(d(2021, 1, 5), "A", "f", 1.0)])
            .unwrap();
        assert_eq!(ctx.watermark("s", "t", None).unwrap(), Some(d(2021, 1, 5)));
        assert_eq!(ctx.watermark("s", "t", Some("B")).unwrap(), None);

        checkpoints.save_checkpoint("s", d(2021, 1, 8)).unwrap();
        assert_eq!(ctx.watermark("s", "t", None).unwrap(), Some(d(2021, 1, 8)));
    }

    #[test]
    fn test_pending_dates() {
        let store = SqliteStore::in_memory().unwrap();
        let calendar = TradingCalendar::new([d(2021, 1, 4), d(2021, 1, 5), d(2021, 1, 6)]);
        let checkpoints = MemoryCheckpoints::new();
        let ctx = CompositorContext::new(&store, &calendar, &checkpoints);

        assert_eq!(
            ctx.pending_dates(None, d(2021, 1, 5), d(2021, 1, 6)),
            vec![d(2021, 1, 5), d(2021, 1, 6)]
        );
        assert_eq!(
            ctx.pending_dates(Some(d(2021, 1, 4)), d(2000, 1, 1), d(2021, 1, 6)),
            vec![d(2021, 1, 5), d(2021, 1, 6)]
        );
        assert!(ctx.pending_dates(Some(d(2021, 1, 6)), d(2000, 1, 1), d(2021, 1, 6)).is_empty());
    }

    #[test]
    fn test_summary_display() {
        let mut summary = UpdateSummary::new("limit_moves");
        summary.processed = 3;
        summary.rows_written = 2;
        summary.resumed_from = Some(d(2021, 1, 4));
        assert_eq!(
            summary.to_string(),
            "limit_moves: 3 processed, 2 rows written, 0 skipped (resumed after 2021-01-04)"
        );
    }
}
