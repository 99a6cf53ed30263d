//! Incremental construction of the date cache.

use super::{
    DateCacheDelta, DateCacheEntry, DateCacheSnapshot, EntityEntries, StatementRef,
    initial_watermark,
};
use crate::compositor::{Compositor, CompositorContext, UpdateSummary};
use crate::error::Result;
use chrono::NaiveDate;
use hobart_data::tables::balance_sheet;
use hobart_data::{ReadRequest, frame};
use hobart_factors::reporting::{qoq_date, yearly_dates_offset, yoy_date};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Find the most recently announced statement for `period`.
fn find_period(known: &[StatementRef], period: NaiveDate) -> Option<StatementRef> {
    known.iter().rev().find(|s| s.period == period).copied()
}

/// Cache entry for statements known up to some date; `known` is ordered by announcement.
pub(crate) fn entry_for(known: &[StatementRef]) -> Option<DateCacheEntry> {
    let current = *known.last()?;
    let report = current.period;
    let q1 = qoq_date(report);

    Some(DateCacheEntry {
        current,
        q1: find_period(known, q1),
        q2: find_period(known, qoq_date(q1)),
        yoy: find_period(known, yoy_date(report)),
        y1: find_period(known, yearly_dates_offset(report, 1)),
        y3: find_period(known, yearly_dates_offset(report, 3)),
        y5: find_period(known, yearly_dates_offset(report, 5)),
    })
}

/// New cache state of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDelta {
    /// Last announcement date processed
    pub watermark: NaiveDate,
    /// Entries keyed by trading date
    pub entries: EntityEntries,
    /// Key of an already stored entry that `entries` rebuilds
    pub refreshed: Option<NaiveDate>,
}

/// Builds the accounting-date cache file from a statement table.
#[derive(Debug, Clone)]
pub struct AccountingDateCacheCompositor {
    path: PathBuf,
    table: String,
    field: String,
}

impl AccountingDateCacheCompositor {
    /// Compositor writing the cache to `path`, driven by the balance sheet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: balance_sheet::TABLE.to_string(),
            field: balance_sheet::CASH.to_string(),
        }
    }

    /// Drive the cache from another statement table and field.
    pub fn with_source(mut self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.table = table.into();
        self.field = field.into();
        self
    }

    /// Location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Statements of `id`, ordered by announcement date then report period.
    fn statements(&self, ctx: &CompositorContext<'_>, id: &str) -> Result<Vec<StatementRef>> {
        let df = ctx.store.read(
            &ReadRequest::new(self.table.as_str())
                .field(self.field.as_str())
                .ids([id]),
        )?;
        if df.height() == 0 || df.column(frame::REPORT_PERIOD).is_err() {
            return Ok(Vec::new());
        }

        let announced = frame::dates(&df, frame::DATE)?;
        let periods = frame::optional_dates(&df, frame::REPORT_PERIOD)?;
        let mut statements: Vec<StatementRef> = announced
            .into_iter()
            .zip(periods)
            .filter_map(|(announced, period)| Some(StatementRef::new(announced, period?)))
            .collect();
        statements.sort();
        Ok(statements)
    }

    /// New entries of one entity after `watermark`, with the entity's new watermark.
    ///
    /// An announcement mapping to the same trading date as the watermark rebuilds that
    /// date's entry from every statement known so far. Returns `None` when nothing was
    /// announced after the watermark.
    pub fn entity_delta(
        &self,
        ctx: &CompositorContext<'_>,
        id: &str,
        watermark: NaiveDate,
    ) -> Result<Option<EntityDelta>> {
        match ctx.store.latest_timestamp(&self.table, Some(id))? {
            Some(latest) if latest > watermark => {}
            _ => return Ok(None),
        }

        let statements = self.statements(ctx, id)?;
        let mut new_dates: Vec<NaiveDate> = statements
            .iter()
            .map(|s| s.announced)
            .filter(|date| *date > watermark)
            .collect();
        new_dates.dedup();
        let Some(last) = new_dates.last().copied() else {
            return Ok(None);
        };

        let mut entries = EntityEntries::new();
        for date in new_dates {
            let known = statements.partition_point(|s| s.announced <= date);
            if let Some(entry) = entry_for(&statements[..known]) {
                // Announcements on non-trading days take effect on the next trading date
                entries.insert(ctx.calendar.offset(date, 0)?, entry);
            }
        }

        let refreshed = if watermark > initial_watermark() {
            let key = ctx.calendar.offset(watermark, 0)?;
            entries.contains_key(&key).then_some(key)
        } else {
            None
        };
        Ok(Some(EntityDelta {
            watermark: last,
            entries,
            refreshed,
        }))
    }

    /// Compute the delta for every entity of the statement table.
    pub fn build_delta(
        &self,
        ctx: &CompositorContext<'_>,
        snapshot: &DateCacheSnapshot,
        summary: &mut UpdateSummary,
    ) -> Result<DateCacheDelta> {
        let mut delta = DateCacheDelta::default();
        for id in ctx.store.all_ids(&self.table)? {
            summary.processed += 1;
            match self.entity_delta(ctx, &id, snapshot.watermark(&id)) {
                Ok(Some(entity)) => {
                    debug!(
                        %id,
                        watermark = %entity.watermark,
                        entries = entity.entries.len(),
                        "new accounting dates"
                    );
                    if let Some(date) = entity.refreshed {
                        delta.refresh(&id, date);
                    }
                    delta.insert(&id, entity.watermark, entity.entries);
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(%id, error = %e, "skipping entity in date cache");
                    summary.skipped += 1;
                }
            }
        }
        Ok(delta)
    }
}

impl Compositor for AccountingDateCacheCompositor {
    fn name(&self) -> &str {
        "accounting_date_cache"
    }

    fn update(&self, ctx: &CompositorContext<'_>) -> Result<UpdateSummary> {
        let mut summary = UpdateSummary::new(self.name());
        let snapshot = DateCacheSnapshot::load(&self.path)?;
        let delta = self.build_delta(ctx, &snapshot, &mut summary)?;

        if delta.is_empty() {
            info!(%summary, "date cache already up to date");
            return Ok(summary);
        }

        let (merged, added) = snapshot.merge(delta);
        merged.save(&self.path)?;
        summary.rows_written = added;

        info!(%summary, path = %self.path.display(), "date cache updated");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn s(announced: NaiveDate, period: NaiveDate) -> StatementRef {
        StatementRef::new(announced, period)
    }

    #[test]
    fn test_entry_slots() {
        let known = vec![
            s(d(2018, 4, 20), d(2017, 12, 31)),
            s(d(2019, 8, 20), d(2019, 6, 30)),
            s(d(2020, 4, 20), d(2019, 12, 31)),
            s(d(2020, 4, 28), d(2020, 3, 31)),
            s(d(2020, 8, 28), d(2020, 6, 30)),
        ];

        let entry = entry_for(&known).unwrap();
        assert_eq!(entry.current, s(d(2020, 8, 28), d(2020, 6, 30)));
        assert_eq!(entry.q1, Some(s(d(2020, 4, 28), d(2020, 3, 31))));
        assert_eq!(entry.q2, Some(s(d(2020, 4, 20), d(2019, 12, 31))));
        assert_eq!(entry.yoy, Some(s(d(2019, 8, 20), d(2019, 6, 30))));
        assert_eq!(entry.y1, Some(s(d(2020, 4, 20), d(2019, 12, 31))));
        assert_eq!(entry.y3, Some(s(d(2018, 4, 20), d(2017, 12, 31))));
        assert_eq!(entry.y5, None);
    }

    #[test]
    fn test_restatement_wins() {
        let known = vec![
            s(d(2020, 4, 28), d(2020, 3, 31)),
            s(d(2020, 8, 28), d(2020, 3, 31)),
            s(d(2020, 8, 28), d(2020, 6, 30)),
        ];
        let entry = entry_for(&known).unwrap();
        assert_eq!(entry.q1, Some(s(d(2020, 8, 28), d(2020, 3, 31))));
        assert!(entry_for(&[]).is_none());
    }
}
