//! Accounting-date cache.
//!
//! For every entity and every trading date on which a new statement became known, the
//! cache records which statements a factor needs to compare against: the current one,
//! the two preceding quarters, the same period a year earlier and the annual reports
//! one, three and five years back.
//!
//! The cache is an immutable [`DateCacheSnapshot`] loaded at the start of a run plus a
//! [`DateCacheDelta`] computed during it. Merging never replaces an existing entry,
//! except the one keyed on the trading date of an entity's watermark: announcements on
//! consecutive non-trading days share that key and the later run sees more statements.

mod builder;
mod persist;

pub use builder::{AccountingDateCacheCompositor, EntityDelta};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Watermark of an entity that has never been cached.
pub fn initial_watermark() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// A statement identified by when it was announced and which period it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatementRef {
    /// Announcement date
    pub announced: NaiveDate,
    /// Report period
    pub period: NaiveDate,
}

impl StatementRef {
    /// Create a statement reference.
    pub const fn new(announced: NaiveDate, period: NaiveDate) -> Self {
        Self { announced, period }
    }
}

/// Statements relevant on one as-of date.
///
/// `current` is the newest statement known on the date; every other slot is `None`
/// when no statement for that period had been announced yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCacheEntry {
    /// Newest statement
    pub current: StatementRef,
    /// Previous quarter
    pub q1: Option<StatementRef>,
    /// Two quarters back
    pub q2: Option<StatementRef>,
    /// Same period one year earlier
    pub yoy: Option<StatementRef>,
    /// Previous annual report
    pub y1: Option<StatementRef>,
    /// Annual report three years back
    pub y3: Option<StatementRef>,
    /// Annual report five years back
    pub y5: Option<StatementRef>,
}

/// Cache entries of one entity, keyed by trading date.
pub type EntityEntries = BTreeMap<NaiveDate, DateCacheEntry>;

/// Persisted cache state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCacheSnapshot {
    /// Last announcement date processed per entity
    pub watermarks: BTreeMap<String, NaiveDate>,
    /// Entries per entity
    pub entries: BTreeMap<String, EntityEntries>,
}

impl DateCacheSnapshot {
    /// Watermark of `id`, or the initial watermark when the entity is unknown.
    pub fn watermark(&self, id: &str) -> NaiveDate {
        self.watermarks
            .get(id)
            .copied()
            .unwrap_or_else(initial_watermark)
    }

    /// Entry in force on `as_of`: the one with the greatest date not after it.
    pub fn resolve(&self, id: &str, as_of: NaiveDate) -> Option<(NaiveDate, &DateCacheEntry)> {
        self.entries
            .get(id)?
            .range(..=as_of)
            .next_back()
            .map(|(date, entry)| (*date, entry))
    }

    /// Entry stored exactly on `date`.
    pub fn entry(&self, id: &str, date: NaiveDate) -> Option<&DateCacheEntry> {
        self.entries.get(id)?.get(&date)
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Whether the cache holds no entry.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(BTreeMap::is_empty)
    }

    /// Merge a delta into a new snapshot.
    ///
    /// Entries already present are kept as they are unless the delta marks them as
    /// refreshed; watermarks only move forward. Returns the number of entries written.
    pub fn merge(mut self, delta: DateCacheDelta) -> (Self, usize) {
        let mut added = 0;
        for (id, entries) in delta.entries {
            let refreshed = delta.refreshed.get(&id).copied();
            let existing = self.entries.entry(id.clone()).or_default();
            for (date, entry) in entries {
                if refreshed == Some(date) {
                    if existing.insert(date, entry) != Some(entry) {
                        added += 1;
                    }
                    continue;
                }
                if existing.contains_key(&date) {
                    warn!(%id, %date, "date cache entry already present, keeping the stored one");
                    continue;
                }
                existing.insert(date, entry);
                added += 1;
            }
        }
        for (id, watermark) in delta.watermarks {
            let current = self.watermarks.entry(id).or_insert(watermark);
            if watermark > *current {
                *current = watermark;
            }
        }
        self.entries.retain(|_, entries| !entries.is_empty());
        (self, added)
    }
}

/// Entries and watermarks computed in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateCacheDelta {
    /// New watermarks per entity
    pub watermarks: BTreeMap<String, NaiveDate>,
    /// New entries per entity
    pub entries: BTreeMap<String, EntityEntries>,
    /// Per entity, the one date whose stored entry the new one replaces
    pub refreshed: BTreeMap<String, NaiveDate>,
}

impl DateCacheDelta {
    /// Record the new entries and watermark of one entity.
    pub fn insert(&mut self, id: &str, watermark: NaiveDate, entries: EntityEntries) {
        self.watermarks.insert(id.to_string(), watermark);
        if !entries.is_empty() {
            self.entries.insert(id.to_string(), entries);
        }
    }

    /// Let the entry of `id` on `date` replace the stored one when merged.
    pub fn refresh(&mut self, id: &str, date: NaiveDate) {
        self.refreshed.insert(id.to_string(), date);
    }

    /// Number of new entries.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// Whether the delta holds nothing.
    pub fn is_empty(&self) -> bool {
        self.watermarks.is_empty() && self.entries.is_empty()
    }
}
