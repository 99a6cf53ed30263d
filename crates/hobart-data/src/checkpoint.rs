//! Explicit resume points per logical stream.
//!
//! A stream is one derived series, or one slice of it (a single index of the shared
//! custom index table). Checkpoints only move forward.

use crate::error::Result;
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Persisted "last processed date" per stream.
pub trait CheckpointStore {
    /// Last processed date of `stream`, if any.
    fn load_checkpoint(&self, stream: &str) -> Result<Option<NaiveDate>>;

    /// Record `date` as processed. Earlier dates than the stored one are ignored.
    fn save_checkpoint(&self, stream: &str, date: NaiveDate) -> Result<()>;
}

/// In-memory checkpoints for callers that don't persist progress.
#[derive(Debug, Default)]
pub struct MemoryCheckpoints {
    streams: RefCell<BTreeMap<String, NaiveDate>>,
}

impl MemoryCheckpoints {
    /// Empty checkpoint set.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpoints {
    fn load_checkpoint(&self, stream: &str) -> Result<Option<NaiveDate>> {
        Ok(self.streams.borrow().get(stream).copied())
    }

    fn save_checkpoint(&self, stream: &str, date: NaiveDate) -> Result<()> {
        let mut streams = self.streams.borrow_mut();
        let entry = streams.entry(stream.to_string()).or_insert(date);
        if date > *entry {
            *entry = date;
        }
        Ok(())
    }
}
