//! Sparsely updated factors.
//!
//! A compact table stores a row only when the value changes. The value on any date is
//! the one from the latest change on or before it.

use crate::error::Result;
use crate::factor::{Factor, FactorContext, FactorKind, FactorQuery};
use chrono::NaiveDate;
use hobart_data::{ReadRequest, frame};
use polars::prelude::DataFrame;
use std::collections::{BTreeMap, HashMap};

/// Change events of one entity, keyed by effective date.
pub type ChangeHistory = BTreeMap<NaiveDate, f64>;

/// Value in force on `date`.
pub fn as_of(history: &ChangeHistory, date: NaiveDate) -> Option<f64> {
    history.range(..=date).next_back().map(|(_, v)| *v)
}

/// A factor whose value holds until superseded.
#[derive(Debug, Clone)]
pub struct CompactFactor {
    name: String,
    table: String,
    field: String,
}

impl CompactFactor {
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

    /// Change events per entity up to and including `until`.
    pub fn histories(
        &self,
        ctx: &FactorContext<'_>,
        ids: Option<&[String]>,
        until: NaiveDate,
    ) -> Result<HashMap<String, ChangeHistory>> {
        let mut request = ReadRequest::new(&self.table)
            .field(&self.field)
            .between(None, Some(until));
        if let Some(ids) = ids {
            request = request.ids(ids.iter().cloned());
        }
        if request.is_trivially_empty() {
            return Ok(HashMap::new());
        }

        let panel = frame::panel(&ctx.store.read(&request)?, &self.field)?;
        let mut histories: HashMap<String, ChangeHistory> = HashMap::new();
        for ((date, id), value) in panel {
            histories.entry(id).or_default().insert(date, value);
        }
        Ok(histories)
    }
}

impl Factor for CompactFactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FactorKind {
        FactorKind::Compact
    }

    fn get_data(&self, ctx: &FactorContext<'_>, query: &FactorQuery) -> Result<DataFrame> {
        let dates = query.resolve_dates(ctx.calendar);
        let Some(last) = dates.last().copied() else {
            return Ok(frame::panel_frame(Vec::new())?);
        };

        let histories = self.histories(ctx, query.ids.as_deref(), last)?;
        let mut ids: Vec<&String> = histories.keys().collect();
        ids.sort();

        let mut points = Vec::new();
        for date in &dates {
            for id in &ids {
                if let Some(value) = as_of(&histories[*id], *date) {
                    points.push((*date, (*id).clone(), value));
                }
            }
        }
        Ok(frame::panel_frame(points)?)
    }
}
