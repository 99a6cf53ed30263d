//! Custom index returns.
//!
//! A custom index holds every stock selected by its policy, weighted by the previous
//! day's market value of a unit-holding factor (free-float shares by default).

use crate::compositor::{Compositor, CompositorContext, UpdateSummary};
use crate::error::Result;
use chrono::NaiveDate;
use hobart_data::tables::{adj_factor, custom_index, free_float_shares, stock_daily};
use hobart_data::{ReadRequest, Record, frame};
use hobart_factors::{
    CompactFactor, Factor, FactorQuery, StockSelectionPolicy, StockTickerSelector, TickerSelector,
};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Definition of a custom index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexCompositionPolicy {
    /// Index ticker, the id its returns are stored under
    pub ticker: String,
    /// Display name
    pub name: String,
    /// First date computed on the initial run
    pub start_date: NaiveDate,
    /// Compact table holding the units each constituent contributes
    #[serde(default = "default_unit_table")]
    pub unit_table: String,
    /// Field of the unit table
    #[serde(default = "default_unit_field")]
    pub unit_field: String,
    /// Constituent selection
    #[serde(default)]
    pub stock_selection: StockSelectionPolicy,
}

fn default_unit_table() -> String {
    free_float_shares::TABLE.to_string()
}

fn default_unit_field() -> String {
    free_float_shares::SHARES.to_string()
}

impl IndexCompositionPolicy {
    /// Policy weighting by free-float shares with the default stock selection.
    pub fn new(ticker: impl Into<String>, name: impl Into<String>, start_date: NaiveDate) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
            start_date,
            unit_table: default_unit_table(),
            unit_field: default_unit_field(),
            stock_selection: StockSelectionPolicy::default(),
        }
    }
}

/// Inputs of one constituent for one date.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Constituent {
    close: f64,
    adj: f64,
    prev_close: f64,
    prev_adj: f64,
    prev_units: f64,
}

impl Constituent {
    fn daily_return(&self) -> f64 {
        (self.close * self.adj) / (self.prev_close * self.prev_adj) - 1.0
    }

    fn market_value(&self) -> f64 {
        self.prev_units * self.prev_close
    }
}

/// Value-weighted return of constituents; `None` without positive total weight.
fn weighted_return(constituents: &[Constituent]) -> Option<f64> {
    let returns: Array1<f64> = constituents.iter().map(Constituent::daily_return).collect();
    let values: Array1<f64> = constituents.iter().map(Constituent::market_value).collect();
    let total = values.sum();
    if total.is_nan() || total <= 0.0 {
        return None;
    }
    let ret = returns.dot(&(values / total));
    ret.is_finite().then_some(ret)
}

/// Computes daily returns of one custom index into the `custom_index` table.
#[derive(Debug)]
pub struct IndexCompositor {
    policy: IndexCompositionPolicy,
    selector: StockTickerSelector,
    units: CompactFactor,
    stream: String,
}

impl IndexCompositor {
    /// Compositor for one index.
    pub fn new(policy: IndexCompositionPolicy) -> Self {
        Self {
            selector: StockTickerSelector::new(policy.stock_selection.clone()),
            units: CompactFactor::new(policy.unit_table.as_str(), policy.unit_field.as_str()),
            stream: format!("{}:{}", custom_index::TABLE, policy.ticker),
            policy,
        }
    }

    /// The index definition.
    pub const fn policy(&self) -> &IndexCompositionPolicy {
        &self.policy
    }

    /// Checkpoint stream of this index.
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Index return on `date`, or `None` when no constituent has complete inputs.
    pub fn compute_return(
        &self,
        ctx: &CompositorContext<'_>,
        date: NaiveDate,
    ) -> Result<Option<f64>> {
        let prev = ctx.calendar.offset(date, -1)?;
        let factors = ctx.factors();
        let ids = self.selector.tickers(&factors, date)?;
        if ids.is_empty() {
            return Ok(None);
        }

        let close = frame::panel(
            &ctx.store.read(
                &ReadRequest::new(stock_daily::TABLE)
                    .field(stock_daily::CLOSE)
                    .on_dates([prev, date])
                    .ids(ids.iter().cloned()),
            )?,
            stock_daily::CLOSE,
        )?;
        let query = FactorQuery::on([prev, date]).ids(ids.iter().cloned());
        let adjustment = CompactFactor::new(adj_factor::TABLE, adj_factor::ADJ_FACTOR);
        let adj = frame::panel(&adjustment.get_data(&factors, &query)?, frame::VALUE)?;
        let units = frame::panel(
            &self
                .units
                .get_data(&factors, &FactorQuery::on_date(prev).ids(ids.iter().cloned()))?,
            frame::VALUE,
        )?;

        let lookup = |map: &BTreeMap<(NaiveDate, String), f64>, day: NaiveDate, id: &String| {
            map.get(&(day, id.clone())).copied()
        };
        let constituents: Vec<Constituent> = ids
            .iter()
            .filter_map(|id| {
                Some(Constituent {
                    close: lookup(&close, date, id)?,
                    adj: lookup(&adj, date, id)?,
                    prev_close: lookup(&close, prev, id)?,
                    prev_adj: lookup(&adj, prev, id)?,
                    prev_units: lookup(&units, prev, id)?,
                })
            })
            .collect();

        debug!(
            index = %self.policy.ticker,
            %date,
            selected = ids.len(),
            complete = constituents.len(),
            "index constituents"
        );
        Ok(weighted_return(&constituents))
    }
}

impl Compositor for IndexCompositor {
    fn name(&self) -> &str {
        &self.stream
    }

    fn update(&self, ctx: &CompositorContext<'_>) -> Result<UpdateSummary> {
        let mut summary = UpdateSummary::new(self.name());
        let ticker = self.policy.ticker.as_str();
        let watermark = ctx.watermark(&self.stream, custom_index::TABLE, Some(ticker))?;
        summary.resumed_from = watermark;

        let Some(end) = ctx.store.latest_timestamp(stock_daily::TABLE, None)? else {
            info!(index = ticker, "no stock quotes, nothing to compose");
            return Ok(summary);
        };

        for date in ctx.pending_dates(watermark, self.policy.start_date, end) {
            match self.compute_return(ctx, date) {
                Ok(Some(ret)) => {
                    let record = Record::new(date, ticker, custom_index::RETURN, ret);
                    summary.rows_written += ctx.store.upsert(custom_index::TABLE, &[record])?;
                }
                Ok(None) => {
                    debug!(index = ticker, %date, "no usable constituents");
                    summary.skipped += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(index = ticker, %date, error = %e, "skipping date");
                    summary.skipped += 1;
                }
            }
            ctx.checkpoints.save_checkpoint(&self.stream, date)?;
            summary.processed += 1;
        }

        info!(%summary, name = %self.policy.name, "custom index updated");
        Ok(summary)
    }
}
