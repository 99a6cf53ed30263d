//! One-price limit boards.
//!
//! A stock whose high equals its low on a day it was not suspended traded at a single
//! price all day. Compared with the previous adjusted close that price was either a
//! limit-up or a limit-down board.

use crate::compositor::{Compositor, CompositorContext, UpdateSummary};
use crate::error::Result;
use chrono::NaiveDate;
use derive_more::Display;
use hobart_data::tables::{adj_factor, limit_moves, stock_daily};
use hobart_data::{ReadRequest, Record, frame};
use hobart_factors::{CompactFactor, Factor, FactorQuery, SuspendedTickers, TickerSelector};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Relative tolerance under which two adjusted prices are considered equal.
const PRICE_TOLERANCE: f64 = 1e-9;

/// Direction of a limit board.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum LimitMove {
    /// Locked at the upper limit
    #[display("limit-up")]
    Up,
    /// Locked at the lower limit
    #[display("limit-down")]
    Down,
}

impl LimitMove {
    /// Compare today's adjusted price with the previous adjusted close.
    ///
    /// Returns `None` when the two are equal within a relative tolerance.
    pub fn classify(price: f64, previous: f64) -> Option<Self> {
        let scale = price.abs().max(previous.abs()).max(f64::MIN_POSITIVE);
        if (price - previous).abs() <= PRICE_TOLERANCE * scale {
            None
        } else if price > previous {
            Some(Self::Up)
        } else {
            Some(Self::Down)
        }
    }
}

fn same_price(a: f64, b: f64) -> bool {
    LimitMove::classify(a, b).is_none()
}

/// Detects limit boards and stores them in the `limit_moves` table.
#[derive(Debug, Clone)]
pub struct LimitMoveCompositor {
    default_start: NaiveDate,
}

impl Default for LimitMoveCompositor {
    fn default() -> Self {
        Self::new(NaiveDate::from_ymd_opt(1999, 5, 4).unwrap_or(NaiveDate::MIN))
    }
}

impl LimitMoveCompositor {
    /// Compositor that starts at `default_start` on its first run.
    pub const fn new(default_start: NaiveDate) -> Self {
        Self { default_start }
    }

    /// Limit boards on `date` against the previous trading date `prev`.
    pub fn detect(
        &self,
        ctx: &CompositorContext<'_>,
        prev: NaiveDate,
        date: NaiveDate,
    ) -> Result<BTreeMap<String, LimitMove>> {
        let quotes = ctx.store.read(
            &ReadRequest::new(stock_daily::TABLE)
                .fields([stock_daily::HIGH, stock_daily::LOW])
                .on_dates([date]),
        )?;
        let highs = frame::values_by_id(&quotes, stock_daily::HIGH)?;
        let lows = frame::values_by_id(&quotes, stock_daily::LOW)?;

        let suspended: HashSet<String> = SuspendedTickers
            .tickers(&ctx.factors(), date)?
            .into_iter()
            .collect();
        let boards: BTreeMap<String, f64> = highs
            .into_iter()
            .filter(|(id, high)| lows.get(id).is_some_and(|low| same_price(*high, *low)))
            .filter(|(id, _)| !suspended.contains(id))
            .collect();
        if boards.is_empty() {
            return Ok(BTreeMap::new());
        }

        let ids: Vec<String> = boards.keys().cloned().collect();
        let previous = ctx.store.read(
            &ReadRequest::new(stock_daily::TABLE)
                .field(stock_daily::CLOSE)
                .on_dates([prev])
                .ids(ids.iter().cloned()),
        )?;
        let prev_close = frame::values_by_id(&previous, stock_daily::CLOSE)?;

        let adj = CompactFactor::new(adj_factor::TABLE, adj_factor::ADJ_FACTOR).get_data(
            &ctx.factors(),
            &FactorQuery::on([prev, date]).ids(ids.iter().cloned()),
        )?;
        let adj = frame::panel(&adj, frame::VALUE)?;

        let mut moves = BTreeMap::new();
        for (id, high) in boards {
            let Some(close) = prev_close.get(&id) else {
                debug!(%id, %date, "no previous close, skipping");
                continue;
            };
            // Stocks without any adjustment history trade unadjusted
            let (today, before) = match (
                adj.get(&(date, id.clone())).copied(),
                adj.get(&(prev, id.clone())).copied(),
            ) {
                (Some(today), Some(before)) => (today, before),
                (None, None) => (1.0, 1.0),
                _ => {
                    warn!(%id, %date, "adjustment factor missing on one of two days, skipping");
                    continue;
                }
            };
            let price = high * today;
            let previous = close * before;
            if let Some(label) = LimitMove::classify(price, previous) {
                moves.insert(id, label);
            }
        }
        Ok(moves)
    }
}

impl Compositor for LimitMoveCompositor {
    fn name(&self) -> &str {
        limit_moves::TABLE
    }

    fn update(&self, ctx: &CompositorContext<'_>) -> Result<UpdateSummary> {
        let mut summary = UpdateSummary::new(self.name());
        let watermark = ctx.watermark(limit_moves::TABLE, limit_moves::TABLE, None)?;
        summary.resumed_from = watermark;

        let Some(end) = ctx.store.latest_timestamp(stock_daily::TABLE, None)? else {
            info!("no stock quotes, nothing to detect");
            return Ok(summary);
        };

        for date in ctx.pending_dates(watermark, self.default_start, end) {
            // The first calendar date has nothing to compare against
            if let Ok(prev) = ctx.calendar.offset(date, -1) {
                let moves = match self.detect(ctx, prev, date) {
                    Ok(moves) => moves,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(%date, error = %e, "skipping date");
                        summary.skipped += 1;
                        BTreeMap::new()
                    }
                };
                let records: Vec<Record> = moves
                    .iter()
                    .map(|(id, label)| {
                        Record::new(date, id.as_str(), limit_moves::LIMIT_MOVE, label.to_string())
                    })
                    .collect();
                summary.rows_written += ctx.store.upsert(limit_moves::TABLE, &records)?;
                debug!(%date, boards = records.len(), "limit moves detected");
            }
            ctx.checkpoints.save_checkpoint(limit_moves::TABLE, date)?;
            summary.processed += 1;
        }

        info!(%summary, "limit moves updated");
        Ok(summary)
    }
}
