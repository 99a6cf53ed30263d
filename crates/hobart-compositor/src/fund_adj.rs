//! Fund adjustment factors.
//!
//! Each fund starts at 1.0 on its listing date. A distribution `d` paid on a unit priced
//! `p` multiplies the factor by `p / (p - d)`, effective from the next trading date.

use crate::compositor::{Compositor, CompositorContext, UpdateSummary};
use crate::error::{CompositorError, Result};
use chrono::NaiveDate;
use hobart_data::tables::{adj_factor, fund_dividend};
use hobart_data::{ReadRequest, Record, frame};
use hobart_factors::{FundTicker, FundUniverse};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Builds cumulative adjustment factors for every listed fund.
#[derive(Debug, Clone, Copy, Default)]
pub struct FundAdjFactorCompositor;

impl FundAdjFactorCompositor {
    /// All adjustment-factor rows of one fund, seed row first.
    ///
    /// Fails without producing any row when prices and distributions do not line up.
    pub fn compute(&self, ctx: &CompositorContext<'_>, fund: &FundTicker) -> Result<Vec<Record>> {
        let seed = Record::new(fund.list_date, fund.ticker.as_str(), adj_factor::ADJ_FACTOR, 1.0);

        let dividends = frame::panel(
            &ctx.store.read(
                &ReadRequest::new(fund_dividend::TABLE)
                    .field(fund_dividend::DIVIDEND)
                    .ids([fund.ticker.as_str()]),
            )?,
            fund_dividend::DIVIDEND,
        )?;
        if dividends.is_empty() {
            return Ok(vec![seed]);
        }
        let events: Vec<(NaiveDate, f64)> = dividends
            .into_iter()
            .map(|((date, _), dividend)| (date, dividend))
            .collect();

        let (table, field) = fund.kind.price_source();
        let prices = frame::panel(
            &ctx.store.read(
                &ReadRequest::new(table)
                    .field(field)
                    .on_dates(events.iter().map(|(date, _)| *date))
                    .ids([fund.ticker.as_str()]),
            )?,
            field,
        )?;
        if prices.len() != events.len() {
            return Err(CompositorError::incomplete(
                fund.ticker.as_str(),
                format!("{} prices for {} distributions", prices.len(), events.len()),
            ));
        }

        let mut records = vec![seed];
        let mut cumulative = 1.0;
        for (date, dividend) in events {
            let price = prices
                .get(&(date, fund.ticker.clone()))
                .copied()
                .ok_or_else(|| {
                    CompositorError::incomplete(fund.ticker.as_str(), format!("no price on {date}"))
                })?;
            if price <= dividend {
                return Err(CompositorError::incomplete(
                    fund.ticker.as_str(),
                    format!("distribution {dividend} on {date} is not below price {price}"),
                ));
            }
            cumulative *= price / (price - dividend);
            let effective = ctx.calendar.offset(date, 1)?;
            records.push(Record::new(
                effective,
                fund.ticker.as_str(),
                adj_factor::ADJ_FACTOR,
                cumulative,
            ));
        }
        Ok(records)
    }

    /// Drop rows already stored with the same value.
    fn unchanged_removed(
        ctx: &CompositorContext<'_>,
        ticker: &str,
        records: Vec<Record>,
    ) -> Result<Vec<Record>> {
        let stored: BTreeMap<NaiveDate, f64> = frame::panel(
            &ctx.store.read(
                &ReadRequest::new(adj_factor::TABLE)
                    .field(adj_factor::ADJ_FACTOR)
                    .ids([ticker]),
            )?,
            adj_factor::ADJ_FACTOR,
        )?
        .into_iter()
        .map(|((date, _), value)| (date, value))
        .collect();

        Ok(records
            .into_iter()
            .filter(|r| match (stored.get(&r.date), r.value.as_f64()) {
                (Some(old), Some(new)) => (old - new).abs() > 1e-12 * old.abs().max(1.0),
                _ => true,
            })
            .collect())
    }
}

impl Compositor for FundAdjFactorCompositor {
    fn name(&self) -> &str {
        "fund_adj_factor"
    }

    fn update(&self, ctx: &CompositorContext<'_>) -> Result<UpdateSummary> {
        let mut summary = UpdateSummary::new(self.name());
        let universe = FundUniverse::load(ctx.store)?;

        for fund in universe.iter() {
            summary.processed += 1;
            let records = match self.compute(ctx, fund) {
                Ok(records) => records,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(ticker = %fund.ticker, kind = %fund.kind, error = %e, "skipping fund");
                    summary.skipped += 1;
                    continue;
                }
            };

            let changed = Self::unchanged_removed(ctx, &fund.ticker, records)?;
            if !changed.is_empty() {
                debug!(ticker = %fund.ticker, rows = changed.len(), "writing fund adjustment factors");
                summary.rows_written += ctx.store.upsert(adj_factor::TABLE, &changed)?;
            }
        }

        info!(%summary, "fund adjustment factors updated");
        Ok(summary)
    }
}
