//! Ordered execution of every compositor.

use crate::config::{BetaSettings, HobartConfig};
use hobart_compositor::{
    AccountingDateCacheCompositor, BetaCompositor, Compositor, CompositorContext,
    FundAdjFactorCompositor, IndexCompositor, LimitMoveCompositor, Result, UpdateSummary,
};
use hobart_data::tables::{adj_factor, custom_index, stock_daily};
use hobart_factors::{CompactFactor, ContinuousFactor, FactorExt};
use tracing::{error, info};

/// The compositors of one configuration, in run order.
#[derive(Debug)]
pub struct Pipeline {
    limit_moves: LimitMoveCompositor,
    fund_adj: FundAdjFactorCompositor,
    indexes: Vec<IndexCompositor>,
    date_cache: AccountingDateCacheCompositor,
}

impl Pipeline {
    /// Build the pipeline described by `config`.
    pub fn new(config: &HobartConfig) -> Self {
        Self {
            limit_moves: LimitMoveCompositor::new(config.limit_move_start),
            fund_adj: FundAdjFactorCompositor,
            indexes: config.indexes.iter().cloned().map(IndexCompositor::new).collect(),
            date_cache: AccountingDateCacheCompositor::new(&config.date_cache),
        }
    }

    /// Compositors in run order: limit moves, fund adjustment factors, every custom
    /// index, then the date cache.
    pub fn compositors(&self) -> Vec<&dyn Compositor> {
        let mut steps: Vec<&dyn Compositor> =
            vec![&self.limit_moves as &dyn Compositor, &self.fund_adj as &dyn Compositor];
        steps.extend(self.indexes.iter().map(|index| index as &dyn Compositor));
        steps.push(&self.date_cache);
        steps
    }

    /// Run every compositor.
    pub fn run(&self, ctx: &CompositorContext<'_>) -> Result<Vec<UpdateSummary>> {
        self.run_with(ctx, |_| {})
    }

    /// Run every compositor, calling `on_step` with each name before it starts.
    ///
    /// The first error aborts the remaining steps; compositors already run keep what
    /// they wrote.
    pub fn run_with(
        &self,
        ctx: &CompositorContext<'_>,
        mut on_step: impl FnMut(&str),
    ) -> Result<Vec<UpdateSummary>> {
        let mut summaries = Vec::new();
        for step in self.compositors() {
            on_step(step.name());
            match step.update(ctx) {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    error!(compositor = step.name(), error = %e, "aborting pipeline");
                    return Err(e);
                }
            }
        }

        let rows: usize = summaries.iter().map(|s| s.rows_written).sum();
        info!(steps = summaries.len(), rows, "pipeline finished");
        Ok(summaries)
    }
}

/// Beta of adjusted daily stock returns against the configured market series.
pub fn beta_compositor(settings: &BetaSettings) -> BetaCompositor {
    let adjusted_close = ContinuousFactor::new(stock_daily::TABLE, stock_daily::CLOSE)
        .mul(CompactFactor::new(adj_factor::TABLE, adj_factor::ADJ_FACTOR));
    BetaCompositor::new(
        adjusted_close.pct_change(1),
        ContinuousFactor::new(custom_index::TABLE, custom_index::RETURN),
        settings.market_id.as_str(),
    )
    .window_days(settings.window_days)
    .min_observations(settings.min_observations)
}
