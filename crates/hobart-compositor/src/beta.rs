//! Rolling beta of entity returns against a market return series.

use chrono::{Days, NaiveDate};
use hobart_data::frame;
use hobart_factors::{Factor, FactorContext, FactorError, FactorKind, FactorQuery, Result};
use ndarray::Array1;
use polars::prelude::DataFrame;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Default lookback in calendar days.
pub const DEFAULT_WINDOW_DAYS: u64 = 90;

/// Default minimum number of aligned observations.
pub const DEFAULT_MIN_OBSERVATIONS: usize = 3;

/// Slope of `y` regressed on `x` with an intercept.
///
/// `None` when the series are shorter than two points or `x` has no variance.
pub fn ols_slope(x: &Array1<f64>, y: &Array1<f64>) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let x_mean = x.mean()?;
    let y_mean = y.mean()?;
    let dx = x - x_mean;
    let dy = y - y_mean;
    let variance = dx.dot(&dx);
    if variance.abs() <= f64::EPSILON * x.len() as f64 {
        return None;
    }
    let slope = dx.dot(&dy) / variance;
    slope.is_finite().then_some(slope)
}

/// Beta of each entity against the market over a trailing calendar window.
///
/// The window of a date `t` is `[t - window_days, t)`: returns on `t` itself are
/// excluded. Entity and market returns are aligned on date.
#[derive(Debug)]
pub struct BetaCompositor {
    name: String,
    stock_returns: Box<dyn Factor>,
    market_returns: Box<dyn Factor>,
    market_id: String,
    window_days: u64,
    min_observations: usize,
}

impl BetaCompositor {
    /// Beta of `stock_returns` against the `market_id` series of `market_returns`.
    pub fn new(
        stock_returns: impl Factor + 'static,
        market_returns: impl Factor + 'static,
        market_id: impl Into<String>,
    ) -> Self {
        let market_id = market_id.into();
        Self {
            name: format!("beta_{market_id}"),
            stock_returns: Box::new(stock_returns),
            market_returns: Box::new(market_returns),
            market_id,
            window_days: DEFAULT_WINDOW_DAYS,
            min_observations: DEFAULT_MIN_OBSERVATIONS,
        }
    }

    /// Set the lookback in calendar days.
    pub const fn window_days(mut self, days: u64) -> Self {
        self.window_days = days;
        self
    }

    /// Set the minimum number of aligned observations.
    pub const fn min_observations(mut self, n: usize) -> Self {
        self.min_observations = n;
        self
    }

    fn window_start(&self, date: NaiveDate) -> NaiveDate {
        date.checked_sub_days(Days::new(self.window_days))
            .unwrap_or(NaiveDate::MIN)
    }

    /// Betas of `ids` on each of `dates` as a `date, id, value` frame.
    pub fn compute(
        &self,
        ctx: &FactorContext<'_>,
        ids: &[String],
        dates: &[NaiveDate],
    ) -> Result<DataFrame> {
        let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) else {
            return Ok(frame::panel_frame(Vec::new())?);
        };
        let history = FactorQuery::between(self.window_start(*first), *last);

        let market: BTreeMap<NaiveDate, f64> = frame::panel(
            &self.market_returns.get_data(
                ctx,
                &history.clone().ids([self.market_id.as_str()]),
            )?,
            frame::VALUE,
        )?
        .into_iter()
        .map(|((date, _), value)| (date, value))
        .collect();

        let mut stocks: HashMap<String, BTreeMap<NaiveDate, f64>> = HashMap::new();
        let stock_query = history.ids(ids.iter().cloned());
        for ((date, id), value) in
            frame::panel(&self.stock_returns.get_data(ctx, &stock_query)?, frame::VALUE)?
        {
            stocks.entry(id).or_default().insert(date, value);
        }

        let mut points = Vec::new();
        for date in dates {
            let window = self.window_start(*date)..*date;
            for id in ids {
                let Some(series) = stocks.get(id) else {
                    continue;
                };
                let (x, y): (Vec<f64>, Vec<f64>) = series
                    .range(window.clone())
                    .filter_map(|(day, ret)| Some((*market.get(day)?, *ret)))
                    .unzip();
                if x.len() < self.min_observations {
                    continue;
                }
                match ols_slope(&Array1::from(x), &Array1::from(y)) {
                    Some(beta) => points.push((*date, id.clone(), beta)),
                    None => debug!(%id, %date, "market returns have no variance"),
                }
            }
        }
        Ok(frame::panel_frame(points)?)
    }
}

impl Factor for BetaCompositor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FactorKind {
        FactorKind::Derived
    }

    fn get_data(&self, ctx: &FactorContext<'_>, query: &FactorQuery) -> Result<DataFrame> {
        let ids = query.ids.as_deref().ok_or_else(|| {
            FactorError::InvalidQuery(format!("{} needs explicit ids", self.name))
        })?;
        self.compute(ctx, ids, &query.resolve_dates(ctx.calendar))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ols_slope() {
        let x = Array1::from(vec![0.01, -0.02, 0.03, 0.0]);
        let y = &x * 1.5 + 0.002;
        assert_relative_eq!(ols_slope(&x, &y).unwrap(), 1.5, epsilon = 1e-10);
    }

    #[test]
    fn test_flat_market_has_no_slope() {
        let x = Array1::from(vec![0.01, 0.01, 0.01]);
        let y = Array1::from(vec![0.02, -0.01, 0.03]);
        assert_eq!(ols_slope(&x, &y), None);
        assert_eq!(ols_slope(&Array1::from(vec![0.1]), &Array1::from(vec![0.2])), None);
    }
}
