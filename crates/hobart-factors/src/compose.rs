//! Factor combinators.
//!
//! Combinators build a tree that is evaluated lazily on [`Factor::get_data`]. Binary
//! operations align their operands on (date, id) by inner join and evaluate the left
//! operand first. Results that are not finite, such as a division by zero, are dropped.

use crate::error::Result;
use crate::factor::{DateSelection, Factor, FactorContext, FactorKind, FactorQuery};
use chrono::NaiveDate;
use derive_more::Display;
use hobart_data::frame::{self, DATE, ID, VALUE};
use polars::prelude::*;

const RHS: &str = "rhs";

/// Arithmetic on two operands.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Sum
    #[display("+")]
    Add,
    /// Difference
    #[display("-")]
    Sub,
    /// Product
    #[display("*")]
    Mul,
    /// Quotient
    #[display("/")]
    Div,
}

impl BinaryOp {
    fn expr(self, lhs: Expr, rhs: Expr) -> Expr {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
        }
    }

    /// Apply to two numbers.
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div => lhs / rhs,
        }
    }
}

fn finish(lf: LazyFrame) -> Result<DataFrame> {
    Ok(lf
        .select([col(DATE), col(ID), col(VALUE)])
        .drop_nulls(None)
        .filter(col(VALUE).is_finite())
        .sort([DATE, ID], Default::default())
        .collect()?)
}

/// Query extended backwards by `lookback` trading dates, as a trading-date range.
fn extended_query(
    ctx: &FactorContext<'_>,
    query: &FactorQuery,
    dates: &[NaiveDate],
    lookback: i64,
) -> Option<FactorQuery> {
    let (first, last) = (dates.first()?, dates.last()?);
    // Near the start of the calendar there is nothing to look back on
    let start = ctx.calendar.offset(*first, -lookback).unwrap_or(*first);
    Some(query.with_dates(DateSelection::Range { start, end: *last }))
}

/// Two factors combined element-wise.
#[derive(Debug)]
pub struct ComposedFactor {
    name: String,
    lhs: Box<dyn Factor>,
    rhs: Box<dyn Factor>,
    op: BinaryOp,
}

impl ComposedFactor {
    /// Combine `lhs op rhs`.
    pub fn new(lhs: Box<dyn Factor>, rhs: Box<dyn Factor>, op: BinaryOp) -> Self {
        let name = format!("({} {op} {})", lhs.name(), rhs.name());
        Self { name, lhs, rhs, op }
    }
}

impl Factor for ComposedFactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FactorKind {
        FactorKind::Derived
    }

    fn get_data(&self, ctx: &FactorContext<'_>, query: &FactorQuery) -> Result<DataFrame> {
        let lhs = self.lhs.get_data(ctx, query)?;
        let rhs = self
            .rhs
            .get_data(ctx, query)?
            .lazy()
            .select([col(DATE), col(ID), col(VALUE).alias(RHS)]);

        let joined = lhs
            .lazy()
            .join(
                rhs,
                [col(DATE), col(ID)],
                [col(DATE), col(ID)],
                JoinArgs::new(JoinType::Inner),
            )
            .with_column(self.op.expr(col(VALUE), col(RHS)).alias(VALUE));
        finish(joined)
    }
}

/// A factor combined with a constant, `factor op scalar`.
#[derive(Debug)]
pub struct ScalarFactor {
    name: String,
    inner: Box<dyn Factor>,
    op: BinaryOp,
    scalar: f64,
}

impl ScalarFactor {
    /// Combine `inner op scalar`.
    pub fn new(inner: Box<dyn Factor>, op: BinaryOp, scalar: f64) -> Self {
        let name = format!("({} {op} {scalar})", inner.name());
        Self {
            name,
            inner,
            op,
            scalar,
        }
    }
}

impl Factor for ScalarFactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FactorKind {
        FactorKind::Derived
    }

    fn get_data(&self, ctx: &FactorContext<'_>, query: &FactorQuery) -> Result<DataFrame> {
        let lf = self
            .inner
            .get_data(ctx, query)?
            .lazy()
            .with_column(self.op.expr(col(VALUE), lit(self.scalar)).alias(VALUE));
        finish(lf)
    }
}

/// Relative change against the observation `periods` rows earlier for the same entity.
#[derive(Debug)]
pub struct PctChangeFactor {
    name: String,
    inner: Box<dyn Factor>,
    periods: usize,
}

impl PctChangeFactor {
    /// Percent change over `periods` observations.
    pub fn new(inner: Box<dyn Factor>, periods: usize) -> Self {
        let name = format!("pct_change({}, {periods})", inner.name());
        Self {
            name,
            inner,
            periods: periods.max(1),
        }
    }
}

impl Factor for PctChangeFactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FactorKind {
        FactorKind::Derived
    }

    fn get_data(&self, ctx: &FactorContext<'_>, query: &FactorQuery) -> Result<DataFrame> {
        let dates = query.resolve_dates(ctx.calendar);
        let periods = self.periods as i64;
        let Some(extended) = extended_query(ctx, query, &dates, periods) else {
            return Ok(frame::panel_frame(Vec::new())?);
        };

        let changed = self
            .inner
            .get_data(ctx, &extended)?
            .lazy()
            .sort([ID, DATE], Default::default())
            .with_column(
                (col(VALUE) / col(VALUE).shift(lit(periods)).over([col(ID)]) - lit(1.0))
                    .alias(VALUE),
            )
            .collect()?;

        finish(frame::restrict_dates(&changed, &dates)?.lazy())
    }
}

/// Maximum over a trailing window of observations per entity.
#[derive(Debug)]
pub struct RollingMaxFactor {
    name: String,
    inner: Box<dyn Factor>,
    window: usize,
}

impl RollingMaxFactor {
    /// Rolling maximum over `window` observations, the current one included.
    pub fn new(inner: Box<dyn Factor>, window: usize) -> Self {
        let name = format!("rolling_max({}, {window})", inner.name());
        Self {
            name,
            inner,
            window: window.max(1),
        }
    }
}

impl Factor for RollingMaxFactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FactorKind {
        FactorKind::Derived
    }

    fn get_data(&self, ctx: &FactorContext<'_>, query: &FactorQuery) -> Result<DataFrame> {
        let dates = query.resolve_dates(ctx.calendar);
        let Some(extended) = extended_query(ctx, query, &dates, self.window as i64 - 1) else {
            return Ok(frame::panel_frame(Vec::new())?);
        };

        let rolled = self
            .inner
            .get_data(ctx, &extended)?
            .lazy()
            .sort([ID, DATE], Default::default())
            .with_column(
                col(VALUE)
                    .rolling_max(RollingOptionsFixedWindow {
                        window_size: self.window,
                        min_periods: 1,
                        ..Default::default()
                    })
                    .over([col(ID)])
                    .alias(VALUE),
            )
            .collect()?;

        finish(frame::restrict_dates(&rolled, &dates)?.lazy())
    }
}

/// Combinator methods for every factor.
pub trait FactorExt: Factor + Sized + 'static {
    /// Combine element-wise with another factor.
    fn compose<F: Factor + 'static>(self, other: F, op: BinaryOp) -> ComposedFactor {
        ComposedFactor::new(Box::new(self), Box::new(other), op)
    }

    /// `self + other`
    fn add<F: Factor + 'static>(self, other: F) -> ComposedFactor {
        self.compose(other, BinaryOp::Add)
    }

    /// `self - other`
    fn sub<F: Factor + 'static>(self, other: F) -> ComposedFactor {
        self.compose(other, BinaryOp::Sub)
    }

    /// `self * other`
    fn mul<F: Factor + 'static>(self, other: F) -> ComposedFactor {
        self.compose(other, BinaryOp::Mul)
    }

    /// `self / other`
    fn div<F: Factor + 'static>(self, other: F) -> ComposedFactor {
        self.compose(other, BinaryOp::Div)
    }

    /// Combine with a constant.
    fn scalar(self, op: BinaryOp, value: f64) -> ScalarFactor {
        ScalarFactor::new(Box::new(self), op, value)
    }

    /// Percent change over `periods` observations.
    fn pct_change(self, periods: usize) -> PctChangeFactor {
        PctChangeFactor::new(Box::new(self), periods)
    }

    /// Trailing maximum over `window` observations.
    fn rolling_max(self, window: usize) -> RollingMaxFactor {
        RollingMaxFactor::new(Box::new(self), window)
    }
}

impl<F: Factor + 'static> FactorExt for F {}
