#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod compact;
pub mod compose;
pub mod continuous;
pub mod error;
pub mod factor;
pub mod reporting;
pub mod universe;

pub use compact::{ChangeHistory, CompactFactor};
pub use compose::{
    BinaryOp, ComposedFactor, FactorExt, PctChangeFactor, RollingMaxFactor, ScalarFactor,
};
pub use continuous::ContinuousFactor;
pub use error::{FactorError, Result};
pub use factor::{DateSelection, Factor, FactorContext, FactorKind, FactorQuery};
pub use universe::{
    FundKind, FundTicker, FundUniverse, StockSelectionPolicy, StockTickerSelector,
    SuspendedTickers, TickerSelector,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
