#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod accounting;
pub mod beta;
pub mod compositor;
pub mod date_cache;
pub mod error;
pub mod fund_adj;
pub mod index;
pub mod limit_move;

pub use accounting::{AccountingFactor, AccountingMode};
pub use beta::BetaCompositor;
pub use compositor::{Compositor, CompositorContext, UpdateSummary};
pub use date_cache::{
    AccountingDateCacheCompositor, DateCacheDelta, DateCacheEntry, DateCacheSnapshot,
    EntityDelta, StatementRef,
};
pub use error::{CompositorError, Result};
pub use fund_adj::FundAdjFactorCompositor;
pub use index::{IndexCompositionPolicy, IndexCompositor};
pub use limit_move::{LimitMove, LimitMoveCompositor};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
