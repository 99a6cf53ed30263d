#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/hobart/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod calendar;
pub mod checkpoint;
pub mod error;
pub mod frame;
pub mod store;
pub mod tables;

pub use calendar::{Calendar, TradingCalendar};
pub use checkpoint::{CheckpointStore, MemoryCheckpoints};
pub use error::{DataError, Result};
pub use store::{DateFilter, ReadRequest, Record, SqliteStore, TableStore, Value};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
