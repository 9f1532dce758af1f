//! Label analysis.
//!
//! Parsing of raw gender/race fields, single-pass aggregation into
//! count tables, and percentage derivation.

pub mod aggregator;
pub mod parser;
pub mod percentages;

pub use aggregator::*;
pub use percentages::Percent;
