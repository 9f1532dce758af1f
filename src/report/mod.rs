//! Report generation.
//!
//! Markdown and JSON reports for label analyses, plus the CSV and text
//! outputs of the `trend` and `significance` commands.

pub mod generator;
pub mod tables;

pub use generator::*;
pub use tables::*;
