//! Stateless analysis routines over tabular datasets.
//!
//! Every routine takes a parsed [`Dataset`] plus its parameters and returns
//! either a JSON result or rendered PNG bytes. Nothing here holds state
//! between calls.

pub mod dataset;
pub mod error;
pub mod plot;
pub mod stats;

pub use dataset::{Column, ColumnData, Dataset};
pub use error::AnalysisError;
pub use plot::{render, PlotRequest};
pub use stats::{correlation, describe, missing_values, value_counts};
