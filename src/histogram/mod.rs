//! Fixed-width energy histograms.
//!
//! - `Histogram`: one binned channel with under/overflow tallies
//! - `SpectrumHistograms`: the true and smeared channels of a run
//! - `compare_shapes`: chi-square consistency of two normalised histograms

pub mod aggregator;
pub mod binned;
pub mod compare;

pub use aggregator::*;
pub use binned::*;
pub use compare::*;
