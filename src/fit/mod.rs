//! Spectrum fitting.
//!
//! Responsibilities:
//!
//! - describe a parametric shape that can be compared bin by bin (`BinnedModel`)
//! - minimise the chi-square against a histogram (Levenberg–Marquardt)
//! - optionally repeat the fit from a grid of starting points (parallel)

pub mod fitter;
pub mod model;
pub mod starts;

pub use fitter::*;
pub use model::*;
pub use starts::*;
