//! Mathematical utilities: least squares and quadrature.

pub mod ols;
pub mod quadrature;

pub use ols::*;
pub use quadrature::*;
