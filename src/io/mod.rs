//! Input/output helpers.
//!
//! - run archives keyed by run name (`archive`)
//! - bin-table CSV export (`export`)

pub mod archive;
pub mod export;

pub use archive::*;
pub use export::*;
