//! `beta-spectrum` library crate.
//!
//! The binary (`bspec`) is a thin wrapper around this library so that:
//!
//! - physics, sampling and fitting are testable without spawning processes
//! - the simulate and fit stages can be driven from other code
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod histogram;
pub mod io;
pub mod math;
pub mod physics;
pub mod plot;
pub mod report;
pub mod sampling;
