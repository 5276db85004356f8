//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - nuclear inputs (`NuclearTransition`, `PhysicalConstants`, `Charge`)
//! - resolved run configuration (`SimulationConfig`, `FitConfig`)
//! - fit outputs (`FitResult`, `FitStatus`)

pub mod types;

pub use types::*;
