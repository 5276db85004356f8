//! Acceptance–rejection sampling of electron energies.
//!
//! Responsibilities:
//!
//! - build the constant envelope `h · N(Q/2)` and check it against the density
//! - draw candidate energies and accept them with probability `N(T) / envelope`
//! - optionally smear accepted energies with the detector resolution
//! - report coarse progress to an observer

pub mod progress;
pub mod sampler;

pub use progress::*;
pub use sampler::*;
