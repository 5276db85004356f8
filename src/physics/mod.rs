//! Beta-decay physics: the electron kinetic-energy density and its Coulomb
//! (Fermi) correction.
//!
//! Everything here is a pure function of the transition and constants, so the
//! sampler and the fitter can evaluate it freely.

pub mod fermi;
pub mod spectrum;

pub use fermi::*;
pub use spectrum::*;
