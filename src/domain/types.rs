//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - passed by reference into the physics, sampling and fitting code
//! - embedded in persisted run archives
//! - reloaded later for fitting or comparisons
//!
//! All energies are in eV.

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Physical constants, all energies in eV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    /// Fine-structure constant.
    pub alpha: f64,
    pub proton_mass: f64,
    pub neutron_mass: f64,
    pub electron_mass: f64,
    /// Assumed neutrino rest mass used when generating spectra.
    pub neutrino_mass: f64,
    /// Energy equivalent of one atomic mass unit.
    pub amu_to_ev: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            alpha: 1.0 / 137.0,
            proton_mass: 938.272046e6,
            neutron_mass: 939.5654133e6,
            electron_mass: 0.510998910e6,
            neutrino_mass: 0.2,
            amu_to_ev: 931.5e6,
        }
    }
}

/// Sign of the nuclear charge change in a single-electron beta decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Charge {
    /// `Z_initial - Z_final = -1`: an electron is emitted.
    BetaMinus,
    /// `Z_initial - Z_final = +1`: a positron is emitted.
    BetaPlus,
}

impl Charge {
    /// Classify `Z_initial - Z_final`; anything but ±1 is not a beta decay.
    pub fn from_difference(delta: i64) -> Option<Self> {
        match delta {
            -1 => Some(Charge::BetaMinus),
            1 => Some(Charge::BetaPlus),
            _ => None,
        }
    }

    /// The signed value `Z_initial - Z_final`.
    pub fn value(self) -> i32 {
        match self {
            Charge::BetaMinus => -1,
            Charge::BetaPlus => 1,
        }
    }

    /// Sign of the Coulomb parameter: attractive for electrons, repulsive for positrons.
    pub fn coulomb_sign(self) -> f64 {
        match self {
            Charge::BetaMinus => 1.0,
            Charge::BetaPlus => -1.0,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Charge::BetaMinus => "beta-",
            Charge::BetaPlus => "beta+",
        }
    }
}

/// A parent -> daughter nuclear transition (masses in atomic mass units).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NuclearTransition {
    pub z_initial: u32,
    pub mass_initial: f64,
    pub z_final: u32,
    pub mass_final: f64,
}

impl NuclearTransition {
    /// Tritium -> helium-3.
    pub const TRITIUM: NuclearTransition = NuclearTransition {
        z_initial: 1,
        mass_initial: 3.0160492,
        z_final: 2,
        mass_final: 3.0160293,
    };

    pub fn charge(&self) -> Result<Charge, AppError> {
        let delta = i64::from(self.z_initial) - i64::from(self.z_final);
        Charge::from_difference(delta).ok_or_else(|| {
            AppError::config(format!(
                "Z_initial - Z_final = {delta} (Z {} -> {}); \
                 a single-electron beta decay needs ±1.",
                self.z_initial, self.z_final
            ))
        })
    }

    /// Maximum kinetic energy available to the electron, in eV.
    pub fn q_value(&self, constants: &PhysicalConstants) -> Result<f64, AppError> {
        let charge = self.charge()?;
        let mass_energy = constants.amu_to_ev * (self.mass_initial - self.mass_final);
        let q = match charge {
            Charge::BetaMinus => mass_energy,
            Charge::BetaPlus => mass_energy - 2.0 * constants.electron_mass,
        };
        if !(q.is_finite() && q > 0.0) {
            return Err(AppError::config(format!(
                "Transition is energetically forbidden (Q = {q:.3} eV)."
            )));
        }
        Ok(q)
    }
}

/// A closed energy interval `[min, max]` in eV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyWindow {
    pub min: f64,
    pub max: f64,
}

impl EnergyWindow {
    pub fn new(min: f64, max: f64) -> Result<Self, AppError> {
        if !(min.is_finite() && max.is_finite()) {
            return Err(AppError::config("Energy window bounds must be finite."));
        }
        if min >= max {
            return Err(AppError::config(format!(
                "Energy window is empty: min={min} >= max={max}."
            )));
        }
        Ok(Self { min, max })
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }
}

/// Where the sampling interval starts; it always ends at Q.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowerLimit {
    /// `Q - window` (the endpoint region).
    EndpointWindow(f64),
    /// An absolute kinetic energy.
    Absolute(f64),
}

impl LowerLimit {
    pub fn resolve(self, q: f64) -> f64 {
        match self {
            LowerLimit::EndpointWindow(w) => q - w,
            LowerLimit::Absolute(e) => e,
        }
    }
}

/// A full simulation configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults) and validated once by
/// [`SimulationConfig::validate`] before any sampling begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub transition: NuclearTransition,
    pub constants: PhysicalConstants,
    /// External reference Q used instead of the mass-difference value.
    pub q_override: Option<f64>,
    /// Number of accepted events to generate.
    pub events: u64,
    /// Envelope scale `h` for the acceptance-rejection method.
    pub envelope_scale: f64,
    /// Gaussian detector resolution (stddev, eV). Zero disables smearing.
    pub resolution: f64,
    pub lower_limit: LowerLimit,
    /// Histogram domain; defaults to the sampling interval.
    pub domain: Option<EnergyWindow>,
    pub bins: usize,
    pub seed: u64,
    /// Safety bound on the number of candidate draws.
    pub max_draws: u64,
    /// Fraction of the target between progress notifications.
    pub progress_step: f64,
}

impl SimulationConfig {
    /// Tritium defaults with the given event target and seed.
    pub fn tritium(events: u64, seed: u64) -> Self {
        Self {
            transition: NuclearTransition::TRITIUM,
            constants: PhysicalConstants::default(),
            q_override: None,
            events,
            envelope_scale: 2e-5,
            resolution: 1.0,
            lower_limit: LowerLimit::EndpointWindow(25.0),
            domain: None,
            bins: 100,
            seed,
            max_draws: 1_000_000_000,
            progress_step: 0.1,
        }
    }

    /// Q-value in eV: the override when present, otherwise from the masses.
    pub fn q_value(&self) -> Result<f64, AppError> {
        // The charge must be valid even when Q is overridden.
        self.transition.charge()?;
        match self.q_override {
            Some(q) if q.is_finite() && q > 0.0 => Ok(q),
            Some(q) => Err(AppError::config(format!("Q override must be > 0, got {q}."))),
            None => self.transition.q_value(&self.constants),
        }
    }

    /// Sampling interval `[lower_limit, Q]`.
    pub fn sampling_interval(&self) -> Result<EnergyWindow, AppError> {
        let q = self.q_value()?;
        let lo = self.lower_limit.resolve(q);
        if lo < 0.0 {
            return Err(AppError::config(format!(
                "Lower sampling limit {lo:.3} eV is negative (Q = {q:.3} eV)."
            )));
        }
        EnergyWindow::new(lo, q)
    }

    /// Histogram domain: the explicit override or the sampling interval.
    pub fn histogram_domain(&self) -> Result<EnergyWindow, AppError> {
        match self.domain {
            Some(w) => EnergyWindow::new(w.min, w.max),
            None => self.sampling_interval(),
        }
    }

    /// Validate everything that can be checked without drawing random numbers.
    pub fn validate(&self) -> Result<(), AppError> {
        self.transition.charge()?;
        self.sampling_interval()?;
        self.histogram_domain()?;
        if self.events == 0 {
            return Err(AppError::config("Event target must be > 0."));
        }
        if self.bins == 0 {
            return Err(AppError::config("Bin count must be > 0."));
        }
        if !(self.envelope_scale.is_finite() && self.envelope_scale > 0.0) {
            return Err(AppError::config(format!(
                "Envelope scale must be > 0, got {}.",
                self.envelope_scale
            )));
        }
        if !(self.resolution.is_finite() && self.resolution >= 0.0) {
            return Err(AppError::config(format!(
                "Detector resolution must be >= 0, got {}.",
                self.resolution
            )));
        }
        let m_nu = self.constants.neutrino_mass;
        if !(m_nu.is_finite() && m_nu >= 0.0) {
            return Err(AppError::config(format!("Neutrino mass must be >= 0, got {m_nu}.")));
        }
        if self.max_draws < self.events {
            return Err(AppError::config(format!(
                "Draw bound {} is below the event target {}.",
                self.max_draws, self.events
            )));
        }
        if !(self.progress_step > 0.0 && self.progress_step <= 1.0) {
            return Err(AppError::config("Progress step must be in (0, 1]."));
        }
        Ok(())
    }
}

/// How a model is compared with a histogram bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BinEvaluation {
    /// `f(center) * width`.
    Center,
    /// Gauss-Legendre integral of `f` over the bin.
    Integral,
}

/// Which persisted histogram(s) to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HistogramSelection {
    True,
    Smeared,
    Both,
}

/// Fitting options for the spectrum shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Starting neutrino mass (eV).
    pub mass_init: f64,
    pub fix_mass: bool,
    /// Starting normalization; estimated from the data when absent.
    pub norm_init: Option<f64>,
    pub fix_norm: bool,
    /// Fit range in eV (bins whose centre lies inside are used).
    pub fit_range: Option<(f64, f64)>,
    pub evaluation: BinEvaluation,
    pub max_iterations: usize,
    /// Number of neutrino-mass starting points (1 disables restarts).
    pub restarts: usize,
    /// Upper end of the restart grid (eV).
    pub restart_mass_max: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            mass_init: 0.2,
            fix_mass: false,
            norm_init: None,
            fix_norm: false,
            fit_range: None,
            evaluation: BinEvaluation::Integral,
            max_iterations: 200,
            restarts: 1,
            restart_mass_max: 5.0,
        }
    }
}

/// Outcome of a minimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FitStatus {
    Converged,
    Failed { reason: String },
}

/// Fit output against one histogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub status: FitStatus,
    pub parameter_estimates: BTreeMap<String, f64>,
    /// Standard errors from the fit covariance; 0 for fixed parameters.
    pub parameter_uncertainties: BTreeMap<String, f64>,
    pub chi_square: f64,
    pub degrees_of_freedom: i64,
    /// Chi-square survival probability (NaN when `degrees_of_freedom <= 0`).
    pub p_value: f64,
    /// False when the covariance matrix was singular or a free parameter had
    /// no resolvable derivative; the uncertainties are then NaN.
    pub covariance_ok: bool,
    pub iterations: usize,
}

impl FitResult {
    pub fn is_converged(&self) -> bool {
        self.status == FitStatus::Converged
    }

    pub fn estimate(&self, name: &str) -> Option<f64> {
        self.parameter_estimates.get(name).copied()
    }

    pub fn uncertainty(&self, name: &str) -> Option<f64> {
        self.parameter_uncertainties.get(name).copied()
    }

    /// Chi-square per degree of freedom.
    pub fn reduced_chi_square(&self) -> f64 {
        if self.degrees_of_freedom > 0 {
            self.chi_square / self.degrees_of_freedom as f64
        } else {
            f64::NAN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tritium_q_value_follows_mass_difference() {
        let constants = PhysicalConstants::default();
        let t = NuclearTransition::TRITIUM;
        let q = t.q_value(&constants).unwrap();
        let expected = 931.5e6 * (3.0160492 - 3.0160293);
        assert!((q - expected).abs() < 1e-6, "q={q}, expected={expected}");
        assert!((q - 18536.85).abs() < 0.01);
        assert_eq!(t.charge().unwrap(), Charge::BetaMinus);

        // The 18590 eV reference value is an external measurement; the mass
        // formula lands within half a percent of it.
        let reference = 18590.0;
        let rel = (q - reference).abs() / reference;
        assert!(rel > 0.0 && rel < 0.005, "rel={rel}");
    }

    #[test]
    fn beta_plus_subtracts_two_electron_masses() {
        let constants = PhysicalConstants::default();
        // Hypothetical beta+ transition with a 2 MeV mass difference.
        let t = NuclearTransition {
            z_initial: 6,
            mass_initial: 11.0114336,
            z_final: 5,
            mass_final: 11.0093054,
        };
        let q = t.q_value(&constants).unwrap();
        let raw = constants.amu_to_ev * (t.mass_initial - t.mass_final);
        assert!((q - (raw - 2.0 * constants.electron_mass)).abs() < 1e-6);
        assert_eq!(t.charge().unwrap(), Charge::BetaPlus);
    }

    #[test]
    fn invalid_charge_is_a_configuration_error() {
        let t = NuclearTransition {
            z_initial: 2,
            mass_initial: 3.0,
            z_final: 2,
            mass_final: 2.9,
        };
        let err = t.charge().unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));

        let two_step = NuclearTransition {
            z_initial: 1,
            mass_initial: 3.0,
            z_final: 3,
            mass_final: 2.9,
        };
        assert!(two_step.charge().is_err());
    }

    #[test]
    fn validate_rejects_degenerate_settings() {
        let base = SimulationConfig::tritium(1000, 1);
        assert!(base.validate().is_ok());

        let mut c = base.clone();
        c.bins = 0;
        assert!(matches!(c.validate(), Err(AppError::Configuration(_))));

        let mut c = base.clone();
        c.events = 0;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.domain = Some(EnergyWindow { min: 10.0, max: 10.0 });
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.lower_limit = LowerLimit::EndpointWindow(0.0);
        assert!(c.validate().is_err());

        let mut c = base;
        c.envelope_scale = 0.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn q_override_replaces_mass_difference() {
        let mut c = SimulationConfig::tritium(10, 1);
        c.q_override = Some(18590.0);
        assert_eq!(c.q_value().unwrap(), 18590.0);
        let w = c.sampling_interval().unwrap();
        assert!((w.min - 18565.0).abs() < 1e-9);
        assert_eq!(w.max, 18590.0);
    }
}
