//! Electron kinetic-energy density for an allowed beta transition.
//!
//! ```text
//! N(T) = C · p(T) · (T + m_e) · (Q - T) · sqrt((Q - T)² - m_ν²) · F(Z, T)
//! p(T) = sqrt(T² + 2 T m_e)
//! ```
//!
//! `N` is only defined for `0 <= T <= Q - m_ν`; outside that range it is 0.

use crate::domain::{Charge, NuclearTransition, PhysicalConstants, SimulationConfig};
use crate::error::AppError;
use crate::math::integrate_panels;
use crate::physics::fermi::{fermi_factor, momentum_fermi_product};

/// Immutable description of one transition, with its charge and Q resolved.
///
/// Construction is the only place the charge is checked; evaluation never
/// fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumModel {
    pub transition: NuclearTransition,
    pub constants: PhysicalConstants,
    pub charge: Charge,
    /// Endpoint energy (eV).
    pub q: f64,
}

impl SpectrumModel {
    /// Build a model, taking Q from the masses unless `q_override` is given.
    pub fn new(
        transition: NuclearTransition,
        constants: PhysicalConstants,
        q_override: Option<f64>,
    ) -> Result<Self, AppError> {
        let charge = transition.charge()?;
        let q = match q_override {
            Some(q) if q.is_finite() && q > 0.0 => q,
            Some(q) => return Err(AppError::config(format!("Q override must be > 0, got {q}."))),
            None => transition.q_value(&constants)?,
        };
        Ok(Self {
            transition,
            constants,
            charge,
            q,
        })
    }

    pub fn from_config(config: &SimulationConfig) -> Result<Self, AppError> {
        Self::new(config.transition, config.constants, config.q_override)
    }

    /// Unnormalized decay rate `N(T; m_ν, C)`; zero outside the physical domain.
    pub fn decay_density(&self, t: f64, neutrino_mass: f64, normalization: f64) -> f64 {
        // Also rejects NaN.
        if !(t >= 0.0 && t <= self.q) {
            return 0.0;
        }
        let dq = self.q - t;
        let m2 = neutrino_mass * neutrino_mass;
        let dq2 = dq * dq;
        if dq2 < m2 {
            return 0.0;
        }
        let total_energy = t + self.constants.electron_mass;
        let pf = momentum_fermi_product(self.transition.z_initial, t, self.charge, &self.constants);
        normalization * pf * total_energy * dq * (dq2 - m2).sqrt()
    }

    /// Fermi function of this transition at kinetic energy `t`.
    pub fn fermi_factor(&self, t: f64) -> f64 {
        fermi_factor(self.transition.z_initial, t, self.charge, &self.constants)
    }

    /// Largest kinetic energy the electron can carry for a given neutrino mass.
    pub fn endpoint(&self, neutrino_mass: f64) -> f64 {
        self.q - neutrino_mass.abs()
    }

    /// `∫ N(T; m_ν, 1) dT` over `[lo, hi]`, clipped to the physical domain.
    pub fn spectrum_integral(&self, lo: f64, hi: f64, neutrino_mass: f64) -> f64 {
        self.clipped_integral(lo, hi, neutrino_mass, 1.0, 400)
    }

    /// `∫ N(T; m_ν, C) dT` over `[lo, hi] ∩ [0, Q - |m_ν|]`.
    ///
    /// The density falls like `sqrt(T_end - T)` at the kinematic endpoint, so
    /// the integral is taken in `u = sqrt(T_end - T)` (`dT = 2u du`), where the
    /// integrand is smooth and a few Gauss–Legendre panels are exact to
    /// rounding. The result is then also smooth in `m_ν`.
    pub fn clipped_integral(
        &self,
        lo: f64,
        hi: f64,
        neutrino_mass: f64,
        normalization: f64,
        panels: usize,
    ) -> f64 {
        let end = self.endpoint(neutrino_mass);
        let lo = lo.max(0.0);
        let hi = hi.min(end);
        if !(hi > lo) {
            return 0.0;
        }
        let u_lo = (end - hi).sqrt();
        let u_hi = (end - lo).sqrt();
        integrate_panels(
            |u| 2.0 * u * self.decay_density(end - u * u, neutrino_mass, normalization),
            u_lo,
            u_hi,
            panels,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tritium() -> SpectrumModel {
        SpectrumModel::new(NuclearTransition::TRITIUM, PhysicalConstants::default(), None).unwrap()
    }

    #[test]
    fn density_vanishes_outside_domain() {
        let m = tritium();
        assert_eq!(m.decay_density(-1.0, 0.2, 1.0), 0.0);
        assert_eq!(m.decay_density(m.q + 1.0, 0.2, 1.0), 0.0);
        assert_eq!(m.decay_density(m.q, 0.2, 1.0), 0.0);
        // Inside (Q - m_ν, Q] the neutrino cannot be produced.
        assert_eq!(m.decay_density(m.q - 0.1, 0.2, 1.0), 0.0);
        assert_eq!(m.decay_density(f64::NAN, 0.2, 1.0), 0.0);
        // Exactly at the kinematic endpoint the density is zero, not NaN.
        let at_endpoint = m.decay_density(m.q - 0.2, 0.2, 1.0);
        assert!(at_endpoint.abs() < 1e-3 * m.decay_density(m.q - 1.0, 0.2, 1.0));
    }

    #[test]
    fn density_is_finite_and_positive_at_zero_for_beta_minus() {
        let m = tritium();
        let d0 = m.decay_density(0.0, 0.2, 1.0);
        assert!(d0.is_finite() && d0 > 0.0);
        let d_small = m.decay_density(1e-9, 0.2, 1.0);
        assert!((d_small / d0 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn density_vanishes_at_zero_for_beta_plus() {
        let t = NuclearTransition {
            z_initial: 6,
            mass_initial: 11.0114336,
            z_final: 5,
            mass_final: 11.0093054,
        };
        let m = SpectrumModel::new(t, PhysicalConstants::default(), None).unwrap();
        assert_eq!(m.decay_density(0.0, 0.0, 1.0), 0.0);
        assert!(m.decay_density(0.5 * m.q, 0.0, 1.0) > 0.0);
    }

    #[test]
    fn normalization_scales_linearly() {
        let m = tritium();
        let t = m.q - 10.0;
        let a = m.decay_density(t, 0.2, 1.0);
        let b = m.decay_density(t, 0.2, 3.5);
        assert!((b / a - 3.5).abs() < 1e-12);
    }

    #[test]
    fn neutrino_mass_suppresses_the_endpoint() {
        let m = tritium();
        let t = m.q - 3.0;
        assert!(m.decay_density(t, 2.0, 1.0) < m.decay_density(t, 0.0, 1.0));
    }

    #[test]
    fn full_range_peak_lies_at_low_energy() {
        let m = tritium();
        let n = 2000;
        let (mut best_t, mut best_v) = (0.0, f64::NEG_INFINITY);
        for i in 0..n {
            let t = m.q * (i as f64 + 0.5) / n as f64;
            let v = m.decay_density(t, 0.2, 1.0);
            if v > best_v {
                best_v = v;
                best_t = t;
            }
        }
        assert!(best_t > 0.0 && best_t < 0.5 * m.q, "peak at {best_t}");
    }

    #[test]
    fn integral_matches_sum_of_pieces() {
        let m = tritium();
        let lo = m.q - 25.0;
        let whole = m.spectrum_integral(lo, m.q, 0.2);
        let mid = m.q - 12.5;
        let parts = m.spectrum_integral(lo, mid, 0.2) + m.spectrum_integral(mid, m.q, 0.2);
        assert!(whole > 0.0);
        assert!((whole / parts - 1.0).abs() < 1e-6);
        assert_eq!(m.spectrum_integral(m.q, m.q + 5.0, 0.2), 0.0);
    }

    #[test]
    fn clipped_integral_resolves_the_endpoint_edge() {
        let m = tritium();
        let (lo, hi) = (m.q - 2.5, m.q - 2.0);
        for m_nu in [2.0235, 2.1, 2.2] {
            let end = m.endpoint(m_nu);
            let reference = integrate_panels(|t| m.decay_density(t, m_nu, 1.0), lo, end, 20_000);
            let coarse = m.clipped_integral(lo, hi, m_nu, 1.0, 8);
            assert!(
                (coarse / reference - 1.0).abs() < 1e-5,
                "m_nu={m_nu}: {coarse} vs {reference}"
            );
        }
        // Bin entirely beyond the endpoint, and reversed bounds.
        assert_eq!(m.clipped_integral(m.q - 1.5, m.q - 1.0, 2.0, 1.0, 8), 0.0);
        assert_eq!(m.clipped_integral(hi, lo, 0.0, 1.0, 8), 0.0);
        // Normalization enters linearly.
        let one = m.clipped_integral(lo, hi, 0.5, 1.0, 8);
        assert!((m.clipped_integral(lo, hi, 0.5, 3.0, 8) / one - 3.0).abs() < 1e-12);
    }

    #[test]
    fn construction_rejects_invalid_charge() {
        let t = NuclearTransition {
            z_initial: 3,
            mass_initial: 7.0,
            z_final: 3,
            mass_final: 6.9,
        };
        let err = SpectrumModel::new(t, PhysicalConstants::default(), Some(18590.0)).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    proptest! {
        #[test]
        fn density_is_non_negative(t in -1000.0f64..20000.0, m_nu in 0.0f64..50.0) {
            let m = tritium();
            let v = m.decay_density(t, m_nu, 1.0);
            prop_assert!(v.is_finite());
            prop_assert!(v >= 0.0);
        }

        #[test]
        fn density_is_zero_beyond_endpoint(excess in 0.0f64..1000.0, m_nu in 0.0f64..50.0) {
            let m = tritium();
            let t = m.endpoint(m_nu) + excess + 1e-9;
            prop_assert_eq!(m.decay_density(t, m_nu, 1.0), 0.0);
        }
    }
}
