//! Non-relativistic Fermi function.
//!
//! ```text
//! eta = s * alpha * Z * (T + m_e) / sqrt(2 T m_e)
//! F   = 2π eta / (1 - exp(-2π eta))
//! ```
//!
//! with `s = +1` for electrons (attractive Coulomb field) and `s = -1` for
//! positrons.
//!
//! Numerical notes:
//! - `1 - exp(-x)` is computed as `-expm1(-x)`, with a series near `x = 0`.
//! - As `T → 0`, `eta → ±∞`: `F → 2π|eta|` for beta-minus and `F → 0` for
//!   beta-plus. The momentum-weighted product `p F` stays finite and is
//!   evaluated jointly by [`momentum_fermi_product`].

use std::f64::consts::PI;

use crate::domain::{Charge, PhysicalConstants};

/// Floor on the kinetic energy (eV) used by [`fermi_factor`].
const T_EPS: f64 = 1e-12;

/// Below this `|x|` we use the series `x / (1 - e^{-x}) ≈ 1 + x/2`.
const SMALL_X: f64 = 1e-8;

/// Coulomb parameter `eta` for kinetic energy `t` (eV).
pub fn coulomb_eta(z: u32, t: f64, charge: Charge, constants: &PhysicalConstants) -> f64 {
    let me = constants.electron_mass;
    (t + me) * charge.coulomb_sign() * constants.alpha * f64::from(z) / (2.0 * t * me).sqrt()
}

/// `x / (1 - e^{-x})`, finite for every finite or infinite `x`.
fn coulomb_ratio(x: f64) -> f64 {
    if x.abs() < SMALL_X {
        return 1.0 + 0.5 * x;
    }
    if x == f64::INFINITY {
        return f64::INFINITY;
    }
    // For very negative x, expm1 overflows to +inf and the ratio goes to +0.
    let denom = -(-x).exp_m1();
    x / denom
}

/// Fermi function `F(Z, T)`.
///
/// `t` is clamped to a tiny positive floor so the result is finite (and
/// never NaN) on the whole physical domain `t >= 0`.
pub fn fermi_factor(z: u32, t: f64, charge: Charge, constants: &PhysicalConstants) -> f64 {
    let t = t.max(T_EPS);
    coulomb_ratio(2.0 * PI * coulomb_eta(z, t, charge, constants))
}

/// `p(T) * F(Z, T)` with `p = sqrt(T² + 2 T m_e)`, including its `T = 0` limit.
///
/// At `T = 0` the product tends to `2π alpha Z m_e` for beta-minus and to 0
/// for beta-plus.
pub fn momentum_fermi_product(
    z: u32,
    t: f64,
    charge: Charge,
    constants: &PhysicalConstants,
) -> f64 {
    let me = constants.electron_mass;
    if t <= 0.0 {
        return match charge {
            Charge::BetaMinus => 2.0 * PI * constants.alpha * f64::from(z) * me,
            Charge::BetaPlus => 0.0,
        };
    }
    let p = (t * t + 2.0 * t * me).sqrt();
    p * coulomb_ratio(2.0 * PI * coulomb_eta(z, t, charge, constants))
}
