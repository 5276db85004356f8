//! Parametric shapes the fitter can compare with histogram bins.

use crate::domain::BinEvaluation;
use crate::histogram::Histogram;
use crate::math::integrate;
use crate::physics::SpectrumModel;

/// A function `f(x; params)` whose bin contents are compared with counts.
pub trait BinnedModel: Sync {
    /// Parameter names, in the order `params` slices use.
    fn parameter_names(&self) -> &[&'static str];

    /// Density (counts per unit x) at `x`.
    fn value(&self, x: f64, params: &[f64]) -> f64;

    /// Expected content of the bin `[lo, hi)`.
    fn bin_content(&self, lo: f64, hi: f64, params: &[f64], evaluation: BinEvaluation) -> f64 {
        match evaluation {
            BinEvaluation::Center => self.value(0.5 * (lo + hi), params) * (hi - lo),
            BinEvaluation::Integral => integrate(|x| self.value(x, params), lo, hi),
        }
    }

    /// Map fitted parameters to their canonical representative.
    fn canonicalize(&self, _params: &mut [f64]) {}
}

/// Index of the neutrino mass in [`SpectrumShape`] parameters.
pub const MASS_PARAM: usize = 0;
/// Index of the normalization in [`SpectrumShape`] parameters.
pub const NORM_PARAM: usize = 1;

/// Gauss–Legendre panels per bin for [`SpectrumShape`] integrals.
const BIN_PANELS: usize = 8;

/// `C · N(T; m_ν, 1)` with parameters `[m_nu, C]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumShape {
    pub model: SpectrumModel,
}

impl SpectrumShape {
    pub const NAMES: [&'static str; 2] = ["m_nu", "C"];

    pub fn new(model: SpectrumModel) -> Self {
        Self { model }
    }

    /// Expected-count histogram for the given parameters.
    pub fn expected_histogram(
        &self,
        template: &Histogram,
        neutrino_mass: f64,
        normalization: f64,
        evaluation: BinEvaluation,
    ) -> Histogram {
        let params = [neutrino_mass, normalization];
        let mut out = template.clone();
        out.underflow = 0.0;
        out.overflow = 0.0;
        out.entries = 0;
        for i in 0..out.bins() {
            let (lo, hi) = (out.bin_low(i), out.bin_high(i));
            out.contents[i] = self.bin_content(lo, hi, &params, evaluation);
        }
        out
    }
}

impl BinnedModel for SpectrumShape {
    fn parameter_names(&self) -> &[&'static str] {
        &Self::NAMES
    }

    fn value(&self, x: f64, params: &[f64]) -> f64 {
        self.model.decay_density(x, params[MASS_PARAM], params[NORM_PARAM])
    }

    /// Integrals stop at the kinematic endpoint, where the density has a
    /// square-root edge that a plain panel over the bin cannot resolve.
    fn bin_content(&self, lo: f64, hi: f64, params: &[f64], evaluation: BinEvaluation) -> f64 {
        match evaluation {
            BinEvaluation::Center => self.value(0.5 * (lo + hi), params) * (hi - lo),
            BinEvaluation::Integral => self.model.clipped_integral(
                lo,
                hi,
                params[MASS_PARAM],
                params[NORM_PARAM],
                BIN_PANELS,
            ),
        }
    }

    fn canonicalize(&self, params: &mut [f64]) {
        // Only m_ν² enters the density.
        params[MASS_PARAM] = params[MASS_PARAM].abs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NuclearTransition, PhysicalConstants};
    use crate::math::integrate_panels;
    use crate::physics::momentum_fermi_product;

    fn shape() -> SpectrumShape {
        SpectrumShape::new(
            SpectrumModel::new(NuclearTransition::TRITIUM, PhysicalConstants::default(), None)
                .unwrap(),
        )
    }

    #[test]
    fn center_and_integral_agree_on_narrow_bins() {
        let s = shape();
        let lo = s.model.q - 20.0;
        let params = [0.2, 1.0];
        let a = s.bin_content(lo, lo + 0.01, &params, BinEvaluation::Center);
        let b = s.bin_content(lo, lo + 0.01, &params, BinEvaluation::Integral);
        assert!((a / b - 1.0).abs() < 1e-6);
    }

    #[test]
    fn expected_histogram_scales_with_normalization() {
        let s = shape();
        let template = Histogram::new("E_e", 10, s.model.q - 25.0, s.model.q).unwrap();
        let h1 = s.expected_histogram(&template, 0.2, 1.0, BinEvaluation::Integral);
        let h2 = s.expected_histogram(&template, 0.2, 2.0, BinEvaluation::Integral);
        assert!(h1.integral() > 0.0);
        assert!((h2.integral() / h1.integral() - 2.0).abs() < 1e-12);
        // Monotone decrease towards the endpoint.
        assert!(h1.contents.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn endpoint_bin_content_is_smooth_in_mass() {
        let s = shape();
        let (lo, hi) = (s.model.q - 2.5, s.model.q - 2.0);
        let c = 4e-10;
        let content = |m: f64| s.bin_content(lo, hi, &[m, c], BinEvaluation::Integral);

        for m in [2.0235, 2.1, 2.2] {
            // With the endpoint inside the bin, dμ/dm only sees ∂N/∂m, which in
            // u = sqrt(T_end - T) reads -2 m C pF E (m + u²) / sqrt(2m + u²).
            let end = s.model.endpoint(m);
            let exact = integrate_panels(
                |u| {
                    let t = end - u * u;
                    let pf = momentum_fermi_product(
                        s.model.transition.z_initial,
                        t,
                        s.model.charge,
                        &s.model.constants,
                    );
                    let e = t + s.model.constants.electron_mass;
                    -2.0 * m * c * pf * e * (m + u * u) / (2.0 * m + u * u).sqrt()
                },
                0.0,
                (end - lo).sqrt(),
                2_000,
            );
            let h = 1e-6 * m;
            let numeric = (content(m + h) - content(m - h)) / (2.0 * h);
            assert!((numeric / exact - 1.0).abs() < 1e-4, "m={m}: {numeric} vs {exact}");
        }
        // Bins past the endpoint hold nothing.
        let (lo, hi) = (s.model.q - 1.5, s.model.q - 1.0);
        let past = s.bin_content(lo, hi, &[2.0, c], BinEvaluation::Integral);
        assert_eq!(past, 0.0);
    }

    #[test]
    fn mass_sign_is_canonicalized() {
        let s = shape();
        let mut p = [-1.5, 3.0];
        s.canonicalize(&mut p);
        assert_eq!(p, [1.5, 3.0]);
    }
}
