//! Reporting utilities: per-bin residuals, largest pulls, and formatted output.

pub mod format;

pub use format::*;

use crate::domain::{BinEvaluation, FitResult};
use crate::fit::{BinnedModel, select_bins};
use crate::histogram::Histogram;

/// Observed vs fitted content of one bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinResidual {
    pub center: f64,
    pub observed: f64,
    pub expected: f64,
    /// `(observed - expected) / sqrt(observed)`.
    pub pull: f64,
}

/// Parameter vector of `result` in the model's order (NaN when absent).
pub fn fitted_params<M: BinnedModel + ?Sized>(model: &M, result: &FitResult) -> Vec<f64> {
    model
        .parameter_names()
        .iter()
        .map(|name| result.estimate(name).unwrap_or(f64::NAN))
        .collect()
}

/// Residuals for the bins that took part in the fit.
pub fn compute_bin_residuals<M: BinnedModel + ?Sized>(
    histogram: &Histogram,
    model: &M,
    params: &[f64],
    evaluation: BinEvaluation,
    fit_range: Option<(f64, f64)>,
) -> Vec<BinResidual> {
    select_bins(histogram, fit_range)
        .into_iter()
        .map(|b| {
            let expected = model.bin_content(b.lo, b.hi, params, evaluation);
            BinResidual {
                center: 0.5 * (b.lo + b.hi),
                observed: b.observed,
                expected,
                pull: (b.observed - expected) / b.observed.sqrt(),
            }
        })
        .collect()
}

/// The `top_n` residuals with the largest |pull|, largest first.
pub fn largest_pulls(residuals: &[BinResidual], top_n: usize) -> Vec<BinResidual> {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| {
        b.pull
            .abs()
            .partial_cmp(&a.pull.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(top_n);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat;

    impl BinnedModel for Flat {
        fn parameter_names(&self) -> &[&'static str] {
            &["level"]
        }

        fn value(&self, _x: f64, params: &[f64]) -> f64 {
            params[0]
        }
    }

    #[test]
    fn residuals_skip_empty_bins_and_rank_by_pull() {
        let mut h = Histogram::new("h", 4, 0.0, 4.0).unwrap();
        h.contents = vec![100.0, 0.0, 121.0, 64.0];
        let res = compute_bin_residuals(&h, &Flat, &[100.0], BinEvaluation::Center, None);
        assert_eq!(res.len(), 3);
        assert_eq!(res[0].pull, 0.0);
        assert!((res[1].pull - 21.0 / 11.0).abs() < 1e-12);
        assert!((res[2].pull + 36.0 / 8.0).abs() < 1e-12);

        let top = largest_pulls(&res, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].center, 3.5);
        assert_eq!(top[1].center, 2.5);
    }
}
