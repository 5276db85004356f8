//! Chi-square test that two unweighted histograms share one underlying shape.
//!
//! For counts `n_i`, `m_i` with totals `N`, `M`:
//!
//! ```text
//! χ² = Σ (M n_i - N m_i)² / (N M (n_i + m_i))
//! ```
//!
//! over bins where `n_i + m_i > 0`, with one degree of freedom fewer than the
//! number of such bins (the totals are not compared).

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::AppError;
use crate::histogram::binned::Histogram;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeComparison {
    pub chi_square: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
}

/// Compare the normalised shapes of `a` and `b`.
pub fn compare_shapes(a: &Histogram, b: &Histogram) -> Result<ShapeComparison, AppError> {
    if !a.same_binning(b) {
        return Err(AppError::config(format!(
            "Cannot compare '{}' ({} bins over [{}, {}]) with '{}' ({} bins over [{}, {}]).",
            a.name,
            a.bins(),
            a.min,
            a.max,
            b.name,
            b.bins(),
            b.min,
            b.max
        )));
    }
    let total_a = a.integral();
    let total_b = b.integral();
    if total_a <= 0.0 || total_b <= 0.0 {
        return Err(AppError::config("Cannot compare shapes of an empty histogram."));
    }

    let mut chi_square = 0.0;
    let mut used = 0usize;
    for (&n, &m) in a.contents.iter().zip(b.contents.iter()) {
        let sum = n + m;
        if sum <= 0.0 {
            continue;
        }
        let d = total_b * n - total_a * m;
        chi_square += d * d / sum;
        used += 1;
    }
    chi_square /= total_a * total_b;

    let degrees_of_freedom = used.saturating_sub(1);
    let p_value = chi_square_p_value(chi_square, degrees_of_freedom as f64);
    Ok(ShapeComparison {
        chi_square,
        degrees_of_freedom,
        p_value,
    })
}

/// Upper-tail probability of a chi-square statistic; NaN for `dof <= 0`.
pub fn chi_square_p_value(chi_square: f64, dof: f64) -> f64 {
    if !(dof > 0.0) || !chi_square.is_finite() {
        return f64::NAN;
    }
    match ChiSquared::new(dof) {
        Ok(dist) => dist.sf(chi_square.max(0.0)),
        Err(_) => f64::NAN,
    }
}
