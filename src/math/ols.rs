//! Linear least squares solver.
//!
//! Each Levenberg–Marquardt step solves a small damped system of the form:
//!
//! ```text
//! minimize ‖J δ - r‖² + λ ‖D δ‖²
//! ```
//!
//! which we write as one tall ordinary least squares problem by stacking
//! `sqrt(λ) D` under `J`.
//!
//! Implementation choices:
//! - SVD handles tall and rank-deficient matrices (a neutrino mass of exactly
//!   zero has a vanishing Jacobian column, for instance).
//! - The parameter dimension is tiny (1–2 columns), so SVD cost is negligible
//!   next to model evaluation.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Stack `sqrt(lambda) * diag(scale)` under `j` and zeros under `r`, then solve.
pub fn solve_damped(
    j: &DMatrix<f64>,
    r: &DVector<f64>,
    scale: &[f64],
    lambda: f64,
) -> Option<DVector<f64>> {
    let (n, k) = j.shape();
    let mut a = DMatrix::<f64>::zeros(n + k, k);
    let mut b = DVector::<f64>::zeros(n + k);
    a.rows_mut(0, n).copy_from(j);
    b.rows_mut(0, n).copy_from(r);
    let sl = lambda.sqrt();
    for (i, s) in scale.iter().enumerate() {
        a[(n + i, i)] = sl * s;
    }
    solve_least_squares(&a, &b)
}
