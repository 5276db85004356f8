//! Chi-square minimisation of a [`BinnedModel`] against a histogram.
//!
//! Given:
//! - bins `[lo_i, hi_i)` whose centres fall in the fit range
//! - observed contents `y_i > 0` (empty bins are skipped)
//! - a model `f(x; p)` and a starting point `p0`
//!
//! we minimise
//!
//! ```text
//! χ²(p) = Σ (y_i - μ_i(p))² / y_i,     μ_i = ∫_{bin i} f(x; p) dx
//! ```
//!
//! with Levenberg–Marquardt over the free parameters. Each step solves the
//! damped linear problem with SVD (see `math::ols`), the Jacobian comes from
//! central differences, and the diagonal of `JᵀJ` provides Marquardt scaling
//! so parameters of wildly different magnitude (an eV-scale mass next to a
//! 1e-9 normalization) move sensibly.
//!
//! Non-convergence is not an error: it comes back as `FitStatus::Failed`.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use crate::domain::{BinEvaluation, FitResult, FitStatus};
use crate::error::AppError;
use crate::fit::model::BinnedModel;
use crate::histogram::{Histogram, chi_square_p_value};
use crate::math::solve_damped;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
/// Relative finite-difference step.
const FD_REL_STEP: f64 = 1e-6;
/// A Jacobian column whose finite difference moves the weighted model by less
/// than this fraction of its norm is rounding noise.
const FD_NOISE_FLOOR: f64 = 1e-12;

fn fd_step(p: f64) -> f64 {
    FD_REL_STEP * p.abs().max(f64::MIN_POSITIVE.sqrt())
}

/// Options for a single fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub evaluation: BinEvaluation,
    /// Inclusive range on bin centres; either order is accepted.
    pub fit_range: Option<(f64, f64)>,
    pub max_iterations: usize,
    /// Relative chi-square decrease (and relative step) below which we stop.
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            evaluation: BinEvaluation::Integral,
            fit_range: None,
            max_iterations: 200,
            tolerance: 1e-10,
        }
    }
}

/// One bin taking part in the fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitBin {
    pub lo: f64,
    pub hi: f64,
    pub observed: f64,
}

/// Non-empty bins whose centre lies in `range` (whole histogram when `None`).
pub fn select_bins(histogram: &Histogram, range: Option<(f64, f64)>) -> Vec<FitBin> {
    let (lo, hi) = match range {
        Some((a, b)) => (a.min(b), a.max(b)),
        None => (f64::NEG_INFINITY, f64::INFINITY),
    };
    (0..histogram.bins())
        .filter_map(|i| {
            let c = histogram.bin_center(i);
            let y = histogram.contents[i];
            (c >= lo && c <= hi && y > 0.0).then(|| FitBin {
                lo: histogram.bin_low(i),
                hi: histogram.bin_high(i),
                observed: y,
            })
        })
        .collect()
}

struct Problem<'a, M: BinnedModel + ?Sized> {
    model: &'a M,
    bins: Vec<FitBin>,
    free: Vec<usize>,
    evaluation: BinEvaluation,
}

impl<M: BinnedModel + ?Sized> Problem<'_, M> {
    /// Weighted residuals `(y_i - μ_i) / sqrt(y_i)`.
    fn residuals(&self, params: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            self.bins.len(),
            self.bins.iter().map(|b| {
                let mu = self.model.bin_content(b.lo, b.hi, params, self.evaluation);
                (b.observed - mu) / b.observed.sqrt()
            }),
        )
    }

    fn chi_square(&self, params: &[f64]) -> f64 {
        self.residuals(params).norm_squared()
    }

    /// Norm of the weighted model values `μ_i / sqrt(y_i)`.
    fn model_norm(&self, params: &[f64]) -> f64 {
        self.bins
            .iter()
            .map(|b| {
                let mu = self.model.bin_content(b.lo, b.hi, params, self.evaluation);
                mu * mu / b.observed
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Jacobian of the weighted model values `μ_i / sqrt(y_i)` over free parameters.
    fn jacobian(&self, params: &[f64]) -> DMatrix<f64> {
        let n = self.bins.len();
        let mut j = DMatrix::<f64>::zeros(n, self.free.len());
        let mut work = params.to_vec();
        for (col, &k) in self.free.iter().enumerate() {
            let p = params[k];
            let h = fd_step(p);
            work[k] = p + h;
            let up = self.residuals(&work);
            work[k] = p - h;
            let down = self.residuals(&work);
            work[k] = p;
            for i in 0..n {
                // Residuals carry a minus sign relative to the model.
                j[(i, col)] = (down[i] - up[i]) / (2.0 * h);
            }
        }
        j
    }
}

/// Fit `model` to `histogram` starting from `initial`.
///
/// `fixed[k] == true` keeps parameter `k` at its initial value.
pub fn fit<M: BinnedModel + ?Sized>(
    histogram: &Histogram,
    model: &M,
    initial: &[f64],
    fixed: &[bool],
    options: &FitOptions,
) -> Result<FitResult, AppError> {
    let names = model.parameter_names();
    if initial.len() != names.len() || fixed.len() != names.len() {
        return Err(AppError::fit(format!(
            "Expected {} parameters ({}), got {} initial values and {} fixed flags.",
            names.len(),
            names.join(", "),
            initial.len(),
            fixed.len()
        )));
    }
    if let Some((k, v)) = initial.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(AppError::fit(format!("Initial value of {} is not finite ({v}).", names[k])));
    }

    let bins = select_bins(histogram, options.fit_range);
    let free: Vec<usize> = (0..names.len()).filter(|&k| !fixed[k]).collect();
    if bins.is_empty() {
        return Err(AppError::fit(format!(
            "Histogram '{}' has no non-empty bins in the fit range.",
            histogram.name
        )));
    }
    if bins.len() < free.len() {
        return Err(AppError::fit(format!(
            "{} bins cannot constrain {} free parameters.",
            bins.len(),
            free.len()
        )));
    }

    let problem = Problem {
        model,
        bins,
        free,
        evaluation: options.evaluation,
    };
    let mut params = initial.to_vec();
    let (status, iterations) = minimize(&problem, &mut params, options);
    model.canonicalize(&mut params);

    let chi_square = problem.chi_square(&params);
    let (uncertainties, covariance_ok) = standard_errors(&problem, &params);
    let degrees_of_freedom = problem.bins.len() as i64 - problem.free.len() as i64;

    let mut parameter_estimates = BTreeMap::new();
    let mut parameter_uncertainties = BTreeMap::new();
    for (k, name) in names.iter().enumerate() {
        parameter_estimates.insert(name.to_string(), params[k]);
        let err = match problem.free.iter().position(|&f| f == k) {
            Some(col) => uncertainties[col],
            None => 0.0,
        };
        parameter_uncertainties.insert(name.to_string(), err);
    }

    Ok(FitResult {
        status,
        parameter_estimates,
        parameter_uncertainties,
        chi_square,
        degrees_of_freedom,
        p_value: chi_square_p_value(chi_square, degrees_of_freedom as f64),
        covariance_ok,
        iterations,
    })
}

fn minimize<M: BinnedModel + ?Sized>(
    problem: &Problem<'_, M>,
    params: &mut [f64],
    options: &FitOptions,
) -> (FitStatus, usize) {
    let failed = |reason: String| FitStatus::Failed { reason };

    let mut chi2 = problem.chi_square(params);
    if !chi2.is_finite() {
        return (failed(format!("chi-square is not finite at the starting point ({chi2}).")), 0);
    }
    if problem.free.is_empty() {
        return (FitStatus::Converged, 0);
    }

    let tol = options.tolerance;
    let mut lambda = LAMBDA_INIT;
    let mut trial = params.to_vec();

    for iter in 1..=options.max_iterations {
        let j = problem.jacobian(params);
        let r = problem.residuals(params);

        // Marquardt scaling from the column norms of J.
        let norms: Vec<f64> = j.column_iter().map(|c| c.norm()).collect();
        let max_norm = norms.iter().cloned().fold(0.0, f64::max);
        if !(max_norm.is_finite() && max_norm > 0.0) {
            return (failed("model does not depend on any free parameter".into()), iter);
        }
        let scale: Vec<f64> = norms.iter().map(|&n| n.max(1e-12 * max_norm)).collect();

        // Scaled gradient test: cosine between r and each column of J.
        let grad = j.transpose() * &r;
        let r_norm = chi2.sqrt();
        if r_norm == 0.0
            || grad
                .iter()
                .zip(scale.iter())
                .all(|(g, s)| (g / (s * r_norm)).abs() <= tol)
        {
            return (FitStatus::Converged, iter);
        }

        loop {
            let Some(step) = solve_damped(&j, &r, &scale, lambda) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    return (failed("damped step could not be solved".into()), iter);
                }
                continue;
            };

            trial.copy_from_slice(params);
            for (col, &k) in problem.free.iter().enumerate() {
                trial[k] += step[col];
            }
            let small_step = problem
                .free
                .iter()
                .all(|&k| (trial[k] - params[k]).abs() <= tol * (params[k].abs() + tol));
            let chi2_new = problem.chi_square(&trial);

            if chi2_new.is_finite() && chi2_new <= chi2 {
                let small_gain = chi2 - chi2_new <= tol * chi2_new;
                let trusted = lambda <= 1.0;

                params.copy_from_slice(&trial);
                tracing::debug!(iter, chi2 = chi2_new, lambda, "fit step accepted");
                chi2 = chi2_new;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                if trusted && (small_step || small_gain) {
                    return (FitStatus::Converged, iter);
                }
                break;
            }

            // Even a negligible step fails to decrease chi-square: we sit at
            // the minimum to within rounding.
            if small_step {
                return (FitStatus::Converged, iter);
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return (failed("no downhill step found".into()), iter);
            }
        }
    }

    (
        failed(format!(
            "did not converge within {} iterations",
            options.max_iterations
        )),
        options.max_iterations,
    )
}

/// Square roots of the diagonal of `(JᵀJ)⁻¹`.
///
/// NaN (and `false`) when the matrix is singular or a free parameter's
/// derivative is lost in rounding, as for `m_ν → 0` where the density only
/// depends on `m_ν²`.
fn standard_errors<M: BinnedModel + ?Sized>(
    problem: &Problem<'_, M>,
    params: &[f64],
) -> (Vec<f64>, bool) {
    let k = problem.free.len();
    if k == 0 {
        return (Vec::new(), true);
    }
    let j = problem.jacobian(params);
    let floor = FD_NOISE_FLOOR * problem.model_norm(params);
    let unresolved = problem
        .free
        .iter()
        .enumerate()
        .find(|&(col, &p)| !(j.column(col).norm() * 2.0 * fd_step(params[p]) > floor));
    if let Some((_, &p)) = unresolved {
        tracing::debug!(parameter = p, value = params[p], "chi-square is flat in a free parameter");
        return (vec![f64::NAN; k], false);
    }
    let info = j.transpose() * &j;
    let errors = info.try_inverse().and_then(|cov| {
        let diag: Vec<f64> = (0..k).map(|i| cov[(i, i)]).collect();
        diag.iter()
            .all(|v| v.is_finite() && *v >= 0.0)
            .then(|| diag.iter().map(|v| v.sqrt()).collect::<Vec<f64>>())
    });
    match errors {
        Some(e) => (e, true),
        None => (vec![f64::NAN; k], false),
    }
}
