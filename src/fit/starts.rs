//! Starting points and multi-start fitting.
//!
//! The chi-square surface in `m_ν` is shallow far from the endpoint and can
//! hold a spurious minimum near `m_ν = 0`, so the spectrum fit may be run from
//! several log-spaced masses. Each start is an independent fit; the lowest
//! converged chi-square wins, ties broken by start order so the result does not
//! depend on thread scheduling.

use rayon::prelude::*;

use crate::domain::{FitConfig, FitResult, FitStatus};
use crate::error::AppError;
use crate::fit::fitter::{FitOptions, fit, select_bins};
use crate::fit::model::{BinnedModel, MASS_PARAM, NORM_PARAM, SpectrumShape};
use crate::histogram::Histogram;

/// Lowest mass used when building a restart grid (eV).
const RESTART_MASS_MIN: f64 = 0.05;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > min) {
        return Err(AppError::config(format!(
            "Invalid log range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::config("Log-spaced grids need at least 2 steps."));
    }

    let ln_min = min.ln();
    let step = (max.ln() - ln_min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| (ln_min + step * i as f64).exp()).collect())
}

/// Neutrino-mass starting values: the configured start first, then the grid.
pub fn mass_starts(config: &FitConfig) -> Result<Vec<f64>, AppError> {
    let mut starts = vec![config.mass_init];
    if config.fix_mass || config.restarts <= 1 {
        return Ok(starts);
    }
    let extra = config.restarts - 1;
    if extra == 1 {
        starts.push(config.restart_mass_max);
    } else {
        starts.extend(log_space(RESTART_MASS_MIN, config.restart_mass_max, extra)?);
    }
    Ok(starts)
}

/// Normalization minimising the Neyman chi-square for a fixed shape.
///
/// With `μ_i = C f_i` and `σ_i² = y_i` the optimum is `Σ f_i / Σ (f_i² / y_i)`.
pub fn auto_normalization<M: BinnedModel + ?Sized>(
    histogram: &Histogram,
    model: &M,
    params: &[f64],
    norm_index: usize,
    options: &FitOptions,
) -> Option<f64> {
    let mut unit = params.to_vec();
    unit[norm_index] = 1.0;
    let (num, den) = select_bins(histogram, options.fit_range)
        .iter()
        .map(|b| {
            let f = model.bin_content(b.lo, b.hi, &unit, options.evaluation);
            (f, f * f / b.observed)
        })
        .fold((0.0, 0.0), |(n, d), (f, g)| (n + f, d + g));
    let c = num / den;
    (c.is_finite() && c > 0.0).then_some(c)
}

/// Run one fit per start and keep the best converged one.
///
/// When no start converges the first start's result is returned so the
/// failure reason is reported.
pub fn fit_with_restarts<M: BinnedModel + ?Sized>(
    histogram: &Histogram,
    model: &M,
    starts: &[Vec<f64>],
    fixed: &[bool],
    options: &FitOptions,
) -> Result<FitResult, AppError> {
    if starts.is_empty() {
        return Err(AppError::fit("No starting points supplied."));
    }

    let results: Vec<(usize, Result<FitResult, AppError>)> = starts
        .par_iter()
        .enumerate()
        .map(|(idx, p0)| (idx, fit(histogram, model, p0, fixed, options)))
        .collect();

    let mut best: Option<(usize, FitResult)> = None;
    let mut first: Option<Result<FitResult, AppError>> = None;
    for (idx, res) in results {
        let converged = res.as_ref().is_ok_and(FitResult::is_converged);
        tracing::debug!(start = idx, converged, "restart finished");
        match res {
            Ok(r) if r.is_converged() && r.chi_square.is_finite() => {
                let better = match &best {
                    None => true,
                    Some((best_idx, b)) => {
                        r.chi_square < b.chi_square
                            || (r.chi_square == b.chi_square && idx < *best_idx)
                    }
                };
                if better {
                    best = Some((idx, r));
                }
            }
            other => {
                if idx == 0 {
                    first = Some(other);
                }
            }
        }
    }

    match (best, first) {
        (Some((_, r)), _) => Ok(r),
        (None, Some(first)) => first,
        (None, None) => Err(AppError::fit("No fit result produced.")),
    }
}

/// Fit the spectrum shape to `histogram` as configured.
pub fn fit_spectrum(
    histogram: &Histogram,
    shape: &SpectrumShape,
    config: &FitConfig,
) -> Result<FitResult, AppError> {
    if !config.mass_init.is_finite() {
        return Err(AppError::config("Initial neutrino mass must be finite."));
    }
    if config.max_iterations == 0 {
        return Err(AppError::config("Fit needs at least one iteration."));
    }
    let options = FitOptions {
        evaluation: config.evaluation,
        fit_range: config.fit_range,
        max_iterations: config.max_iterations,
        ..FitOptions::default()
    };

    let mut fixed = [false; 2];
    fixed[MASS_PARAM] = config.fix_mass;
    fixed[NORM_PARAM] = config.fix_norm;

    let mut starts = Vec::new();
    for m in mass_starts(config)? {
        let mut p = [0.0; 2];
        p[MASS_PARAM] = m;
        p[NORM_PARAM] = match config.norm_init {
            Some(c) => c,
            None => auto_normalization(histogram, shape, &[m, 1.0], NORM_PARAM, &options)
                .ok_or_else(|| {
                    AppError::fit(format!(
                        "Cannot estimate a normalization for '{}' at m_nu={m}.",
                        histogram.name
                    ))
                })?,
        };
        starts.push(p.to_vec());
    }
    tracing::debug!(starts = starts.len(), "fitting spectrum");

    let result = fit_with_restarts(histogram, shape, &starts, &fixed, &options)?;
    if let FitStatus::Failed { reason } = &result.status {
        tracing::warn!(histogram = %histogram.name, %reason, "fit did not converge");
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BinEvaluation, NuclearTransition, PhysicalConstants};
    use crate::physics::SpectrumModel;

    fn shape() -> SpectrumShape {
        SpectrumShape::new(
            SpectrumModel::new(NuclearTransition::TRITIUM, PhysicalConstants::default(), None)
                .unwrap(),
        )
    }

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert_eq!(v.len(), 5);
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[2] - 1.0).abs() < 1e-12);
        assert!((v[4] - 10.0).abs() < 1e-12);
        assert!(log_space(1.0, 1.0, 3).is_err());
        assert!(log_space(0.0, 1.0, 3).is_err());
        assert!(log_space(0.1, 1.0, 1).is_err());
    }

    #[test]
    fn mass_starts_follow_config() {
        let mut cfg = FitConfig::default();
        assert_eq!(mass_starts(&cfg).unwrap(), vec![0.2]);
        cfg.restarts = 2;
        assert_eq!(mass_starts(&cfg).unwrap(), vec![0.2, 5.0]);
        cfg.restarts = 4;
        let s = mass_starts(&cfg).unwrap();
        assert_eq!(s.len(), 4);
        assert!((s[1] - RESTART_MASS_MIN).abs() < 1e-12);
        assert!((s[3] - 5.0).abs() < 1e-9);
        cfg.fix_mass = true;
        assert_eq!(mass_starts(&cfg).unwrap().len(), 1);
    }

    #[test]
    fn auto_normalization_recovers_scale_of_expected_counts() {
        let s = shape();
        let template = Histogram::new("E_e", 20, s.model.q - 25.0, s.model.q).unwrap();
        let h = s.expected_histogram(&template, 0.2, 3e-10, BinEvaluation::Integral);
        let options = FitOptions::default();
        let c = auto_normalization(&h, &s, &[0.2, 1.0], NORM_PARAM, &options).unwrap();
        assert!((c / 3e-10 - 1.0).abs() < 1e-10);

        let empty = template.clone();
        assert!(auto_normalization(&empty, &s, &[0.2, 1.0], NORM_PARAM, &options).is_none());
    }

    #[test]
    fn restarts_pick_lowest_chi_square_deterministically() {
        let s = shape();
        let template = Histogram::new("E_e", 50, s.model.q - 25.0, s.model.q).unwrap();
        let h = s.expected_histogram(&template, 1.5, 4e-10, BinEvaluation::Integral);
        let cfg = FitConfig {
            mass_init: 0.3,
            restarts: 4,
            ..FitConfig::default()
        };
        let a = fit_spectrum(&h, &s, &cfg).unwrap();
        let b = fit_spectrum(&h, &s, &cfg).unwrap();
        assert!(a.is_converged(), "{:?}", a.status);
        assert!((a.estimate("m_nu").unwrap() - 1.5).abs() < 1e-3);
        assert_eq!(a.estimate("m_nu"), b.estimate("m_nu"));
        assert_eq!(a.chi_square, b.chi_square);
    }

    #[test]
    fn unusable_histogram_is_an_error() {
        let s = shape();
        let template = Histogram::new("E_e", 10, s.model.q - 25.0, s.model.q).unwrap();
        assert!(fit_spectrum(&template, &s, &FitConfig::default()).is_err());
        let options = FitOptions::default();
        assert!(fit_with_restarts(&template, &s, &[], &[false, false], &options).is_err());
    }
}
