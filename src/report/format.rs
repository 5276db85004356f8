//! Formatted terminal output.
//!
//! Formatting lives in one place so the physics and fitting code stays free of
//! presentation concerns.

use crate::domain::{FitResult, FitStatus, SimulationConfig};
use crate::histogram::{Histogram, ShapeComparison, SpectrumHistograms};
use crate::report::BinResidual;
use crate::sampling::SamplingStats;

/// Header plus per-channel summary of one simulation run.
pub fn format_simulation_summary(
    run: &str,
    config: &SimulationConfig,
    q_value: f64,
    stats: &SamplingStats,
    histograms: &SpectrumHistograms,
) -> String {
    let mut out = String::new();

    out.push_str("=== bspec - beta spectrum simulation ===\n");
    out.push_str(&format!("Run: {run}\n"));
    out.push_str(&format!(
        "Transition: Z {} -> {} ({}) | Q = {:.3} eV{}\n",
        config.transition.z_initial,
        config.transition.z_final,
        config
            .transition
            .charge()
            .map(|c| c.display_name())
            .unwrap_or("invalid"),
        q_value,
        if config.q_override.is_some() { " (override)" } else { "" },
    ));
    out.push_str(&format!(
        "m_nu = {} eV | h = {:e} | resolution = {} eV | seed = {}\n",
        config.constants.neutrino_mass, config.envelope_scale, config.resolution, config.seed
    ));
    out.push_str(&format!(
        "Events: {} accepted of {} draws (acceptance {:.4})\n",
        stats.accepted,
        stats.draws,
        stats.acceptance_rate()
    ));

    out.push_str("\nHistograms:\n");
    for (id, h) in histograms.channels() {
        out.push_str(&format!("- {:<7} {}\n", id.key(), format_histogram_line(h)));
    }
    out
}

/// One-line description of a histogram's binning and fill state.
pub fn format_histogram_line(h: &Histogram) -> String {
    let mode = h
        .mode_bin()
        .map(|i| format!("{:.3}", h.bin_center(i)))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} bins over [{:.3}, {:.3}] eV | entries={} underflow={} overflow={} | mode at {mode} eV",
        h.bins(),
        h.min,
        h.max,
        h.entries,
        h.underflow,
        h.overflow,
    )
}

/// Parameters, goodness of fit and status of one fit.
pub fn format_fit_summary(
    histogram: &Histogram,
    result: &FitResult,
    true_mass: Option<f64>,
) -> String {
    let mut out = String::new();

    let status = match &result.status {
        FitStatus::Converged if result.covariance_ok => "converged".to_string(),
        FitStatus::Converged => "converged (singular covariance)".to_string(),
        FitStatus::Failed { reason } => format!("FAILED: {reason}"),
    };
    out.push_str(&format!("Fit of '{}': {status}\n", histogram.name));
    for (name, value) in &result.parameter_estimates {
        let (err, fixed) = match result.uncertainty(name) {
            Some(e) if e == 0.0 => (fmt_num(e), "  (fixed)"),
            Some(e) if e.is_finite() => (fmt_num(e), ""),
            _ => ("n/a".to_string(), ""),
        };
        out.push_str(&format!("  {name:<5} = {} ± {err}{fixed}\n", fmt_num(*value)));
    }
    if !result.covariance_ok {
        out.push_str(
            "  uncertainties unavailable: chi-square is flat in a free parameter \
             (m_nu near 0 only enters as m_nu^2)\n",
        );
    }
    out.push_str(&format!(
        "  chi2/ndf = {:.3}/{} = {:.3} | p = {:.4} | iterations = {}\n",
        result.chi_square,
        result.degrees_of_freedom,
        result.reduced_chi_square(),
        result.p_value,
        result.iterations
    ));
    if let (Some(truth), Some(m)) = (true_mass, result.estimate("m_nu")) {
        out.push_str(&format!(
            "  simulated m_nu = {truth} eV (fit - true = {:+.4} eV)\n",
            m - truth
        ));
    }
    out
}

/// Table of bin residuals.
pub fn format_pull_table(rows: &[BinResidual]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>12} {:>12} {:>12} {:>8}\n",
            "center", "observed", "expected", "pull"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<12} {:-<12} {:-<8}", "", "", "", "").trim_end());
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{:>12.3} {:>12.1} {:>12.1} {:>8.2}\n",
            r.center, r.observed, r.expected, r.pull
        ));
    }
    out
}

pub fn format_comparison(a: &str, b: &str, cmp: &ShapeComparison) -> String {
    format!(
        "Shape comparison '{a}' vs '{b}': chi2/ndf = {:.3}/{} | p = {:.4}\n",
        cmp.chi_square, cmp.degrees_of_freedom, cmp.p_value
    )
}

fn fmt_num(v: f64) -> String {
    if v == 0.0 || !v.is_finite() {
        return format!("{v}");
    }
    let mag = v.abs();
    if (1e-3..1e5).contains(&mag) {
        format!("{v:.6}")
    } else {
        format!("{v:.6e}")
    }
}
