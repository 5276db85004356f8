//! Command-line parsing for the beta spectrum simulator.
//!
//! Argument parsing and command dispatch stay separate from the physics,
//! sampling and fitting code; `app` turns these structs into validated
//! `SimulationConfig` / `FitConfig` values.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{BinEvaluation, HistogramSelection};
use crate::histogram::HistogramId;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "bspec",
    version,
    about = "Beta-decay electron spectrum simulator and neutrino-mass fitter"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a spectrum and persist its histograms under a run name.
    Simulate(SimulateArgs),
    /// Load a persisted run and fit the spectrum shape.
    Fit(FitCommandArgs),
    /// Simulate, persist, then fit in one go.
    Run(RunArgs),
    /// Chi-square shape test between two stored histograms.
    Compare(CompareArgs),
}

/// Where runs are stored.
#[derive(Debug, Args, Clone)]
pub struct StoreArgs {
    /// Run name (file stem of the archive).
    #[arg(long, default_value = "spectrum")]
    pub run: String,

    /// Directory holding run archives.
    #[arg(long, default_value = "runs")]
    pub dir: PathBuf,
}

/// Physics and sampling options.
#[derive(Debug, Args, Clone)]
pub struct SimulationArgs {
    /// Atomic number of the parent nucleus.
    #[arg(long, default_value_t = 1)]
    pub z_initial: u32,

    /// Atomic number of the daughter nucleus.
    #[arg(long, default_value_t = 2)]
    pub z_final: u32,

    /// Parent atomic mass (u).
    #[arg(long, default_value_t = 3.0160492)]
    pub mass_initial: f64,

    /// Daughter atomic mass (u).
    #[arg(long, default_value_t = 3.0160293)]
    pub mass_final: f64,

    /// Use this Q-value (eV) instead of the mass difference (18590 for tritium).
    #[arg(long)]
    pub q_value: Option<f64>,

    /// Neutrino mass used for generation (eV).
    #[arg(long, default_value_t = 0.2)]
    pub neutrino_mass: f64,

    /// Number of accepted events.
    #[arg(short = 'n', long, default_value_t = 100_000)]
    pub events: u64,

    /// Envelope scale h (envelope = h * N(Q/2)).
    #[arg(long, default_value_t = 2e-5)]
    pub envelope_scale: f64,

    /// Gaussian detector resolution (eV); 0 disables the smeared histogram.
    #[arg(long, default_value_t = 1.0)]
    pub resolution: f64,

    /// Sample only the last WINDOW eV below Q.
    #[arg(long, default_value_t = 25.0, conflicts_with = "lower_limit")]
    pub window: f64,

    /// Absolute lower sampling limit (eV); use 0 for the full spectrum.
    #[arg(long)]
    pub lower_limit: Option<f64>,

    /// Histogram domain lower edge (eV); defaults to the sampling interval.
    #[arg(long, requires = "domain_max")]
    pub domain_min: Option<f64>,

    /// Histogram domain upper edge (eV).
    #[arg(long, requires = "domain_min")]
    pub domain_max: Option<f64>,

    /// Number of histogram bins.
    #[arg(long, default_value_t = 100)]
    pub bins: usize,

    /// Random seed; derived from the clock (and logged) when omitted.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Give up after this many candidate draws.
    #[arg(long, default_value_t = 1_000_000_000)]
    pub max_draws: u64,

    /// Progress is logged every STEP of the target (fraction).
    #[arg(long, default_value_t = 0.1)]
    pub progress_step: f64,

    /// Also write each histogram as `<run>_<name>.csv` into this directory.
    #[arg(long, value_name = "DIR")]
    pub export_csv: Option<PathBuf>,
}

/// Fit options.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Which histogram(s) to fit.
    #[arg(long, value_enum, default_value_t = HistogramSelection::Both)]
    pub histogram: HistogramSelection,

    /// Starting neutrino mass (eV).
    #[arg(long, default_value_t = 0.2)]
    pub mass_init: f64,

    /// Keep the neutrino mass at its starting value.
    #[arg(long)]
    pub fix_mass: bool,

    /// Starting normalization; estimated from the data when omitted.
    #[arg(long)]
    pub norm_init: Option<f64>,

    /// Keep the normalization at its starting value.
    #[arg(long)]
    pub fix_norm: bool,

    /// Fit range lower bound (eV).
    #[arg(long, requires = "fit_max")]
    pub fit_min: Option<f64>,

    /// Fit range upper bound (eV).
    #[arg(long, requires = "fit_min")]
    pub fit_max: Option<f64>,

    /// How the model is compared with a bin.
    #[arg(long, value_enum, default_value_t = BinEvaluation::Integral)]
    pub evaluation: BinEvaluation,

    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Number of neutrino-mass starting points (fits run in parallel).
    #[arg(long, default_value_t = 1)]
    pub restarts: usize,

    /// Upper end of the restart grid (eV).
    #[arg(long, default_value_t = 5.0)]
    pub restart_mass_max: f64,

    /// Show the N bins with the largest pulls.
    #[arg(long, default_value_t = 0)]
    pub pulls: usize,

    /// Render an ASCII plot of each fitted histogram.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Write the fit results as JSON.
    #[arg(long, value_name = "JSON")]
    pub export_fit: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub simulation: SimulationArgs,
}

#[derive(Debug, Args, Clone)]
pub struct FitCommandArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub fit: FitArgs,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    #[command(flatten)]
    pub simulation: SimulationArgs,
    #[command(flatten)]
    pub fit: FitArgs,
}

#[derive(Debug, Args, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Histogram taken from `--run`.
    #[arg(long, value_enum, default_value_t = HistogramId::True)]
    pub first: HistogramId,

    /// Run holding the second histogram (defaults to `--run`).
    #[arg(long)]
    pub other_run: Option<String>,

    /// Histogram taken from the second run.
    #[arg(long, value_enum, default_value_t = HistogramId::Smeared)]
    pub second: HistogramId,
}
