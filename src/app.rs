//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments into validated configs
//! - runs the simulation and persists it
//! - fits stored histograms
//! - prints reports/plots and writes optional exports

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use crate::cli::{
    Cli, Command, CompareArgs, FitArgs, FitCommandArgs, RunArgs, SimulateArgs, SimulationArgs,
};
use crate::domain::{
    EnergyWindow, FitConfig, FitResult, LowerLimit, NuclearTransition, PhysicalConstants,
    SimulationConfig,
};
use crate::error::AppError;
use crate::histogram::compare_shapes;
use crate::io::{HistogramStore, JsonStore, RunArchive, write_histogram_csv};
use crate::report::{
    compute_bin_residuals, fitted_params, format_comparison, format_fit_summary,
    format_pull_table, format_simulation_summary, largest_pulls,
};

pub mod pipeline;

/// Entry point for the `bspec` binary.
pub fn run() -> Result<(), AppError> {
    execute(Cli::parse())
}

pub fn execute(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Command::Simulate(args) => handle_simulate(args).map(|_| ()),
        Command::Fit(args) => handle_fit(args),
        Command::Run(args) => handle_run(args),
        Command::Compare(args) => handle_compare(args),
    }
}

fn handle_simulate(args: SimulateArgs) -> Result<RunArchive, AppError> {
    let config = simulation_config_from_args(&args.simulation)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let output = pipeline::generate_spectrum(&config, &mut rng, log_progress)?;

    let archive = RunArchive::new(&config, output.model.q, output.stats, &output.histograms);
    let mut store = JsonStore::new(&args.store.dir);
    store.write_archive(&args.store.run, &archive)?;
    tracing::info!(run = %args.store.run, dir = %args.store.dir.display(), "run stored");

    if let Some(dir) = &args.simulation.export_csv {
        std::fs::create_dir_all(dir)
            .map_err(|e| AppError::io(format!("Failed to create '{}'", dir.display()), e))?;
        for (id, h) in output.histograms.channels() {
            let path = dir.join(format!("{}_{}.csv", args.store.run, id.key()));
            write_histogram_csv(&path, h)?;
        }
    }

    println!(
        "{}",
        format_simulation_summary(
            &args.store.run,
            &config,
            output.model.q,
            &output.stats,
            &output.histograms
        )
    );
    Ok(archive)
}

fn handle_fit(args: FitCommandArgs) -> Result<(), AppError> {
    let store = JsonStore::new(&args.store.dir);
    let archive = store.read_archive(&args.store.run)?;
    fit_and_report(&args.store.run, &archive, &args.fit)
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let simulate = SimulateArgs {
        store: args.store.clone(),
        simulation: args.simulation,
    };
    let archive = handle_simulate(simulate)?;
    fit_and_report(&args.store.run, &archive, &args.fit)
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let store = JsonStore::new(&args.store.dir);
    let other_run = args.other_run.as_deref().unwrap_or(&args.store.run);
    let a = store.read(&args.store.run, args.first)?;
    let b = store.read(other_run, args.second)?;
    let cmp = compare_shapes(&a, &b)?;
    println!(
        "{}",
        format_comparison(
            &format!("{}:{}", args.store.run, args.first.key()),
            &format!("{other_run}:{}", args.second.key()),
            &cmp
        )
    );
    Ok(())
}

#[derive(Debug, Serialize)]
struct FitExport<'a> {
    run: &'a str,
    fits: BTreeMap<&'static str, &'a FitResult>,
}

fn fit_and_report(run: &str, archive: &RunArchive, args: &FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(args);
    let fits = pipeline::fit_archive(archive, &config, args.histogram)?;
    let shape = pipeline::archive_shape(archive)?;
    let true_mass = Some(archive.config.constants.neutrino_mass);

    for fit in &fits {
        println!("{}", format_fit_summary(&fit.histogram, &fit.result, true_mass));

        let params = fitted_params(&shape, &fit.result);
        if args.pulls > 0 {
            let residuals = compute_bin_residuals(
                &fit.histogram,
                &shape,
                &params,
                config.evaluation,
                config.fit_range,
            );
            let table = format_pull_table(&largest_pulls(&residuals, args.pulls));
            println!("Largest pulls:\n{table}");
        }
        if args.plot {
            let curve =
                crate::plot::sample_model_curve(&fit.histogram, &shape, &params, args.width);
            let plot = crate::plot::render_histogram_plot(
                &fit.histogram,
                Some(&curve),
                args.width,
                args.height,
            );
            println!("{plot}");
        }
    }

    if let Some(path) = &args.export_fit {
        let export = FitExport {
            run,
            fits: fits.iter().map(|f| (f.id.key(), &f.result)).collect(),
        };
        write_json(path, &export)?;
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create '{}'", path.display()), e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .map_err(|e| AppError::Format(format!("failed to write '{}': {e}", path.display())))
}

/// Progress callback used by the CLI.
fn log_progress(fraction: f64) {
    tracing::info!("Current progress: {:.0}%", fraction * 100.0);
}

pub fn simulation_config_from_args(args: &SimulationArgs) -> Result<SimulationConfig, AppError> {
    let seed = match args.seed {
        Some(seed) => seed,
        None => {
            let seed = chrono::Utc::now().timestamp_micros() as u64;
            tracing::info!(seed, "no --seed given; using the clock");
            seed
        }
    };
    let lower_limit = match args.lower_limit {
        Some(lo) => LowerLimit::Absolute(lo),
        None => LowerLimit::EndpointWindow(args.window),
    };
    let domain = match (args.domain_min, args.domain_max) {
        (Some(lo), Some(hi)) => Some(EnergyWindow::new(lo, hi)?),
        (None, None) => None,
        _ => {
            return Err(AppError::config(
                "--domain-min and --domain-max must be given together.",
            ));
        }
    };

    let config = SimulationConfig {
        transition: NuclearTransition {
            z_initial: args.z_initial,
            mass_initial: args.mass_initial,
            z_final: args.z_final,
            mass_final: args.mass_final,
        },
        constants: PhysicalConstants {
            neutrino_mass: args.neutrino_mass,
            ..PhysicalConstants::default()
        },
        q_override: args.q_value,
        events: args.events,
        envelope_scale: args.envelope_scale,
        resolution: args.resolution,
        lower_limit,
        domain,
        bins: args.bins,
        seed,
        max_draws: args.max_draws,
        progress_step: args.progress_step,
    };
    config.validate()?;
    Ok(config)
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        mass_init: args.mass_init,
        fix_mass: args.fix_mass,
        norm_init: args.norm_init,
        fix_norm: args.fix_norm,
        fit_range: args.fit_min.zip(args.fit_max),
        evaluation: args.evaluation,
        max_iterations: args.max_iterations,
        restarts: args.restarts,
        restart_mass_max: args.restart_mass_max,
    }
}
