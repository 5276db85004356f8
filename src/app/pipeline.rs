//! Shared simulate / fit workflow used by every subcommand.
//!
//! validate config -> physics model -> sampler loop -> histograms -> (persist) -> fit
//!
//! The CLI handlers only add presentation (logging, printing, exports).

use rand::Rng;

use crate::domain::{FitConfig, HistogramSelection, SimulationConfig};
use crate::error::AppError;
use crate::fit::{SpectrumShape, fit_spectrum};
use crate::histogram::{Histogram, HistogramId, SpectrumHistograms};
use crate::io::RunArchive;
use crate::physics::SpectrumModel;
use crate::sampling::{
    ENVELOPE_SCAN_POINTS, ProgressTracker, SamplerSettings, SamplingStats, SpectrumSampler,
};

/// Everything one simulation produces.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub model: SpectrumModel,
    pub stats: SamplingStats,
    pub histograms: SpectrumHistograms,
    /// Largest density / envelope ratio over the sampling interval.
    pub max_ratio: f64,
}

/// Sample `config.events` decays and histogram them.
///
/// The configuration is validated before the first random draw, so an invalid
/// transition leaves `rng` untouched.
pub fn generate_spectrum<R: Rng, F: FnMut(f64)>(
    config: &SimulationConfig,
    rng: &mut R,
    on_progress: F,
) -> Result<SimulationOutput, AppError> {
    config.validate()?;
    let model = SpectrumModel::from_config(config)?;
    let interval = config.sampling_interval()?;
    let domain = config.histogram_domain()?;
    let neutrino_mass = config.constants.neutrino_mass;

    let settings = SamplerSettings {
        interval,
        envelope_scale: config.envelope_scale,
        neutrino_mass,
        resolution: config.resolution,
        target_events: config.events,
        max_draws: config.max_draws,
    };
    let mut histograms = SpectrumHistograms::new(config.bins, &domain, config.resolution > 0.0)?;
    let mut sampler = SpectrumSampler::new(&model, settings, rng)?;

    let max_ratio = sampler
        .envelope()
        .max_ratio(&model, &interval, neutrino_mass, ENVELOPE_SCAN_POINTS);
    if max_ratio > 1.0 {
        tracing::warn!(
            max_ratio,
            envelope_scale = config.envelope_scale,
            "envelope lies below the density; accepted energies will be biased \
             (raise --envelope-scale)"
        );
    }
    tracing::info!(
        q = model.q,
        lo = interval.min,
        hi = interval.max,
        events = config.events,
        seed = config.seed,
        "sampling started"
    );

    let mut progress = ProgressTracker::new(config.events, config.progress_step, on_progress);
    let mut accepted = 0u64;
    for event in sampler.by_ref() {
        let event = event?;
        histograms.record(&event);
        accepted += 1;
        progress.update(accepted);
    }
    let stats = sampler.stats();
    tracing::info!(
        accepted = stats.accepted,
        draws = stats.draws,
        acceptance = stats.acceptance_rate(),
        "sampling finished"
    );

    Ok(SimulationOutput {
        model,
        stats,
        histograms,
        max_ratio,
    })
}

/// One fitted channel.
#[derive(Debug, Clone)]
pub struct HistogramFit {
    pub id: HistogramId,
    pub histogram: Histogram,
    pub result: crate::domain::FitResult,
}

/// Spectrum shape matching the physics an archive was generated with.
pub fn archive_shape(archive: &RunArchive) -> Result<SpectrumShape, AppError> {
    let model = SpectrumModel::new(
        archive.config.transition,
        archive.config.constants,
        Some(archive.q_value),
    )?;
    Ok(SpectrumShape::new(model))
}

/// Fit the selected channels of a stored run.
pub fn fit_archive(
    archive: &RunArchive,
    config: &FitConfig,
    selection: HistogramSelection,
) -> Result<Vec<HistogramFit>, AppError> {
    let shape = archive_shape(archive)?;
    let ids: Vec<HistogramId> = match selection {
        HistogramSelection::True => vec![HistogramId::True],
        HistogramSelection::Smeared => vec![HistogramId::Smeared],
        HistogramSelection::Both => HistogramId::ALL
            .into_iter()
            .filter(|id| archive.histograms.contains_key(id.key()))
            .collect(),
    };

    let mut fits = Vec::with_capacity(ids.len());
    for id in ids {
        let histogram = archive.histogram(id)?.clone();
        let result = fit_spectrum(&histogram, &shape, config)?;
        tracing::info!(
            histogram = id.key(),
            converged = result.is_converged(),
            chi2 = result.chi_square,
            "fit finished"
        );
        fits.push(HistogramFit {
            id,
            histogram,
            result,
        });
    }
    Ok(fits)
}
