//! Von Neumann acceptance–rejection sampler.
//!
//! For each iteration:
//!
//! 1. draw `T` uniformly in the sampling interval
//! 2. draw `u` uniformly in `[0, 1)`
//! 3. accept iff `u <= N(T) / (h · N(Q/2))`
//!
//! The envelope height is computed once per sampler. The scale `h` changes how
//! many candidates are wasted, never the shape of the accepted distribution,
//! as long as the envelope stays above the density everywhere on the interval.
//! [`Envelope::max_ratio`] checks exactly that.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::domain::EnergyWindow;
use crate::error::AppError;
use crate::physics::SpectrumModel;

/// Grid resolution used when scanning the density for its maximum.
pub const ENVELOPE_SCAN_POINTS: usize = 2001;

/// Constant envelope `h · N(Q/2; m_ν, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub scale: f64,
    /// `N(Q/2; m_ν, 1)`.
    pub reference: f64,
}

impl Envelope {
    pub fn new(model: &SpectrumModel, scale: f64, neutrino_mass: f64) -> Result<Self, AppError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(AppError::config(format!("Envelope scale must be > 0, got {scale}.")));
        }
        let reference = model.decay_density(0.5 * model.q, neutrino_mass, 1.0);
        if !(reference.is_finite() && reference > 0.0) {
            return Err(AppError::config(format!(
                "Decay density vanishes at Q/2 (m_nu = {neutrino_mass} eV); no usable envelope."
            )));
        }
        Ok(Self { scale, reference })
    }

    pub fn height(&self) -> f64 {
        self.scale * self.reference
    }

    /// Acceptance threshold for a candidate with the given density.
    pub fn acceptance(&self, density: f64) -> f64 {
        density / self.height()
    }

    /// Largest `N(T) / envelope` on an even grid over `interval`.
    ///
    /// Values above 1 mean the envelope clips the density and the accepted
    /// sample under-represents the high-density region.
    pub fn max_ratio(
        &self,
        model: &SpectrumModel,
        interval: &EnergyWindow,
        neutrino_mass: f64,
        points: usize,
    ) -> f64 {
        minimum_scale(model, interval, neutrino_mass, points) * self.reference / self.height()
    }
}

/// Smallest envelope scale `h` that keeps the envelope above the density on
/// `interval` (up to grid resolution).
pub fn minimum_scale(
    model: &SpectrumModel,
    interval: &EnergyWindow,
    neutrino_mass: f64,
    points: usize,
) -> f64 {
    let reference = model.decay_density(0.5 * model.q, neutrino_mass, 1.0);
    let points = points.max(2);
    let step = interval.width() / (points as f64 - 1.0);
    let max_density = (0..points)
        .map(|i| model.decay_density(interval.min + step * i as f64, neutrino_mass, 1.0))
        .fold(0.0_f64, f64::max);
    max_density / reference
}

/// Sampler parameters; see `SimulationConfig` for the CLI-facing version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerSettings {
    pub interval: EnergyWindow,
    pub envelope_scale: f64,
    pub neutrino_mass: f64,
    /// Gaussian resolution (eV); zero disables smearing.
    pub resolution: f64,
    pub target_events: u64,
    pub max_draws: u64,
}

/// One accepted decay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectrumEvent {
    pub true_energy: f64,
    /// Resolution-smeared energy, when smearing is enabled.
    pub smeared_energy: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Sampling,
    Done,
}

/// Draw counters for one sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SamplingStats {
    pub draws: u64,
    pub accepted: u64,
}

impl SamplingStats {
    pub fn acceptance_rate(&self) -> f64 {
        if self.draws == 0 {
            0.0
        } else {
            self.accepted as f64 / self.draws as f64
        }
    }
}

/// Lazy, finite stream of accepted events.
///
/// Yields exactly `target_events` events and then `None`, unless the draw
/// bound is hit first, in which case it yields one `SamplingStarvation` error
/// and stops. Rejected candidates are never observable.
pub struct SpectrumSampler<'a, R: Rng> {
    model: SpectrumModel,
    settings: SamplerSettings,
    envelope: Envelope,
    smear: Option<Normal<f64>>,
    rng: &'a mut R,
    stats: SamplingStats,
    state: SamplerState,
}

impl<'a, R: Rng> SpectrumSampler<'a, R> {
    pub fn new(
        model: &SpectrumModel,
        settings: SamplerSettings,
        rng: &'a mut R,
    ) -> Result<Self, AppError> {
        if settings.target_events == 0 {
            return Err(AppError::config("Event target must be > 0."));
        }
        let interval = settings.interval;
        if !(interval.min >= 0.0 && interval.min < interval.max && interval.max <= model.q) {
            return Err(AppError::config(format!(
                "Sampling interval [{}, {}] must lie within [0, Q = {}].",
                settings.interval.min, settings.interval.max, model.q
            )));
        }
        let envelope = Envelope::new(model, settings.envelope_scale, settings.neutrino_mass)?;
        let smear = if settings.resolution > 0.0 {
            Some(
                Normal::new(0.0, settings.resolution)
                    .map_err(|e| AppError::config(format!("Resolution distribution error: {e}")))?,
            )
        } else if settings.resolution == 0.0 {
            None
        } else {
            return Err(AppError::config(format!(
                "Detector resolution must be >= 0, got {}.",
                settings.resolution
            )));
        };

        Ok(Self {
            model: *model,
            settings,
            envelope,
            smear,
            rng,
            stats: SamplingStats::default(),
            state: SamplerState::Sampling,
        })
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn stats(&self) -> SamplingStats {
        self.stats
    }

    pub fn state(&self) -> SamplerState {
        self.state
    }
}

impl<R: Rng> Iterator for SpectrumSampler<'_, R> {
    type Item = Result<SpectrumEvent, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == SamplerState::Done {
            return None;
        }
        let SamplerSettings {
            interval,
            neutrino_mass,
            target_events,
            max_draws,
            ..
        } = self.settings;

        while self.stats.accepted < target_events {
            if self.stats.draws >= max_draws {
                self.state = SamplerState::Done;
                return Some(Err(AppError::SamplingStarvation {
                    accepted: self.stats.accepted,
                    target: target_events,
                    draws: self.stats.draws,
                }));
            }
            self.stats.draws += 1;

            let t = self.rng.gen_range(interval.min..interval.max);
            let u: f64 = self.rng.gen_range(0.0..1.0);
            let p = self
                .envelope
                .acceptance(self.model.decay_density(t, neutrino_mass, 1.0));
            if u > p {
                continue;
            }

            self.stats.accepted += 1;
            if self.stats.accepted == target_events {
                self.state = SamplerState::Done;
            }
            let smeared_energy = self.smear.as_ref().map(|n| t + n.sample(&mut *self.rng));
            return Some(Ok(SpectrumEvent {
                true_energy: t,
                smeared_energy,
            }));
        }

        self.state = SamplerState::Done;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NuclearTransition, PhysicalConstants};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn tritium() -> SpectrumModel {
        SpectrumModel::new(NuclearTransition::TRITIUM, PhysicalConstants::default(), None).unwrap()
    }

    fn endpoint_settings(model: &SpectrumModel, scale: f64, events: u64) -> SamplerSettings {
        SamplerSettings {
            interval: EnergyWindow::new(model.q - 25.0, model.q).unwrap(),
            envelope_scale: scale,
            neutrino_mass: 0.2,
            resolution: 1.0,
            target_events: events,
            max_draws: u64::MAX,
        }
    }

    #[test]
    fn default_envelope_covers_the_endpoint_window() {
        let model = tritium();
        let interval = EnergyWindow::new(model.q - 25.0, model.q).unwrap();
        let envelope = Envelope::new(&model, 2e-5, 0.2).unwrap();
        let ratio = envelope.max_ratio(&model, &interval, 0.2, ENVELOPE_SCAN_POINTS);
        assert!(ratio > 0.0 && ratio <= 1.0, "ratio={ratio}");
    }

    #[test]
    fn full_range_needs_a_larger_envelope() {
        // The density peaks well below Q/2, so h = 1 clips the full spectrum.
        let model = tritium();
        let interval = EnergyWindow::new(0.0, model.q).unwrap();
        let h_min = minimum_scale(&model, &interval, 0.2, ENVELOPE_SCAN_POINTS);
        assert!(h_min > 1.0, "h_min={h_min}");
        let envelope = Envelope::new(&model, 1.01 * h_min, 0.2).unwrap();
        assert!(envelope.max_ratio(&model, &interval, 0.2, ENVELOPE_SCAN_POINTS) <= 1.0);
    }

    #[test]
    fn yields_exactly_the_target() {
        let model = tritium();
        let mut rng = StdRng::seed_from_u64(7);
        let mut sampler =
            SpectrumSampler::new(&model, endpoint_settings(&model, 2e-5, 500), &mut rng).unwrap();
        let mut n = 0;
        for event in sampler.by_ref() {
            let event = event.unwrap();
            assert!(event.true_energy >= model.q - 25.0 && event.true_energy < model.q);
            assert!(event.smeared_energy.is_some());
            n += 1;
        }
        assert_eq!(n, 500);
        assert_eq!(sampler.state(), SamplerState::Done);
        let stats = sampler.stats();
        assert_eq!(stats.accepted, 500);
        assert!(stats.draws > stats.accepted);
        assert!(sampler.next().is_none());
    }

    #[test]
    fn larger_envelope_lowers_the_acceptance_rate() {
        let model = tritium();
        let rate = |scale: f64| {
            let mut rng = StdRng::seed_from_u64(11);
            let mut sampler =
                SpectrumSampler::new(&model, endpoint_settings(&model, scale, 2000), &mut rng)
                    .unwrap();
            for event in sampler.by_ref() {
                event.unwrap();
            }
            sampler.stats().acceptance_rate()
        };
        let base = rate(2e-5);
        let wide = rate(2e-4);
        assert!(wide < base, "wide={wide}, base={base}");
        // Acceptance is inversely proportional to h.
        assert!((base / wide - 10.0).abs() < 2.0, "ratio={}", base / wide);
    }

    #[test]
    fn same_seed_reproduces_the_stream() {
        let model = tritium();
        let run = |seed: u64| -> Vec<f64> {
            let mut rng = StdRng::seed_from_u64(seed);
            SpectrumSampler::new(&model, endpoint_settings(&model, 2e-5, 50), &mut rng)
                .unwrap()
                .map(|e| e.unwrap().true_energy)
                .collect()
        };
        assert_eq!(run(3), run(3));
        assert_ne!(run(3), run(4));
    }

    #[test]
    fn draw_bound_reports_starvation() {
        let model = tritium();
        let mut settings = endpoint_settings(&model, 1e6, 100);
        settings.max_draws = 1000;
        let mut rng = StdRng::seed_from_u64(1);
        let results: Vec<_> = SpectrumSampler::new(&model, settings, &mut rng)
            .unwrap()
            .collect();
        let last = results.last().unwrap();
        assert!(matches!(
            last,
            Err(AppError::SamplingStarvation { draws: 1000, target: 100, .. })
        ));
        assert!(results[..results.len() - 1].iter().all(|r| r.is_ok()));
    }

    #[test]
    fn resolution_zero_disables_smearing() {
        let model = tritium();
        let mut settings = endpoint_settings(&model, 2e-5, 20);
        settings.resolution = 0.0;
        let mut rng = StdRng::seed_from_u64(5);
        for event in SpectrumSampler::new(&model, settings, &mut rng).unwrap() {
            assert!(event.unwrap().smeared_energy.is_none());
        }
    }

    #[test]
    fn interval_beyond_q_is_rejected() {
        let model = tritium();
        let mut settings = endpoint_settings(&model, 2e-5, 20);
        settings.interval = EnergyWindow::new(model.q - 10.0, model.q + 10.0).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            SpectrumSampler::new(&model, settings, &mut rng),
            Err(AppError::Configuration(_))
        ));
    }
}
