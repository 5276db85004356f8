//! Accumulates accepted events into the run's histogram channels.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::EnergyWindow;
use crate::error::AppError;
use crate::histogram::binned::Histogram;
use crate::sampling::SpectrumEvent;

/// Histogram channels produced by one simulation run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum HistogramId {
    /// True electron kinetic energy.
    True,
    /// Resolution-smeared kinetic energy.
    Smeared,
}

impl HistogramId {
    pub const ALL: [HistogramId; 2] = [HistogramId::True, HistogramId::Smeared];

    /// Key under which the channel is persisted.
    pub fn key(self) -> &'static str {
        match self {
            HistogramId::True => "E_e",
            HistogramId::Smeared => "E_e_sm",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        HistogramId::ALL.into_iter().find(|id| id.key() == key)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            HistogramId::True => "true energy",
            HistogramId::Smeared => "smeared energy",
        }
    }
}

/// True-energy histogram plus an optional smeared companion on the same domain.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumHistograms {
    pub true_energy: Histogram,
    pub smeared: Option<Histogram>,
}

impl SpectrumHistograms {
    pub fn new(bins: usize, domain: &EnergyWindow, with_smeared: bool) -> Result<Self, AppError> {
        let true_energy = Histogram::with_domain(HistogramId::True.key(), bins, domain)?;
        let smeared = if with_smeared {
            Some(Histogram::with_domain(HistogramId::Smeared.key(), bins, domain)?)
        } else {
            None
        };
        Ok(Self {
            true_energy,
            smeared,
        })
    }

    pub fn get(&self, id: HistogramId) -> Option<&Histogram> {
        match id {
            HistogramId::True => Some(&self.true_energy),
            HistogramId::Smeared => self.smeared.as_ref(),
        }
    }

    /// Fill one channel. Returns whether the value landed in a bin; a missing
    /// channel behaves like an out-of-domain value.
    pub fn fill(&mut self, id: HistogramId, value: f64) -> bool {
        match id {
            HistogramId::True => self.true_energy.fill(value),
            HistogramId::Smeared => self.smeared.as_mut().is_some_and(|h| h.fill(value)),
        }
    }

    /// Route one accepted event into its channels.
    pub fn record(&mut self, event: &SpectrumEvent) {
        self.fill(HistogramId::True, event.true_energy);
        if let Some(e) = event.smeared_energy {
            self.fill(HistogramId::Smeared, e);
        }
    }

    /// All present channels with their ids.
    pub fn channels(&self) -> Vec<(HistogramId, &Histogram)> {
        HistogramId::ALL
            .into_iter()
            .filter_map(|id| self.get(id).map(|h| (id, h)))
            .collect()
    }
}
