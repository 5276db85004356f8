//! A single fixed-width histogram.
//!
//! Bins cover `[min, max)` with uniform width `(max - min) / bins`. Bin `i`
//! is `[min + i·w, min + (i+1)·w)`. Values outside the domain (and NaN) are
//! counted in underflow/overflow and never touch a bin.
//!
//! Contents are `f64` so expected-count histograms can be built from a model
//! as well as filled event by event.

use serde::{Deserialize, Serialize};

use crate::domain::EnergyWindow;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub contents: Vec<f64>,
    pub underflow: f64,
    pub overflow: f64,
    /// Number of in-range fills.
    pub entries: u64,
}

impl Histogram {
    pub fn new(name: impl Into<String>, bins: usize, min: f64, max: f64) -> Result<Self, AppError> {
        if bins == 0 {
            return Err(AppError::config("Histogram needs at least one bin."));
        }
        EnergyWindow::new(min, max)?;
        Ok(Self {
            name: name.into(),
            min,
            max,
            contents: vec![0.0; bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        })
    }

    pub fn with_domain(
        name: impl Into<String>,
        bins: usize,
        domain: &EnergyWindow,
    ) -> Result<Self, AppError> {
        Self::new(name, bins, domain.min, domain.max)
    }

    pub fn bins(&self) -> usize {
        self.contents.len()
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.bins() as f64
    }

    /// Index of the bin containing `x`, or `None` outside `[min, max)`.
    pub fn bin_index(&self, x: f64) -> Option<usize> {
        if !(x >= self.min && x < self.max) {
            return None;
        }
        let i = ((x - self.min) / self.bin_width()) as usize;
        // Rounding can push values just below `max` into a phantom bin.
        Some(i.min(self.bins() - 1))
    }

    pub fn bin_low(&self, i: usize) -> f64 {
        self.min + self.bin_width() * i as f64
    }

    pub fn bin_high(&self, i: usize) -> f64 {
        self.min + self.bin_width() * (i + 1) as f64
    }

    pub fn bin_center(&self, i: usize) -> f64 {
        self.min + self.bin_width() * (i as f64 + 0.5)
    }

    /// Add one count at `x`. Returns whether the value landed in a bin.
    pub fn fill(&mut self, x: f64) -> bool {
        match self.bin_index(x) {
            Some(i) => {
                self.contents[i] += 1.0;
                self.entries += 1;
                true
            }
            None => {
                if x >= self.max {
                    self.overflow += 1.0;
                } else {
                    self.underflow += 1.0;
                }
                false
            }
        }
    }

    /// Sum of in-range bin contents.
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Bin contents divided by their sum (all zeros for an empty histogram).
    pub fn normalized(&self) -> Vec<f64> {
        let total = self.integral();
        if total > 0.0 {
            self.contents.iter().map(|c| c / total).collect()
        } else {
            vec![0.0; self.bins()]
        }
    }

    /// Index of the highest bin (lowest index on ties).
    pub fn mode_bin(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, &c) in self.contents.iter().enumerate() {
            match best {
                Some(b) if self.contents[b] >= c => {}
                _ => best = Some(i),
            }
        }
        best
    }

    /// True when both histograms have identical binning.
    pub fn same_binning(&self, other: &Histogram) -> bool {
        self.bins() == other.bins() && self.min == other.min && self.max == other.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bins_are_half_open() {
        let mut h = Histogram::new("h", 10, 0.0, 10.0).unwrap();
        assert_eq!(h.bin_index(0.0), Some(0));
        assert_eq!(h.bin_index(0.999), Some(0));
        assert_eq!(h.bin_index(1.0), Some(1));
        assert_eq!(h.bin_index(9.999_999), Some(9));
        assert_eq!(h.bin_index(10.0), None);

        assert!(h.fill(3.5));
        assert_eq!(h.contents[3], 1.0);
        assert_eq!(h.entries, 1);
    }

    #[test]
    fn out_of_domain_values_are_dropped_silently() {
        let mut h = Histogram::new("h", 4, 100.0, 200.0).unwrap();
        assert!(!h.fill(99.999));
        assert!(!h.fill(200.0));
        assert!(!h.fill(1e9));
        assert!(!h.fill(f64::NAN));
        assert_eq!(h.integral(), 0.0);
        assert_eq!(h.entries, 0);
        assert_eq!(h.underflow, 2.0);
        assert_eq!(h.overflow, 2.0);
    }

    #[test]
    fn geometry_matches_width() {
        let h = Histogram::new("h", 100, 18511.85, 18536.85).unwrap();
        assert!((h.bin_width() - 0.25).abs() < 1e-9);
        assert!((h.bin_center(0) - 18511.975).abs() < 1e-9);
        assert!((h.bin_high(99) - 18536.85).abs() < 1e-9);
        assert_eq!(h.bin_index(h.max - 1e-9), Some(99));
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        assert!(Histogram::new("h", 0, 0.0, 1.0).is_err());
        assert!(Histogram::new("h", 5, 1.0, 1.0).is_err());
        assert!(Histogram::new("h", 5, 2.0, 1.0).is_err());
    }

    #[test]
    fn mode_and_normalization() {
        let mut h = Histogram::new("h", 3, 0.0, 3.0).unwrap();
        assert_eq!(h.mode_bin(), Some(0));
        for x in [0.5, 1.5, 1.6, 2.5] {
            h.fill(x);
        }
        assert_eq!(h.mode_bin(), Some(1));
        let n = h.normalized();
        assert!((n.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((n[1] - 0.5).abs() < 1e-12);
    }
}
