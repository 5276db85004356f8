//! Persisted simulation runs.
//!
//! A run archive is the portable result of `simulate`: the resolved config,
//! the Q-value actually used, sampling statistics, and every histogram channel
//! keyed by its persisted name (`E_e`, `E_e_sm`). The fit stage reads it back
//! by run name.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::SimulationConfig;
use crate::error::AppError;
use crate::histogram::{Histogram, HistogramId, SpectrumHistograms};
use crate::sampling::SamplingStats;

pub const ARCHIVE_TOOL: &str = "bspec";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArchive {
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub config: SimulationConfig,
    pub q_value: f64,
    pub stats: SamplingStats,
    pub histograms: BTreeMap<String, Histogram>,
}

impl RunArchive {
    pub fn new(
        config: &SimulationConfig,
        q_value: f64,
        stats: SamplingStats,
        histograms: &SpectrumHistograms,
    ) -> Self {
        Self {
            tool: ARCHIVE_TOOL.to_string(),
            created_at: Utc::now(),
            config: config.clone(),
            q_value,
            stats,
            histograms: histograms
                .channels()
                .into_iter()
                .map(|(id, h)| (id.key().to_string(), h.clone()))
                .collect(),
        }
    }

    pub fn histogram(&self, id: HistogramId) -> Result<&Histogram, AppError> {
        self.histograms.get(id.key()).ok_or_else(|| {
            AppError::Format(format!(
                "run has no '{}' histogram ({})",
                id.key(),
                id.display_name()
            ))
        })
    }
}

/// Storage keyed by a user-supplied run name.
pub trait HistogramStore {
    fn write_archive(&mut self, run: &str, archive: &RunArchive) -> Result<(), AppError>;

    fn read_archive(&self, run: &str) -> Result<RunArchive, AppError>;

    /// Insert or replace one histogram of an existing run, keyed by its name.
    fn write(&mut self, run: &str, histogram: &Histogram) -> Result<(), AppError> {
        let mut archive = self.read_archive(run)?;
        archive
            .histograms
            .insert(histogram.name.clone(), histogram.clone());
        self.write_archive(run, &archive)
    }

    fn read(&self, run: &str, id: HistogramId) -> Result<Histogram, AppError> {
        self.read_archive(run)?.histogram(id).cloned()
    }
}

fn check_run_name(run: &str) -> Result<(), AppError> {
    let ok = !run.is_empty()
        && run != "."
        && run != ".."
        && !run.contains(['/', '\\'])
        && !run.chars().any(char::is_control);
    if ok {
        Ok(())
    } else {
        Err(AppError::config(format!(
            "Invalid run name '{run}' (must be a plain file name)."
        )))
    }
}

/// One pretty-printed JSON file per run: `<dir>/<run>.json`.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, run: &str) -> Result<PathBuf, AppError> {
        check_run_name(run)?;
        Ok(self.dir.join(format!("{run}.json")))
    }
}

impl HistogramStore for JsonStore {
    fn write_archive(&mut self, run: &str, archive: &RunArchive) -> Result<(), AppError> {
        let path = self.path_for(run)?;
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::io(format!("Failed to create directory '{}'", self.dir.display()), e)
        })?;
        let file = File::create(&path)
            .map_err(|e| AppError::io(format!("Failed to create '{}'", path.display()), e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), archive)
            .map_err(|e| AppError::Format(format!("failed to write '{}': {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "run archive written");
        Ok(())
    }

    fn read_archive(&self, run: &str) -> Result<RunArchive, AppError> {
        let path = self.path_for(run)?;
        let file = File::open(&path)
            .map_err(|e| AppError::io(format!("Failed to open '{}'", path.display()), e))?;
        let archive: RunArchive = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| AppError::Format(format!("'{}': {e}", path.display())))?;
        if archive.tool != ARCHIVE_TOOL {
            return Err(AppError::Format(format!(
                "'{}' was written by '{}', not '{ARCHIVE_TOOL}'",
                path.display(),
                archive.tool
            )));
        }
        Ok(archive)
    }
}

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    runs: HashMap<String, RunArchive>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

impl HistogramStore for MemoryStore {
    fn write_archive(&mut self, run: &str, archive: &RunArchive) -> Result<(), AppError> {
        check_run_name(run)?;
        self.runs.insert(run.to_string(), archive.clone());
        Ok(())
    }

    fn read_archive(&self, run: &str) -> Result<RunArchive, AppError> {
        self.runs
            .get(run)
            .cloned()
            .ok_or_else(|| AppError::Format(format!("no run named '{run}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EnergyWindow;
    use crate::sampling::SpectrumEvent;

    fn archive() -> RunArchive {
        let config = SimulationConfig::tritium(3, 7);
        let domain = EnergyWindow::new(100.0, 110.0).unwrap();
        let mut hs = SpectrumHistograms::new(10, &domain, true).unwrap();
        for (t, s) in [(101.0, 101.5), (105.2, 104.9), (109.0, 112.0)] {
            hs.record(&SpectrumEvent {
                true_energy: t,
                smeared_energy: Some(s),
            });
        }
        let stats = SamplingStats {
            draws: 20,
            accepted: 3,
        };
        RunArchive::new(&config, 110.0, stats, &hs)
    }

    #[test]
    fn json_store_round_trips_through_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStore::new(dir.path().join("runs"));
        let a = archive();
        store.write_archive("tritium", &a).unwrap();
        assert!(dir.path().join("runs").join("tritium.json").exists());

        let back = store.read_archive("tritium").unwrap();
        assert_eq!(back, a);
        let sm = store.read("tritium", HistogramId::Smeared).unwrap();
        assert_eq!(sm.entries, 2);
        assert_eq!(sm.overflow, 1.0);
    }

    #[test]
    fn writing_a_histogram_updates_the_run() {
        let mut store = MemoryStore::new();
        store.write_archive("r1", &archive()).unwrap();
        let mut h = store.read("r1", HistogramId::True).unwrap();
        h.fill(100.5);
        store.write("r1", &h).unwrap();
        assert_eq!(store.read("r1", HistogramId::True).unwrap().entries, 4);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_runs_and_channels_are_format_errors() {
        let store = MemoryStore::new();
        assert!(matches!(store.read_archive("nope"), Err(AppError::Format(_))));

        let mut a = archive();
        a.histograms.remove(HistogramId::Smeared.key());
        assert!(matches!(a.histogram(HistogramId::Smeared), Err(AppError::Format(_))));
    }

    #[test]
    fn run_names_cannot_escape_the_directory() {
        let store = JsonStore::new("out");
        assert!(store.path_for("../x").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("run-01").is_ok());
    }

    #[test]
    fn foreign_or_corrupt_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path());
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        assert!(matches!(store.read_archive("bad"), Err(AppError::Format(_))));
        assert!(matches!(store.read_archive("absent"), Err(AppError::Io { .. })));
    }
}
