//! Export a histogram as a bin table.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::path::Path;

use crate::error::AppError;
use crate::histogram::Histogram;

/// Write `bin,low,high,center,content` rows to a CSV file.
pub fn write_histogram_csv(path: &Path, histogram: &Histogram) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    writer
        .write_record(["bin", "low", "high", "center", "content"])
        .map_err(|e| csv_error(path, e))?;
    for i in 0..histogram.bins() {
        writer
            .write_record([
                i.to_string(),
                format!("{:.6}", histogram.bin_low(i)),
                format!("{:.6}", histogram.bin_high(i)),
                format!("{:.6}", histogram.bin_center(i)),
                histogram.contents[i].to_string(),
            ])
            .map_err(|e| csv_error(path, e))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::io(format!("Failed to write '{}'", path.display()), e))
}

fn csv_error(path: &Path, err: csv::Error) -> AppError {
    if err.is_io_error() {
        if let csv::ErrorKind::Io(source) = err.into_kind() {
            return AppError::io(format!("Failed to write '{}'", path.display()), source);
        }
        return AppError::Format(format!("CSV export to '{}' failed", path.display()));
    }
    AppError::Format(format!("CSV export to '{}' failed: {err}", path.display()))
}
