// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! JSON report persistence.
//!
//! Saves run reports to timestamped JSON files and loads them back for
//! re-analysis.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::report::RunReport;

/// Errors that can occur while writing or reading reports.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Report I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// JSON reporter for run reports.
pub struct JsonReporter {
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Create a reporter writing into `output_dir`, creating it if needed.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, ReporterError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Save a report as `coldbench_<timestamp>_<run-id prefix>.json`.
    ///
    /// Returns the path to the created file.
    pub fn save(&self, report: &RunReport) -> Result<PathBuf, ReporterError> {
        let timestamp = report.generated_at.format("%Y-%m-%dT%H-%M-%SZ");
        let run_id = report.run_id.simple().to_string();
        let filename = format!("coldbench_{}_{}.json", timestamp, &run_id[..8]);
        let filepath = self.output_dir.join(&filename);

        let file = File::create(&filepath)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, report)?;

        tracing::info!(path = %filepath.display(), "Report saved");
        Ok(filepath)
    }

    /// List all saved reports, oldest first.
    pub fn list_reports(&self) -> Result<Vec<PathBuf>, ReporterError> {
        let mut reports = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                reports.push(path);
            }
        }
        reports.sort();
        Ok(reports)
    }

    /// Most recently saved report, if any.
    pub fn latest(&self) -> Result<Option<PathBuf>, ReporterError> {
        Ok(self.list_reports()?.pop())
    }

    /// Load a report from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<RunReport, ReporterError> {
        let file = File::open(path)?;
        let report = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportBuilder;
    use tempfile::TempDir;

    #[test]
    fn test_reporter_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path()).unwrap();

        let report = ReportBuilder::default().build(&[]);
        let path = reporter.save(&report).unwrap();
        assert!(path.exists());

        let loaded = JsonReporter::load(&path).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.deployments.total, 0);
    }

    #[test]
    fn test_list_reports() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path().join("nested")).unwrap();
        assert!(reporter.latest().unwrap().is_none());

        let first = reporter.save(&ReportBuilder::default().build(&[])).unwrap();
        let second = reporter.save(&ReportBuilder::default().build(&[])).unwrap();
        std::fs::write(reporter.output_dir().join("notes.txt"), "x").unwrap();

        let reports = reporter.list_reports().unwrap();
        // Distinct run ids keep same-second reports apart.
        assert_eq!(reports.len(), 2);
        assert!(reports.contains(&first));
        assert!(reports.contains(&second));
    }

    #[test]
    fn test_load_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonReporter::load(&path),
            Err(ReporterError::Serialization(_))
        ));
    }
}
