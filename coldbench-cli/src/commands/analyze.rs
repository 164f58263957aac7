// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `coldbench analyze` command - Re-analyse a saved report.

use std::path::PathBuf;

use coldbench_core::{JsonReporter, StatisticalAnalyzer};

use crate::summary;

pub async fn execute(
    report: Option<&str>,
    dir: &str,
    alpha: Option<f64>,
    save: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let reporter = JsonReporter::new(dir)?;

    let path = match report {
        Some(path) => PathBuf::from(path),
        None => reporter
            .latest()?
            .ok_or_else(|| format!("no reports found in {}", dir))?,
    };

    tracing::info!(path = %path.display(), "Loading report");
    let mut run_report = JsonReporter::load(&path)?;

    if let Some(alpha) = alpha {
        let analyzer = StatisticalAnalyzer::new(alpha)?;
        run_report = run_report.reanalyze(&analyzer);
        tracing::info!(alpha, "Recomputed comparisons");
    }

    print!("{}", summary::render(&run_report));

    if save {
        let saved = reporter.save(&run_report)?;
        println!();
        println!("Report written to {}", saved.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldbench_core::ReportBuilder;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_analyze_latest_with_new_alpha() {
        let dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(dir.path()).unwrap();
        let original = ReportBuilder::default().build(&[]);
        reporter.save(&original).unwrap();

        let dir_str = dir.path().to_str().unwrap();
        execute(None, dir_str, Some(0.01), true).await.unwrap();

        let latest = reporter.latest().unwrap().unwrap();
        let reloaded = JsonReporter::load(latest).unwrap();
        assert_eq!(reloaded.run_id, original.run_id);
    }

    #[tokio::test]
    async fn test_analyze_empty_dir() {
        let dir = TempDir::new().unwrap();
        let err = execute(None, dir.path().to_str().unwrap(), None, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no reports"));
    }

    #[tokio::test]
    async fn test_analyze_rejects_bad_alpha() {
        let dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(dir.path()).unwrap();
        let path = reporter.save(&ReportBuilder::default().build(&[])).unwrap();

        let result = execute(
            Some(path.to_str().unwrap()),
            dir.path().to_str().unwrap(),
            Some(1.5),
            false,
        )
        .await;
        assert!(result.is_err());
    }
}
