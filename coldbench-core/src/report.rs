// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Structured run report.
//!
//! `ReportBuilder` is a pure transformation from benchmark results to a
//! serialisable `RunReport`; writing it anywhere is the caller's business.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use uuid::Uuid;

use crate::analyzer::{ComparisonVerdict, StatisticalAnalyzer};
use crate::config::BenchmarkSettings;
use crate::error::AnalysisError;
use crate::manager::RunOutcome;
use crate::result::{
    deployment_population, latency_population, BenchmarkResult, Classification, CleanupOutcome,
    GroupSummary,
};
use crate::state::{TaskPhase, VariantState};
use crate::types::VariantName;
use crate::variant::VariantRole;

/// Host the benchmark was driven from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub os_version: String,
    pub kernel_version: Option<String>,
    pub cpu_model: String,
    pub cpu_cores: usize,
    pub memory_bytes: u64,
    pub hostname: String,
}

impl SystemInfo {
    /// Collect current system information.
    pub fn collect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// How the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunStatus {
    pub deadline_hit: bool,
    pub aborted: bool,
    pub elapsed_ns: u64,
}

/// Deployment and cleanup tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeploymentCounts {
    pub total: usize,
    pub deployed: usize,
    pub failed: usize,
    pub not_attempted: usize,
    /// Tasks that reached Done.
    pub completed: usize,
    pub cleanup_failures: usize,
}

impl DeploymentCounts {
    pub fn from_results(results: &[BenchmarkResult]) -> Self {
        use crate::result::DeploymentOutcome;

        let mut counts = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.deployment {
                DeploymentOutcome::Deployed { .. } => counts.deployed += 1,
                DeploymentOutcome::Failed { .. } => counts.failed += 1,
                DeploymentOutcome::NotAttempted => counts.not_attempted += 1,
            }
            if result.is_success() {
                counts.completed += 1;
            }
            if matches!(result.cleanup, CleanupOutcome::Failed { .. }) {
                counts.cleanup_failures += 1;
            }
        }
        counts
    }
}

/// Per-variant line of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    pub variant: VariantName,
    pub role: VariantRole,
    pub phase: TaskPhase,
    pub failure: Option<String>,
    pub deployment_duration_ns: Option<u64>,
    pub time_to_ready_ns: Option<u64>,
    pub cold: GroupSummary,
    pub warm: GroupSummary,
    pub ambiguous_discarded: u32,
    pub cleanup: CleanupOutcome,
    pub final_state: VariantState,
}

impl From<&BenchmarkResult> for VariantSummary {
    fn from(result: &BenchmarkResult) -> Self {
        Self {
            variant: result.variant.clone(),
            role: result.role,
            phase: result.phase,
            failure: result.failure.as_ref().map(|f| f.to_string()),
            deployment_duration_ns: result.deployment.duration_ns(),
            time_to_ready_ns: result.time_to_ready_ns,
            cold: result.cold.clone(),
            warm: result.warm.clone(),
            ambiguous_discarded: result.ambiguous_discarded,
            cleanup: result.cleanup.clone(),
            final_state: result.final_state,
        }
    }
}

/// Outcome of comparing one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricComparison {
    Computed { verdict: ComparisonVerdict },
    InsufficientData { reason: String },
}

impl MetricComparison {
    fn from_analysis(result: Result<ComparisonVerdict, AnalysisError>) -> Self {
        match result {
            Ok(verdict) => Self::Computed { verdict },
            Err(e) => Self::InsufficientData {
                reason: e.to_string(),
            },
        }
    }

    pub fn verdict(&self) -> Option<&ComparisonVerdict> {
        match self {
            Self::Computed { verdict } => Some(verdict),
            Self::InsufficientData { .. } => None,
        }
    }
}

/// Treatment vs. control, per metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparisons {
    pub cold: MetricComparison,
    pub warm: MetricComparison,
    pub deployment_duration: MetricComparison,
}

/// Complete report of one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub suite: String,
    pub version: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub system_info: Option<SystemInfo>,
    pub settings: Option<BenchmarkSettings>,
    pub status: RunStatus,
    pub deployments: DeploymentCounts,
    pub variants: Vec<VariantSummary>,
    pub comparisons: Comparisons,
    pub results: Vec<BenchmarkResult>,
}

impl RunReport {
    /// Recompute the comparisons, e.g. with a different significance level.
    pub fn reanalyze(&self, analyzer: &StatisticalAnalyzer) -> Self {
        Self {
            generated_at: Utc::now(),
            comparisons: compare_all(analyzer, &self.results),
            ..self.clone()
        }
    }

    /// Whether any computed comparison is significant.
    pub fn any_significant(&self) -> bool {
        [
            &self.comparisons.cold,
            &self.comparisons.warm,
            &self.comparisons.deployment_duration,
        ]
        .iter()
        .filter_map(|c| c.verdict())
        .any(|v| v.significant)
    }
}

/// Builds run reports.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    analyzer: StatisticalAnalyzer,
    settings: Option<BenchmarkSettings>,
    system_info: Option<SystemInfo>,
    status: RunStatus,
}

impl ReportBuilder {
    pub fn new(analyzer: StatisticalAnalyzer) -> Self {
        Self {
            analyzer,
            ..Self::default()
        }
    }

    pub fn with_settings(mut self, settings: BenchmarkSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn with_system_info(mut self, info: SystemInfo) -> Self {
        self.system_info = Some(info);
        self
    }

    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = status;
        self
    }

    /// Build from a finished run.
    pub fn build_outcome(self, outcome: &RunOutcome) -> RunReport {
        self.with_status(RunStatus {
            deadline_hit: outcome.deadline_hit,
            aborted: outcome.aborted,
            elapsed_ns: outcome.elapsed.as_nanos() as u64,
        })
        .build(&outcome.results)
    }

    pub fn build(&self, results: &[BenchmarkResult]) -> RunReport {
        RunReport {
            suite: "coldbench".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            system_info: self.system_info.clone(),
            settings: self.settings.clone(),
            status: self.status,
            deployments: DeploymentCounts::from_results(results),
            variants: results.iter().map(VariantSummary::from).collect(),
            comparisons: compare_all(&self.analyzer, results),
            results: results.to_vec(),
        }
    }
}

fn compare_all(analyzer: &StatisticalAnalyzer, results: &[BenchmarkResult]) -> Comparisons {
    let latency = |class: Classification, metric: &str| {
        MetricComparison::from_analysis(analyzer.compare(
            metric,
            &latency_population(results, VariantRole::Control, class),
            &latency_population(results, VariantRole::Treatment, class),
        ))
    };

    Comparisons {
        cold: latency(Classification::Cold, "cold_start_latency"),
        warm: latency(Classification::Warm, "warm_latency"),
        deployment_duration: MetricComparison::from_analysis(analyzer.compare(
            "deployment_duration",
            &deployment_population(results, VariantRole::Control),
            &deployment_population(results, VariantRole::Treatment),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::provider::Deployment;
    use crate::result::{
        Confidence, DeploymentOutcome, InvocationSample, SampleOutcome, TaskFailure,
    };
    use crate::types::DeploymentId;

    fn result(name: &str, role: VariantRole, cold_ms: &[u64], deploy_s: u64) -> BenchmarkResult {
        let variant = VariantName::new(name).unwrap();
        let samples: Vec<InvocationSample> = cold_ms
            .iter()
            .enumerate()
            .map(|(i, ms)| InvocationSample {
                variant: variant.clone(),
                sequence: i as u32 + 1,
                timestamp: Utc::now(),
                elapsed_ns: ms * 1_000_000,
                classification: Classification::Cold,
                confidence: Confidence::High,
                outcome: SampleOutcome::Success,
            })
            .collect();

        BenchmarkResult {
            variant: variant.clone(),
            role,
            deployment: DeploymentOutcome::Deployed {
                deployment: Deployment {
                    id: DeploymentId::new(name),
                    url: format!("https://{}.example", name),
                },
                duration_ns: deploy_s * 1_000_000_000,
                attempts: 1,
            },
            time_to_ready_ns: Some(1),
            cold: GroupSummary::from_samples(&samples, Classification::Cold),
            warm: GroupSummary::default(),
            samples,
            ambiguous_discarded: 0,
            cleanup: CleanupOutcome::Deleted,
            final_state: VariantState::Deleted,
            phase: TaskPhase::Done,
            failure: None,
        }
    }

    #[test]
    fn test_build_report() {
        let results = vec![
            result("plain-001", VariantRole::Control, &[100, 102], 60),
            result("plain-002", VariantRole::Control, &[98, 101, 99], 62),
            result("agent-001", VariantRole::Treatment, &[150, 152], 70),
            result("agent-002", VariantRole::Treatment, &[149, 151, 148], 75),
        ];

        let report = ReportBuilder::default().build(&results);

        assert_eq!(report.deployments.total, 4);
        assert_eq!(report.deployments.deployed, 4);
        assert_eq!(report.deployments.completed, 4);
        assert_eq!(report.variants.len(), 4);

        let cold = report.comparisons.cold.verdict().unwrap();
        assert!(cold.significant);
        assert_eq!(cold.control.count, 5);
        assert!(report.any_significant());

        assert!(matches!(
            report.comparisons.warm,
            MetricComparison::InsufficientData { .. }
        ));
        assert!(report.comparisons.deployment_duration.verdict().is_some());
    }

    #[test]
    fn test_failed_variants_enumerated() {
        let ok = result("plain", VariantRole::Control, &[100], 60);
        let variant = crate::variant::FunctionVariant {
            name: VariantName::new("agent").unwrap(),
            generation: crate::types::Generation::Gen2,
            runtime: crate::types::RuntimeVersion::new("nodejs20").unwrap(),
            agent_enabled: true,
            entry_point: "main".to_string(),
            source: crate::types::SourceBundle::new_unchecked("."),
            environment: Default::default(),
        };
        let failed = BenchmarkResult::not_started(
            &variant,
            TaskFailure::Cancelled {
                phase: TaskPhase::Queued,
            },
        );

        let report = ReportBuilder::default().build(&[ok, failed]);
        assert_eq!(report.variants.len(), 2);
        assert_eq!(report.deployments.not_attempted, 1);
        assert!(report.variants[1].failure.as_deref().unwrap().contains("cancelled"));
        assert!(!report.any_significant());
    }

    #[test]
    fn test_reanalyze_keeps_identity() {
        let results = vec![
            result("plain", VariantRole::Control, &[100, 110, 90], 60),
            result("agent", VariantRole::Treatment, &[104, 114, 95], 61),
        ];
        let report = ReportBuilder::default().build(&results);
        let loose = StatisticalAnalyzer::new(0.99).unwrap();
        let again = report.reanalyze(&loose);

        assert_eq!(again.run_id, report.run_id);
        assert_eq!(again.results, report.results);
        assert_eq!(again.comparisons.cold.verdict().unwrap().alpha, 0.99);
    }

    #[test]
    fn test_report_serializes() {
        let results = vec![result("plain", VariantRole::Control, &[100, 101], 60)];
        let report = ReportBuilder::default().build(&results);
        let json = serde_json::to_string(&report).unwrap();
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, report.run_id);
        assert!(json.contains("insufficient_data"));
    }
}
