// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Measurement records produced by benchmark tasks.
//!
//! Samples are immutable once recorded. A `BenchmarkResult` is assembled
//! once, when its task reaches a terminal phase, and is only read afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyzer::Descriptive;
use crate::provider::Deployment;
use crate::state::{TaskPhase, VariantState};
use crate::types::VariantName;
use crate::variant::{FunctionVariant, VariantRole};

/// Cold or warm classification of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Cold,
    Warm,
}

/// How sure the detector is about the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    #[default]
    High,
    /// Forced-cold invocation still looked warm after the retry budget ran out.
    Low,
}

/// Outcome of a single invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SampleOutcome {
    Success,
    HttpError { code: u16 },
    NetworkError { reason: String },
}

impl SampleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationSample {
    pub variant: VariantName,
    /// Position in the variant's invocation order, starting at 1.
    pub sequence: u32,
    pub timestamp: DateTime<Utc>,
    pub elapsed_ns: u64,
    pub classification: Classification,
    #[serde(default)]
    pub confidence: Confidence,
    pub outcome: SampleOutcome,
}

/// Per-group counts and moments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GroupSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub low_confidence: usize,
    pub mean_ns: Option<f64>,
    pub std_dev_ns: Option<f64>,
}

impl GroupSummary {
    pub fn from_samples(samples: &[InvocationSample], class: Classification) -> Self {
        let group: Vec<&InvocationSample> = samples
            .iter()
            .filter(|s| s.classification == class)
            .collect();
        let latencies: Vec<f64> = group
            .iter()
            .filter(|s| s.outcome.is_success())
            .map(|s| s.elapsed_ns as f64)
            .collect();
        let stats = Descriptive::from_values(&latencies);

        Self {
            attempted: group.len(),
            succeeded: latencies.len(),
            failed: group.len() - latencies.len(),
            low_confidence: group
                .iter()
                .filter(|s| s.confidence == Confidence::Low)
                .count(),
            mean_ns: stats.as_ref().map(|d| d.mean),
            std_dev_ns: stats.as_ref().map(|d| d.std_dev),
        }
    }
}

/// What happened when the variant was deployed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeploymentOutcome {
    /// The run ended before this variant's task started.
    NotAttempted,
    Deployed {
        deployment: Deployment,
        /// Duration of the successful attempt only.
        duration_ns: u64,
        attempts: u32,
    },
    Failed {
        reason: String,
        attempts: u32,
    },
}

impl DeploymentOutcome {
    pub fn is_deployed(&self) -> bool {
        matches!(self, Self::Deployed { .. })
    }

    pub fn duration_ns(&self) -> Option<u64> {
        match self {
            Self::Deployed { duration_ns, .. } => Some(*duration_ns),
            _ => None,
        }
    }
}

/// What happened when the variant's resources were removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// Nothing was ever sent to the provider.
    NotRequired,
    Deleted,
    Failed { reason: String },
}

/// Why a task ended in the Failed phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskFailure {
    DeploymentFailed { reason: String },
    DeploymentNotReady { reason: String },
    /// Every invocation attempt failed.
    MeasurementFailed { reason: String },
    Cancelled { phase: TaskPhase },
    /// The task panicked; the manager synthesised this record.
    Faulted { reason: String },
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeploymentFailed { reason } => write!(f, "deployment failed: {}", reason),
            Self::DeploymentNotReady { reason } => write!(f, "deployment not ready: {}", reason),
            Self::MeasurementFailed { reason } => write!(f, "measurement failed: {}", reason),
            Self::Cancelled { phase } => write!(f, "cancelled during {}", phase),
            Self::Faulted { reason } => write!(f, "task fault: {}", reason),
        }
    }
}

/// Final record of one variant's benchmark task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub variant: VariantName,
    pub role: VariantRole,
    pub deployment: DeploymentOutcome,
    pub time_to_ready_ns: Option<u64>,
    /// Cold samples first, then warm, each in invocation order.
    pub samples: Vec<InvocationSample>,
    pub cold: GroupSummary,
    pub warm: GroupSummary,
    /// Forced-cold invocations discarded as ambiguous before a retry.
    pub ambiguous_discarded: u32,
    pub cleanup: CleanupOutcome,
    pub final_state: VariantState,
    pub phase: TaskPhase,
    pub failure: Option<TaskFailure>,
}

impl BenchmarkResult {
    /// Record for a variant whose task never started.
    pub fn not_started(variant: &FunctionVariant, failure: TaskFailure) -> Self {
        Self {
            variant: variant.name.clone(),
            role: variant.role(),
            deployment: DeploymentOutcome::NotAttempted,
            time_to_ready_ns: None,
            samples: Vec::new(),
            cold: GroupSummary::default(),
            warm: GroupSummary::default(),
            ambiguous_discarded: 0,
            cleanup: CleanupOutcome::NotRequired,
            final_state: VariantState::Pending,
            phase: TaskPhase::Failed,
            failure: Some(failure),
        }
    }

    /// Record for a task that died without producing its own result.
    pub fn faulted(variant: &FunctionVariant, reason: String, cleanup: CleanupOutcome) -> Self {
        let final_state = match cleanup {
            CleanupOutcome::Deleted => VariantState::Deleted,
            _ => VariantState::Failed,
        };
        Self {
            cleanup,
            final_state,
            ..Self::not_started(variant, TaskFailure::Faulted { reason })
        }
    }

    pub fn is_success(&self) -> bool {
        self.phase == TaskPhase::Done
    }

    /// Successful latencies (ns) of one classification, in invocation order.
    pub fn latencies(&self, class: Classification) -> Vec<f64> {
        self.samples
            .iter()
            .filter(|s| s.classification == class && s.outcome.is_success())
            .map(|s| s.elapsed_ns as f64)
            .collect()
    }
}

/// Pool successful latencies of one role and classification across results.
pub fn latency_population(
    results: &[BenchmarkResult],
    role: VariantRole,
    class: Classification,
) -> Vec<f64> {
    results
        .iter()
        .filter(|r| r.role == role)
        .flat_map(|r| r.latencies(class))
        .collect()
}

/// Deployment durations (ns) of one role's successful deployments.
pub fn deployment_population(results: &[BenchmarkResult], role: VariantRole) -> Vec<f64> {
    results
        .iter()
        .filter(|r| r.role == role)
        .filter_map(|r| r.deployment.duration_ns())
        .map(|ns| ns as f64)
        .collect()
}
