// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! One variant's benchmark: deploy, wait for readiness, measure cold and
//! warm invocations, delete.
//!
//! Phases: Deploying → WaitingCold → MeasuringCold → MeasuringWarm →
//! CleaningUp → {Done, Failed}. Every error is folded into the returned
//! `BenchmarkResult`; `run` never fails. Cancellation is observed at each
//! suspension point, but once something may exist remotely the cleanup
//! step always runs and is not itself cancellable.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::clock::LatencyClock;
use crate::config::BenchmarkSettings;
use crate::detector::{ColdAssessment, ColdStartDetector};
use crate::error::{Cancelled, DeployError, ReadinessError};
use crate::progress::ProgressTracker;
use crate::provider::{Deployment, DeploymentProvider, InvocationClient, InvocationResponse};
use crate::result::{
    BenchmarkResult, Classification, CleanupOutcome, Confidence, DeploymentOutcome,
    GroupSummary, InvocationSample, SampleOutcome, TaskFailure,
};
use crate::state::{TaskPhase, VariantLifecycle, VariantState};
use crate::types::DeploymentId;
use crate::variant::FunctionVariant;

/// A single invocation attempt, before classification.
struct Attempt {
    timestamp: DateTime<Utc>,
    elapsed: Duration,
    outcome: SampleOutcome,
    response: Option<InvocationResponse>,
}

/// Benchmark task for one variant. Owns the variant exclusively.
pub struct BenchmarkTask {
    variant: FunctionVariant,
    provider: Arc<dyn DeploymentProvider>,
    client: Arc<dyn InvocationClient>,
    settings: Arc<BenchmarkSettings>,
    cancel: CancellationToken,
    progress: Arc<ProgressTracker>,
    lifecycle: VariantLifecycle,
    phase: TaskPhase,
    detector: ColdStartDetector,
    deployment: DeploymentOutcome,
    time_to_ready: Option<Duration>,
    samples: Vec<InvocationSample>,
    ambiguous_discarded: u32,
}

impl BenchmarkTask {
    pub fn new(
        variant: FunctionVariant,
        provider: Arc<dyn DeploymentProvider>,
        client: Arc<dyn InvocationClient>,
        settings: Arc<BenchmarkSettings>,
        cancel: CancellationToken,
        progress: Arc<ProgressTracker>,
    ) -> Self {
        let detector = ColdStartDetector::new(&settings);
        Self {
            lifecycle: VariantLifecycle::new(variant.name.clone()),
            variant,
            provider,
            client,
            settings,
            cancel,
            progress,
            phase: TaskPhase::Queued,
            detector,
            deployment: DeploymentOutcome::NotAttempted,
            time_to_ready: None,
            samples: Vec::new(),
            ambiguous_discarded: 0,
        }
    }

    /// Run the task to a terminal phase.
    pub async fn run(mut self) -> BenchmarkResult {
        if self.cancel.is_cancelled() {
            tracing::info!(variant = %self.variant.name, "Cancelled before start, not deploying");
            self.progress.complete(&self.variant.name, TaskPhase::Failed);
            return BenchmarkResult::not_started(
                &self.variant,
                TaskFailure::Cancelled {
                    phase: TaskPhase::Queued,
                },
            );
        }

        self.enter(TaskPhase::Deploying);
        let deployment = match self.deploy().await {
            Ok(deployment) => deployment,
            Err(error) => {
                let failure = match error {
                    DeployError::Cancelled { .. } => TaskFailure::Cancelled {
                        phase: TaskPhase::Deploying,
                    },
                    other => TaskFailure::DeploymentFailed {
                        reason: other.to_string(),
                    },
                };
                self.transition(VariantState::Failed);
                // Partial resources may exist even though deploy failed.
                let target = self.provider.identifier_for(&self.variant);
                return self.finish(Some(target), Some(failure)).await;
            }
        };

        self.transition(VariantState::Deployed);
        self.progress
            .record_deployment(&self.variant.name, deployment.id.clone());

        self.enter(TaskPhase::WaitingCold);
        let wait = self
            .detector
            .wait_until_ready(self.provider.as_ref(), &deployment.id, &self.cancel)
            .await;
        match wait {
            Ok(elapsed) => {
                self.time_to_ready = Some(elapsed);
                self.transition(VariantState::Ready);
            }
            Err(ReadinessError::Cancelled { .. }) => {
                let failure = TaskFailure::Cancelled {
                    phase: TaskPhase::WaitingCold,
                };
                return self.finish(Some(deployment.id), Some(failure)).await;
            }
            Err(e) => {
                tracing::warn!(variant = %self.variant.name, error = %e, "Deployment never became ready");
                self.transition(VariantState::Failed);
                let failure = TaskFailure::DeploymentNotReady {
                    reason: e.to_string(),
                };
                return self.finish(Some(deployment.id), Some(failure)).await;
            }
        }

        self.transition(VariantState::Measuring);
        let failure = match self.measure(&deployment).await {
            Ok(()) if self.samples.iter().any(|s| s.outcome.is_success()) => None,
            Ok(()) if self.samples.is_empty() => None,
            Ok(()) => Some(TaskFailure::MeasurementFailed {
                reason: format!("all {} invocation attempts failed", self.samples.len()),
            }),
            Err(Cancelled) => Some(TaskFailure::Cancelled { phase: self.phase }),
        };

        self.finish(Some(deployment.id), failure).await
    }

    /// Deploy with retries on transient errors.
    async fn deploy(&mut self) -> Result<Deployment, DeployError> {
        let policy = self.settings.deploy_retry.clone();
        let mut attempts = 0u32;
        let mut waited = Duration::ZERO;

        loop {
            attempts += 1;
            let t0 = LatencyClock::start();
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(DeployError::Cancelled {
                    variant: self.variant.name.clone(),
                }),
                result = self.provider.deploy(&self.variant) => result,
            };

            let error = match result {
                Ok(deployment) => {
                    let duration = LatencyClock::elapsed(t0);
                    tracing::info!(
                        variant = %self.variant.name,
                        url = %deployment.url,
                        attempts,
                        duration = %LatencyClock::format(duration),
                        "Deployed"
                    );
                    self.deployment = DeploymentOutcome::Deployed {
                        deployment: deployment.clone(),
                        duration_ns: duration.as_nanos() as u64,
                        attempts,
                    };
                    return Ok(deployment);
                }
                Err(e) => e,
            };

            let delay = policy.backoff(attempts - 1);
            if !error.is_transient() || !policy.allows(attempts, waited, delay) {
                tracing::error!(variant = %self.variant.name, attempts, error = %error, "Deployment failed");
                self.deployment = DeploymentOutcome::Failed {
                    reason: error.to_string(),
                    attempts,
                };
                return Err(error);
            }

            tracing::warn!(
                variant = %self.variant.name,
                attempt = attempts,
                retry_in = %LatencyClock::format(delay),
                error = %error,
                "Transient deployment failure, retrying"
            );

            if self.sleep(delay).await.is_err() {
                let error = DeployError::Cancelled {
                    variant: self.variant.name.clone(),
                };
                self.deployment = DeploymentOutcome::Failed {
                    reason: error.to_string(),
                    attempts,
                };
                return Err(error);
            }
            waited += delay;
        }
    }

    async fn measure(&mut self, deployment: &Deployment) -> Result<(), Cancelled> {
        self.enter(TaskPhase::MeasuringCold);
        for _ in 0..self.settings.cold_samples {
            self.measure_cold_sample(&deployment.url).await?;
        }

        self.enter(TaskPhase::MeasuringWarm);
        for _ in 0..self.settings.warm_samples {
            self.measure_warm_sample(&deployment.url).await?;
        }

        Ok(())
    }

    /// One cold sample: idle past the eviction threshold before every attempt.
    async fn measure_cold_sample(&mut self, url: &str) -> Result<(), Cancelled> {
        let mut failures = 0u32;
        let mut ambiguous = 0u32;

        loop {
            self.detector.force_eviction(&self.cancel).await?;
            let attempt = self.invoke(url).await?;

            let assessment = match &attempt.response {
                Some(response) if attempt.outcome.is_success() => {
                    Some(self.detector.assess_cold(response))
                }
                _ => None,
            };

            match assessment {
                Some(ColdAssessment::Confirmed) => {
                    let class = self.detector.classify();
                    self.detector.record_cold(attempt.elapsed);
                    self.record(attempt, class, Confidence::High);
                    return Ok(());
                }
                Some(ColdAssessment::Ambiguous { reason })
                    if ambiguous < self.settings.cold_retry_budget =>
                {
                    self.detector.classify();
                    ambiguous += 1;
                    self.ambiguous_discarded += 1;
                    tracing::warn!(
                        variant = %self.variant.name,
                        retry = ambiguous,
                        reason = %reason,
                        "Ambiguous cold sample discarded, forcing eviction again"
                    );
                    continue;
                }
                Some(ColdAssessment::Ambiguous { reason }) => {
                    tracing::warn!(
                        variant = %self.variant.name,
                        reason = %reason,
                        "Cold retry budget exhausted, recording low-confidence sample"
                    );
                    let class = self.detector.classify();
                    self.record(attempt, class, Confidence::Low);
                    return Ok(());
                }
                None => {
                    self.record(attempt, Classification::Cold, Confidence::High);
                    failures += 1;
                }
            }

            if failures > self.settings.invocation_retries {
                tracing::warn!(variant = %self.variant.name, failures, "Cold sample missing after retries");
                return Ok(());
            }
        }
    }

    /// One warm sample, retried immediately on failure. Always Warm: the
    /// cold phase has already consumed the fresh instance.
    async fn measure_warm_sample(&mut self, url: &str) -> Result<(), Cancelled> {
        let mut failures = 0u32;

        loop {
            let attempt = self.invoke(url).await?;
            let succeeded = attempt.outcome.is_success();
            self.record(attempt, Classification::Warm, Confidence::High);
            if succeeded {
                return Ok(());
            }

            failures += 1;
            if failures > self.settings.invocation_retries {
                tracing::warn!(variant = %self.variant.name, failures, "Warm sample missing after retries");
                return Ok(());
            }
        }
    }

    async fn invoke(&self, url: &str) -> Result<Attempt, Cancelled> {
        let timestamp = Utc::now();
        let t0 = LatencyClock::start();
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Cancelled),
            result = self.client.invoke(url, &self.settings.payload) => result,
        };

        Ok(match result {
            Ok(response) => Attempt {
                timestamp,
                elapsed: response.elapsed,
                outcome: if response.is_success() {
                    SampleOutcome::Success
                } else {
                    SampleOutcome::HttpError {
                        code: response.status,
                    }
                },
                response: Some(response),
            },
            Err(e) => {
                tracing::debug!(variant = %self.variant.name, error = %e, "Invocation failed");
                Attempt {
                    timestamp,
                    elapsed: LatencyClock::elapsed(t0),
                    outcome: SampleOutcome::NetworkError {
                        reason: e.to_string(),
                    },
                    response: None,
                }
            }
        })
    }

    fn record(&mut self, attempt: Attempt, class: Classification, confidence: Confidence) {
        let sample = InvocationSample {
            variant: self.variant.name.clone(),
            sequence: self.samples.len() as u32 + 1,
            timestamp: attempt.timestamp,
            elapsed_ns: attempt.elapsed.as_nanos() as u64,
            classification: class,
            confidence,
            outcome: attempt.outcome,
        };
        tracing::debug!(
            variant = %self.variant.name,
            sequence = sample.sequence,
            class = ?class,
            elapsed = %LatencyClock::format(attempt.elapsed),
            outcome = ?sample.outcome,
            "Sample recorded"
        );
        self.samples.push(sample);
    }

    async fn sleep(&self, delay: Duration) -> Result<(), Cancelled> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Clean up and assemble the final result. Not cancellable.
    async fn finish(
        mut self,
        target: Option<DeploymentId>,
        failure: Option<TaskFailure>,
    ) -> BenchmarkResult {
        self.enter(TaskPhase::CleaningUp);

        let cleanup = match target {
            Some(id) => self.cleanup(&id).await,
            None => CleanupOutcome::NotRequired,
        };

        let phase = if failure.is_some() {
            TaskPhase::Failed
        } else {
            TaskPhase::Done
        };
        self.phase = phase;
        self.progress.complete(&self.variant.name, phase);

        BenchmarkResult {
            variant: self.variant.name.clone(),
            role: self.variant.role(),
            deployment: self.deployment,
            time_to_ready_ns: self.time_to_ready.map(|d| d.as_nanos() as u64),
            cold: GroupSummary::from_samples(&self.samples, Classification::Cold),
            warm: GroupSummary::from_samples(&self.samples, Classification::Warm),
            samples: self.samples,
            ambiguous_discarded: self.ambiguous_discarded,
            cleanup,
            final_state: self.lifecycle.state(),
            phase,
            failure,
        }
    }

    async fn cleanup(&mut self, id: &DeploymentId) -> CleanupOutcome {
        match self.provider.delete(id).await {
            Ok(()) => {
                self.progress.clear_deployment(&self.variant.name);
                self.transition(VariantState::Deleted);
                tracing::info!(variant = %self.variant.name, deployment = %id, "Deleted");
                CleanupOutcome::Deleted
            }
            Err(e) => {
                tracing::error!(variant = %self.variant.name, deployment = %id, error = %e, "Cleanup failed");
                CleanupOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn enter(&mut self, phase: TaskPhase) {
        tracing::info!(variant = %self.variant.name, from = %self.phase, to = %phase, "Phase change");
        self.phase = phase;
        self.progress.set_phase(&self.variant.name, phase);
    }

    fn transition(&mut self, state: VariantState) {
        if let Err(e) = self.lifecycle.transition_to(state) {
            tracing::warn!(variant = %self.variant.name, error = %e, "Ignored lifecycle transition");
        }
    }
}
