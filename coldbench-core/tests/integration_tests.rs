// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end tests for the benchmark engine.
//!
//! A fake provider and a fake client stand in for the platform. The client
//! models instance recycling: a URL idle for longer than its eviction window
//! serves the next request from a new (cold) instance. All tests run on
//! paused tokio time, so idle gaps and backoff cost nothing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use coldbench_core::{
    BenchmarkSettings, Classification, CleanupOutcome, ConcurrencyManager, Confidence,
    DeleteError, DeployError, Deployment, DeploymentId, DeploymentOutcome, DeploymentProvider,
    FunctionVariant, Generation, InvocationClient, InvocationError, InvocationResponse,
    ProgressTracker, ReadinessError, ReadyState, ReportBuilder, RetryPolicy, RuntimeVersion,
    SampleOutcome, SourceBundle, TaskFailure, TaskPhase, VariantName, VariantState,
};

// =============================================================================
// Fakes
// =============================================================================

#[derive(Default)]
struct FakeProvider {
    deploy_delay: Duration,
    rejected: HashSet<String>,
    never_ready: HashSet<String>,
    /// Deletes of these ids fail, leaving the function in place.
    delete_failures: HashSet<String>,
    /// Deploys of these variants create the function, then crash.
    panic_on_deploy: HashSet<String>,
    transient_failures: AtomicU32,
    deploy_calls: Mutex<Vec<String>>,
    delete_calls: Mutex<HashMap<String, u32>>,
    live: Mutex<HashSet<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    polls: Mutex<HashMap<String, u32>>,
}

impl FakeProvider {
    fn deploys(&self) -> Vec<String> {
        self.deploy_calls.lock().unwrap().clone()
    }

    fn deletes_of(&self, name: &str) -> u32 {
        self.delete_calls
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeploymentProvider for FakeProvider {
    async fn deploy(&self, variant: &FunctionVariant) -> Result<Deployment, DeployError> {
        let name = variant.name.as_str().to_string();
        self.deploy_calls.lock().unwrap().push(name.clone());
        tokio::time::sleep(self.deploy_delay).await;

        if self.panic_on_deploy.contains(&name) {
            self.live.lock().unwrap().insert(name.clone());
            self.active.fetch_add(1, Ordering::SeqCst);
            panic!("provider crashed while deploying {}", name);
        }

        if self.rejected.contains(&name) {
            return Err(DeployError::Rejected {
                variant: variant.name.clone(),
                reason: "invalid runtime".to_string(),
            });
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DeployError::Transient {
                variant: variant.name.clone(),
                reason: "429 quota exceeded".to_string(),
            });
        }

        if self.live.lock().unwrap().insert(name.clone()) {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
        }

        Ok(Deployment {
            id: DeploymentId::new(name.clone()),
            url: format!("https://{}.fake.run", name),
        })
    }

    async fn delete(&self, id: &DeploymentId) -> Result<(), DeleteError> {
        *self
            .delete_calls
            .lock()
            .unwrap()
            .entry(id.as_str().to_string())
            .or_insert(0) += 1;
        if self.delete_failures.contains(id.as_str()) {
            return Err(DeleteError::Failed {
                deployment: id.clone(),
                reason: "permission denied".to_string(),
            });
        }
        if self.live.lock().unwrap().remove(id.as_str()) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn describe(&self, id: &DeploymentId) -> Result<ReadyState, ReadinessError> {
        if self.never_ready.contains(id.as_str()) {
            return Ok(ReadyState::NotReadyYet);
        }
        let mut polls = self.polls.lock().unwrap();
        let count = polls.entry(id.as_str().to_string()).or_insert(0);
        *count += 1;
        // Visible on the second poll.
        Ok(if *count >= 2 {
            ReadyState::Ready
        } else {
            ReadyState::NotReadyYet
        })
    }
}

struct FakeClient {
    eviction_window: Duration,
    last_used: Mutex<HashMap<String, Instant>>,
    /// Cold responses that still claim a reused instance.
    reused_cold_responses: AtomicU32,
    /// Invocations answered with HTTP 500 before the function behaves.
    server_errors: AtomicU32,
    panic_on: HashSet<String>,
    calls: AtomicU32,
}

impl FakeClient {
    fn new() -> Self {
        Self {
            eviction_window: Duration::from_secs(30),
            last_used: Mutex::new(HashMap::new()),
            reused_cold_responses: AtomicU32::new(0),
            server_errors: AtomicU32::new(0),
            panic_on: HashSet::new(),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl InvocationClient for FakeClient {
    async fn invoke(
        &self,
        url: &str,
        _payload: &serde_json::Value,
    ) -> Result<InvocationResponse, InvocationError> {
        if self.panic_on.iter().any(|p| url.contains(p.as_str())) {
            panic!("handler crashed for {}", url);
        }

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = Instant::now();
        let cold = {
            let mut last_used = self.last_used.lock().unwrap();
            let cold = match last_used.get(url) {
                Some(at) => now.duration_since(*at) >= self.eviction_window,
                None => true,
            };
            last_used.insert(url.to_string(), now);
            cold
        };

        let errors = self.server_errors.load(Ordering::SeqCst);
        if errors > 0 {
            self.server_errors.store(errors - 1, Ordering::SeqCst);
            return Ok(InvocationResponse {
                status: 500,
                elapsed: Duration::from_millis(20),
                body: "internal error".to_string(),
                instance_reused: None,
            });
        }

        let agent_penalty = if url.contains("agent") { 400 } else { 0 };
        let jitter = u64::from(call % 5) * 10;
        let (elapsed, mut reused) = if cold {
            (Duration::from_millis(800 + agent_penalty + jitter), false)
        } else {
            (Duration::from_millis(40 + agent_penalty / 10 + jitter), true)
        };

        if cold {
            let remaining = self.reused_cold_responses.load(Ordering::SeqCst);
            if remaining > 0 {
                self.reused_cold_responses.store(remaining - 1, Ordering::SeqCst);
                reused = true;
            }
        }

        tokio::time::sleep(elapsed).await;
        Ok(InvocationResponse {
            status: 200,
            elapsed,
            body: format!("{{\"isColdStart\":{}}}", !reused),
            instance_reused: Some(reused),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn variant(name: &str, agent: bool) -> FunctionVariant {
    FunctionVariant {
        name: VariantName::new(name).unwrap(),
        generation: Generation::Gen2,
        runtime: RuntimeVersion::new("nodejs20").unwrap(),
        agent_enabled: agent,
        entry_point: "helloWorld".to_string(),
        source: SourceBundle::new_unchecked("./functions/hello"),
        environment: BTreeMap::new(),
    }
}

fn settings() -> BenchmarkSettings {
    BenchmarkSettings {
        concurrency: 4,
        cold_samples: 2,
        warm_samples: 3,
        eviction_gap: Duration::from_secs(60),
        readiness: RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(8),
            max_wait: None,
        },
        deploy_retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(5),
            multiplier: 3.0,
            max_backoff: Duration::from_secs(60),
            max_wait: None,
        },
        invocation_retries: 2,
        cold_retry_budget: 2,
        ambiguity_ratio: 0.25,
        alpha: 0.05,
        deadline: None,
        payload: serde_json::json!({ "message": "hi" }),
    }
}

fn manager(
    provider: Arc<FakeProvider>,
    client: Arc<FakeClient>,
    settings: BenchmarkSettings,
) -> ConcurrencyManager {
    ConcurrencyManager::new(provider, client, settings)
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_run_classifies_and_cleans_up() {
    let provider = Arc::new(FakeProvider::default());
    let client = Arc::new(FakeClient::new());
    let manager = manager(provider.clone(), client, settings());

    let outcome = manager
        .run(vec![variant("hello-plain", false), variant("hello-agent", true)])
        .await;

    assert_eq!(outcome.results.len(), 2);
    assert!(!outcome.deadline_hit);
    assert!(!outcome.aborted);

    for result in &outcome.results {
        assert_eq!(result.phase, TaskPhase::Done, "{:?}", result.failure);
        assert_eq!(result.cleanup, CleanupOutcome::Deleted);
        assert_eq!(result.final_state, VariantState::Deleted);
        assert!(result.time_to_ready_ns.is_some());
        assert!(result.deployment.is_deployed());

        let classes: Vec<Classification> =
            result.samples.iter().map(|s| s.classification).collect();
        assert_eq!(
            classes,
            vec![
                Classification::Cold,
                Classification::Cold,
                Classification::Warm,
                Classification::Warm,
                Classification::Warm,
            ]
        );
        assert!(result
            .samples
            .iter()
            .all(|s| s.confidence == Confidence::High && s.outcome.is_success()));
        let sequences: Vec<u32> = result.samples.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
        assert_eq!(result.cold.succeeded, 2);
        assert_eq!(result.warm.succeeded, 3);
        assert_eq!(provider.deletes_of(result.variant.as_str()), 1);
    }

    // Results keep input order.
    assert_eq!(outcome.results[0].variant.as_str(), "hello-plain");
    assert_eq!(outcome.results[1].variant.as_str(), "hello-agent");
}

#[tokio::test(start_paused = true)]
async fn test_warm_phase_samples_are_always_warm() {
    let provider = Arc::new(FakeProvider::default());
    let client = Arc::new(FakeClient::new());
    let settings = BenchmarkSettings {
        cold_samples: 0,
        warm_samples: 4,
        ..settings()
    };
    let manager = manager(provider, client, settings);

    let outcome = manager.run(vec![variant("burst", false)]).await;
    let classes: Vec<Classification> = outcome.results[0]
        .samples
        .iter()
        .map(|s| s.classification)
        .collect();
    assert_eq!(classes, vec![Classification::Warm; 4]);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrency_limit_respected() {
    let provider = Arc::new(FakeProvider {
        deploy_delay: Duration::from_secs(1),
        ..FakeProvider::default()
    });
    let client = Arc::new(FakeClient::new());
    let manager = manager(provider.clone(), client, settings());

    let variants: Vec<FunctionVariant> = (0..10)
        .map(|i| variant(&format!("fn-{:03}", i), i % 2 == 1))
        .collect();
    let tracker = Arc::new(ProgressTracker::new(&variants));
    let outcome = manager.run_tracked(variants, tracker.clone()).await;

    assert_eq!(outcome.results.len(), 10);
    assert!(outcome.results.iter().all(|r| r.is_success()));
    assert_eq!(provider.peak(), 4);
    assert_eq!(provider.deploys().len(), 10);
    for result in &outcome.results {
        assert_eq!(provider.deletes_of(result.variant.as_str()), 1);
    }

    let progress = tracker.snapshot();
    assert_eq!(progress.completed, 10);
    assert_eq!(progress.failed, 0);
    assert!(tracker.live_deployments().is_empty());
}

// =============================================================================
// Failure isolation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_deploy_failure_is_isolated() {
    let provider = Arc::new(FakeProvider {
        rejected: HashSet::from(["broken".to_string()]),
        ..FakeProvider::default()
    });
    let client = Arc::new(FakeClient::new());
    let manager = manager(provider.clone(), client, settings());

    let outcome = manager
        .run(vec![variant("broken", true), variant("fine", false)])
        .await;

    let broken = &outcome.results[0];
    assert_eq!(broken.phase, TaskPhase::Failed);
    assert!(matches!(
        broken.failure,
        Some(TaskFailure::DeploymentFailed { .. })
    ));
    assert!(matches!(
        broken.deployment,
        DeploymentOutcome::Failed { attempts: 1, .. }
    ));
    assert!(broken.samples.is_empty());
    // Best-effort cleanup of partial resources.
    assert_eq!(provider.deletes_of("broken"), 1);

    assert!(outcome.results[1].is_success());
}

#[tokio::test(start_paused = true)]
async fn test_transient_deploy_errors_retried() {
    let provider = Arc::new(FakeProvider {
        transient_failures: AtomicU32::new(2),
        ..FakeProvider::default()
    });
    let client = Arc::new(FakeClient::new());
    let manager = manager(provider.clone(), client, settings());

    let outcome = manager.run(vec![variant("flaky", false)]).await;
    let result = &outcome.results[0];

    assert!(result.is_success());
    assert!(matches!(
        result.deployment,
        DeploymentOutcome::Deployed { attempts: 3, .. }
    ));
    assert_eq!(provider.deploys().len(), 3);
    assert_eq!(provider.deletes_of("flaky"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deployment_not_ready() {
    let provider = Arc::new(FakeProvider {
        never_ready: HashSet::from(["stuck".to_string()]),
        ..FakeProvider::default()
    });
    let client = Arc::new(FakeClient::new());
    let manager = manager(provider.clone(), client.clone(), settings());

    let outcome = manager
        .run(vec![variant("stuck", false), variant("other", true)])
        .await;

    let stuck = &outcome.results[0];
    assert!(matches!(
        stuck.failure,
        Some(TaskFailure::DeploymentNotReady { .. })
    ));
    assert_eq!(stuck.final_state, VariantState::Deleted);
    assert_eq!(provider.deletes_of("stuck"), 1);
    assert!(stuck.samples.is_empty());
    assert!(outcome.results[1].is_success());
}

#[tokio::test(start_paused = true)]
async fn test_panicking_task_is_contained() {
    let provider = Arc::new(FakeProvider::default());
    let client = Arc::new(FakeClient {
        panic_on: HashSet::from(["crashy".to_string()]),
        ..FakeClient::new()
    });
    let manager = manager(provider.clone(), client, settings());

    let outcome = manager
        .run(vec![variant("crashy", false), variant("steady", true)])
        .await;

    let crashed = &outcome.results[0];
    assert!(matches!(crashed.failure, Some(TaskFailure::Faulted { .. })));
    assert_eq!(crashed.cleanup, CleanupOutcome::Deleted);
    assert_eq!(provider.deletes_of("crashy"), 1);

    assert!(outcome.results[1].is_success());
    assert_eq!(provider.deletes_of("steady"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_panic_during_deploy_cleans_up_partial_function() {
    let provider = Arc::new(FakeProvider {
        panic_on_deploy: HashSet::from(["half-made".to_string()]),
        ..FakeProvider::default()
    });
    let client = Arc::new(FakeClient::new());
    let manager = manager(provider.clone(), client, settings());

    let outcome = manager
        .run(vec![variant("half-made", true), variant("whole", false)])
        .await;

    let crashed = &outcome.results[0];
    assert!(matches!(crashed.failure, Some(TaskFailure::Faulted { .. })));
    assert_eq!(crashed.cleanup, CleanupOutcome::Deleted);
    assert_eq!(provider.deletes_of("half-made"), 1);
    assert!(provider.live.lock().unwrap().is_empty());

    assert!(outcome.results[1].is_success());
}

#[tokio::test(start_paused = true)]
async fn test_delete_failure_keeps_measurements() {
    let provider = Arc::new(FakeProvider {
        delete_failures: HashSet::from(["sticky".to_string()]),
        ..FakeProvider::default()
    });
    let client = Arc::new(FakeClient::new());
    let settings = settings();
    let manager = manager(provider.clone(), client, settings.clone());

    let outcome = manager
        .run(vec![variant("sticky", true), variant("clean", false)])
        .await;

    let sticky = &outcome.results[0];
    assert_eq!(provider.deletes_of("sticky"), 1);
    assert!(matches!(sticky.cleanup, CleanupOutcome::Failed { .. }));
    assert_eq!(sticky.phase, TaskPhase::Done);
    assert!(sticky.failure.is_none());
    assert_eq!(sticky.final_state, VariantState::Measuring);
    assert_eq!(sticky.samples.len(), 5);
    assert_eq!(sticky.cold.succeeded, 2);
    assert_eq!(sticky.warm.succeeded, 3);

    assert_eq!(outcome.results[1].cleanup, CleanupOutcome::Deleted);
    assert_eq!(provider.deletes_of("clean"), 1);

    let report = ReportBuilder::default()
        .with_settings(settings)
        .build_outcome(&outcome);
    assert_eq!(report.deployments.cleanup_failures, 1);
    assert_eq!(report.deployments.completed, 2);
}

// =============================================================================
// Measurement edge cases
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_ambiguous_cold_sample_is_reforced() {
    let provider = Arc::new(FakeProvider::default());
    let client = Arc::new(FakeClient::new());
    client.reused_cold_responses.store(1, Ordering::SeqCst);
    let settings = BenchmarkSettings {
        cold_samples: 1,
        warm_samples: 1,
        ..settings()
    };
    let manager = manager(provider, client, settings);

    let outcome = manager.run(vec![variant("reuse", false)]).await;
    let result = &outcome.results[0];

    assert_eq!(result.ambiguous_discarded, 1);
    assert_eq!(result.samples.len(), 2);
    assert_eq!(result.samples[0].classification, Classification::Cold);
    assert_eq!(result.samples[0].confidence, Confidence::High);
}

#[tokio::test(start_paused = true)]
async fn test_cold_retry_budget_exhausted_records_low_confidence() {
    let provider = Arc::new(FakeProvider::default());
    let client = Arc::new(FakeClient::new());
    client.reused_cold_responses.store(10, Ordering::SeqCst);
    let settings = BenchmarkSettings {
        cold_samples: 1,
        warm_samples: 0,
        ..settings()
    };
    let manager = manager(provider, client, settings);

    let outcome = manager.run(vec![variant("reuse", false)]).await;
    let result = &outcome.results[0];

    assert_eq!(result.ambiguous_discarded, 2);
    assert_eq!(result.samples.len(), 1);
    assert_eq!(result.samples[0].classification, Classification::Cold);
    assert_eq!(result.samples[0].confidence, Confidence::Low);
    assert_eq!(result.cold.low_confidence, 1);
    assert!(result.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_failed_invocations_recorded_and_retried() {
    let provider = Arc::new(FakeProvider::default());
    let client = Arc::new(FakeClient::new());
    client.server_errors.store(2, Ordering::SeqCst);
    let settings = BenchmarkSettings {
        cold_samples: 1,
        warm_samples: 2,
        ..settings()
    };
    let manager = manager(provider, client, settings);

    let outcome = manager.run(vec![variant("errors", false)]).await;
    let result = &outcome.results[0];

    assert!(result.is_success());
    let outcomes: Vec<&SampleOutcome> = result.samples.iter().map(|s| &s.outcome).collect();
    assert_eq!(outcomes.len(), 5);
    assert_eq!(*outcomes[0], SampleOutcome::HttpError { code: 500 });
    assert_eq!(*outcomes[1], SampleOutcome::HttpError { code: 500 });
    assert!(outcomes[2..].iter().all(|o| o.is_success()));
    assert_eq!(result.cold.attempted, 3);
    assert_eq!(result.cold.failed, 2);
    assert_eq!(result.cold.succeeded, 1);
}

#[tokio::test(start_paused = true)]
async fn test_all_invocations_failing_marks_measurement_failed() {
    let provider = Arc::new(FakeProvider::default());
    let client = Arc::new(FakeClient::new());
    client.server_errors.store(u32::MAX, Ordering::SeqCst);
    let settings = BenchmarkSettings {
        cold_samples: 1,
        warm_samples: 1,
        invocation_retries: 1,
        ..settings()
    };
    let manager = manager(provider.clone(), client, settings);

    let outcome = manager.run(vec![variant("down", false)]).await;
    let result = &outcome.results[0];

    assert!(matches!(
        result.failure,
        Some(TaskFailure::MeasurementFailed { .. })
    ));
    // Two attempts per sample, nothing retried beyond the bound.
    assert_eq!(result.samples.len(), 4);
    assert_eq!(provider.deletes_of("down"), 1);
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_deadline_cancels_queued_and_cleans_deployed() {
    let provider = Arc::new(FakeProvider::default());
    let client = Arc::new(FakeClient::new());
    let settings = BenchmarkSettings {
        concurrency: 1,
        eviction_gap: Duration::from_secs(100),
        deadline: Some(Duration::from_secs(50)),
        ..settings()
    };
    let manager = manager(provider.clone(), client, settings);

    let outcome = manager
        .run(vec![
            variant("first", false),
            variant("second", true),
            variant("third", false),
        ])
        .await;

    assert!(outcome.deadline_hit);
    assert!(!outcome.aborted);
    assert_eq!(outcome.results.len(), 3);
    assert_eq!(provider.deploys(), vec!["first".to_string()]);

    let first = &outcome.results[0];
    assert_eq!(
        first.failure,
        Some(TaskFailure::Cancelled {
            phase: TaskPhase::MeasuringCold
        })
    );
    assert_eq!(first.final_state, VariantState::Deleted);
    assert_eq!(provider.deletes_of("first"), 1);

    for queued in &outcome.results[1..] {
        assert_eq!(queued.deployment, DeploymentOutcome::NotAttempted);
        assert_eq!(
            queued.failure,
            Some(TaskFailure::Cancelled {
                phase: TaskPhase::Queued
            })
        );
        assert_eq!(provider.deletes_of(queued.variant.as_str()), 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_abort_before_start_never_deploys() {
    let provider = Arc::new(FakeProvider::default());
    let client = Arc::new(FakeClient::new());
    let manager = manager(provider.clone(), client, settings());

    manager.abort_handle().cancel();
    let outcome = manager
        .run(vec![variant("a", false), variant("b", true)])
        .await;

    assert!(outcome.aborted);
    assert!(provider.deploys().is_empty());
    assert!(outcome
        .results
        .iter()
        .all(|r| r.cleanup == CleanupOutcome::NotRequired));
}

// =============================================================================
// Report
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_run_report_detects_agent_overhead() {
    let provider = Arc::new(FakeProvider::default());
    let client = Arc::new(FakeClient::new());
    let settings = BenchmarkSettings {
        cold_samples: 3,
        warm_samples: 5,
        ..settings()
    };
    let manager = manager(provider, client, settings.clone());

    let outcome = manager
        .run(vec![
            variant("plain-001", false),
            variant("plain-002", false),
            variant("agent-001", true),
            variant("agent-002", true),
        ])
        .await;

    let report = ReportBuilder::default()
        .with_settings(settings)
        .build_outcome(&outcome);

    assert_eq!(report.deployments.total, 4);
    assert_eq!(report.deployments.completed, 4);
    assert_eq!(report.deployments.cleanup_failures, 0);

    let cold = report.comparisons.cold.verdict().unwrap();
    assert_eq!(cold.control.count, 6);
    assert_eq!(cold.treatment.count, 6);
    assert!(cold.significant);
    assert!(cold.overhead_mean > 0.0);
    assert!(report.comparisons.warm.verdict().is_some());
    assert!(report.any_significant());
}
