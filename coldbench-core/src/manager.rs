// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Bounded worker pool for benchmark tasks.
//!
//! At most `concurrency` tasks hold a permit at once. Each task runs in its
//! own spawned future so a panic is caught at the join handle instead of
//! tearing down the run; the manager then cleans up whatever deployment the
//! progress board still lists for that variant. Every variant yields exactly
//! one `BenchmarkResult`, in input order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::clock::LatencyClock;
use crate::config::BenchmarkSettings;
use crate::progress::ProgressTracker;
use crate::provider::{DeploymentProvider, InvocationClient};
use crate::result::{BenchmarkResult, CleanupOutcome, TaskFailure};
use crate::state::TaskPhase;
use crate::task::BenchmarkTask;
use crate::variant::FunctionVariant;

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// One result per scheduled variant, in input order.
    pub results: Vec<BenchmarkResult>,
    /// The global deadline fired before all tasks finished.
    pub deadline_hit: bool,
    /// The abort handle was triggered.
    pub aborted: bool,
    pub elapsed: Duration,
}

/// Shared handles cloned into every worker slot.
#[derive(Clone)]
struct SlotContext {
    provider: Arc<dyn DeploymentProvider>,
    client: Arc<dyn InvocationClient>,
    settings: Arc<BenchmarkSettings>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    progress: Arc<ProgressTracker>,
}

/// Runs benchmark tasks with bounded parallelism and failure isolation.
pub struct ConcurrencyManager {
    provider: Arc<dyn DeploymentProvider>,
    client: Arc<dyn InvocationClient>,
    settings: Arc<BenchmarkSettings>,
    abort: CancellationToken,
}

impl ConcurrencyManager {
    pub fn new(
        provider: Arc<dyn DeploymentProvider>,
        client: Arc<dyn InvocationClient>,
        settings: BenchmarkSettings,
    ) -> Self {
        Self {
            provider,
            client,
            settings: Arc::new(settings),
            abort: CancellationToken::new(),
        }
    }

    /// Cancelling this token aborts the run. Tasks that already deployed
    /// still clean up.
    pub fn abort_handle(&self) -> CancellationToken {
        self.abort.clone()
    }

    pub fn settings(&self) -> &BenchmarkSettings {
        &self.settings
    }

    /// Run every variant and wait for all of them.
    pub async fn run(&self, variants: Vec<FunctionVariant>) -> RunOutcome {
        let progress = Arc::new(ProgressTracker::new(&variants));
        self.run_tracked(variants, progress).await
    }

    /// Like [`run`](Self::run), reporting into a caller-owned tracker.
    pub async fn run_tracked(
        &self,
        variants: Vec<FunctionVariant>,
        progress: Arc<ProgressTracker>,
    ) -> RunOutcome {
        let t0 = LatencyClock::start();
        let total = variants.len();
        let cancel = self.abort.child_token();
        let deadline_hit = Arc::new(AtomicBool::new(false));

        tracing::info!(
            variants = total,
            concurrency = self.settings.concurrency,
            deadline = ?self.settings.deadline,
            "Starting benchmark run"
        );

        let deadline_guard = self.settings.deadline.map(|deadline| {
            let cancel = cancel.clone();
            let flag = deadline_hit.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(deadline) => {
                        tracing::warn!(deadline = ?deadline, "Global deadline reached, cancelling tasks");
                        flag.store(true, Ordering::SeqCst);
                        cancel.cancel();
                    }
                }
            })
        });

        let ctx = SlotContext {
            provider: self.provider.clone(),
            client: self.client.clone(),
            settings: self.settings.clone(),
            semaphore: Arc::new(Semaphore::new(self.settings.concurrency)),
            cancel: cancel.clone(),
            progress,
        };

        let mut slots = JoinSet::new();
        for (index, variant) in variants.iter().cloned().enumerate() {
            slots.spawn(run_slot(ctx.clone(), index, variant));
        }

        let mut results: Vec<Option<BenchmarkResult>> = (0..total).map(|_| None).collect();
        while let Some(joined) = slots.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "Worker slot terminated abnormally"),
            }
        }

        if let Some(guard) = deadline_guard {
            guard.abort();
        }

        let results: Vec<BenchmarkResult> = results
            .into_iter()
            .zip(&variants)
            .map(|(result, variant)| {
                result.unwrap_or_else(|| {
                    BenchmarkResult::faulted(
                        variant,
                        "worker slot terminated".to_string(),
                        CleanupOutcome::NotRequired,
                    )
                })
            })
            .collect();

        let outcome = RunOutcome {
            deadline_hit: deadline_hit.load(Ordering::SeqCst),
            aborted: self.abort.is_cancelled(),
            elapsed: LatencyClock::elapsed(t0),
            results,
        };

        tracing::info!(
            results = outcome.results.len(),
            succeeded = outcome.results.iter().filter(|r| r.is_success()).count(),
            deadline_hit = outcome.deadline_hit,
            aborted = outcome.aborted,
            elapsed = %LatencyClock::format(outcome.elapsed),
            "Benchmark run finished"
        );

        outcome
    }
}

async fn run_slot(
    ctx: SlotContext,
    index: usize,
    variant: FunctionVariant,
) -> (usize, BenchmarkResult) {
    let permit = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => None,
        permit = ctx.semaphore.clone().acquire_owned() => permit.ok(),
    };

    let Some(permit) = permit else {
        ctx.progress.complete(&variant.name, TaskPhase::Failed);
        let failure = TaskFailure::Cancelled {
            phase: TaskPhase::Queued,
        };
        return (index, BenchmarkResult::not_started(&variant, failure));
    };

    let task = BenchmarkTask::new(
        variant.clone(),
        ctx.provider.clone(),
        ctx.client.clone(),
        ctx.settings.clone(),
        ctx.cancel.clone(),
        ctx.progress.clone(),
    );

    let result = match tokio::spawn(task.run()).await {
        Ok(result) => result,
        Err(join_error) => {
            let reason = if join_error.is_panic() {
                "benchmark task panicked"
            } else {
                "benchmark task aborted"
            };
            tracing::error!(variant = %variant.name, error = %join_error, "{}", reason);

            // A panic inside deploy leaves nothing recorded, but partial
            // resources may still exist under the provider's identifier.
            let target = ctx.progress.deployment_of(&variant.name).or_else(|| {
                (ctx.progress.phase_of(&variant.name) == Some(TaskPhase::Deploying))
                    .then(|| ctx.provider.identifier_for(&variant))
            });

            let cleanup = match target {
                Some(id) => match ctx.provider.delete(&id).await {
                    Ok(()) => {
                        ctx.progress.clear_deployment(&variant.name);
                        CleanupOutcome::Deleted
                    }
                    Err(e) => CleanupOutcome::Failed {
                        reason: e.to_string(),
                    },
                },
                None => CleanupOutcome::NotRequired,
            };

            ctx.progress.complete(&variant.name, TaskPhase::Failed);
            BenchmarkResult::faulted(&variant, reason.to_string(), cleanup)
        }
    };

    drop(permit);
    (index, result)
}
