// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cold start forcing and classification.
//!
//! The platform never says "this request started a new instance", so the
//! detector infers it. A deployment becomes *fresh* once the provider reports
//! it reachable (checked without invoking it) and again after every idle gap
//! longer than the eviction threshold. The first successful invocation on a
//! fresh deployment is Cold; everything after it is Warm until the next
//! forced eviction.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::clock::LatencyClock;
use crate::config::BenchmarkSettings;
use crate::error::{Cancelled, ReadinessError};
use crate::provider::{DeploymentProvider, InvocationResponse, ReadyState};
use crate::result::Classification;
use crate::retry::RetryPolicy;
use crate::types::DeploymentId;

/// Verdict on a response obtained right after a forced eviction.
#[derive(Debug, Clone, PartialEq)]
pub enum ColdAssessment {
    Confirmed,
    Ambiguous { reason: String },
}

/// Per-variant cold start detector. Owned by a single benchmark task.
#[derive(Debug)]
pub struct ColdStartDetector {
    readiness: RetryPolicy,
    eviction_gap: Duration,
    ambiguity_ratio: f64,
    fresh: bool,
    fastest_cold: Option<Duration>,
}

impl ColdStartDetector {
    pub fn new(settings: &BenchmarkSettings) -> Self {
        Self {
            readiness: settings.readiness.clone(),
            eviction_gap: settings.eviction_gap,
            ambiguity_ratio: settings.ambiguity_ratio,
            fresh: false,
            fastest_cold: None,
        }
    }

    /// Poll `describe` until the deployment is reachable.
    ///
    /// Returns the time it took. NotFound and probe errors are treated as
    /// "not yet"; only an exhausted policy ends the wait with an error.
    pub async fn wait_until_ready(
        &mut self,
        provider: &dyn DeploymentProvider,
        id: &DeploymentId,
        cancel: &CancellationToken,
    ) -> Result<Duration, ReadinessError> {
        let t0 = LatencyClock::start();
        let mut attempts = 0u32;
        let mut waited = Duration::ZERO;

        loop {
            attempts += 1;
            let state = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ReadinessError::Cancelled { deployment: id.clone() });
                }
                state = provider.describe(id) => state,
            };

            let last = match state {
                Ok(ReadyState::Ready) => {
                    self.fresh = true;
                    let elapsed = LatencyClock::elapsed(t0);
                    tracing::debug!(
                        deployment = %id,
                        attempts,
                        elapsed = %LatencyClock::format(elapsed),
                        "Deployment ready"
                    );
                    return Ok(elapsed);
                }
                Ok(other) => other,
                Err(e) => {
                    tracing::warn!(deployment = %id, attempt = attempts, error = %e, "Readiness probe failed");
                    ReadyState::NotReadyYet
                }
            };

            let delay = self.readiness.backoff(attempts - 1);
            if !self.readiness.allows(attempts, waited, delay) {
                return Err(match last {
                    ReadyState::NotFound => ReadinessError::NotFound {
                        deployment: id.clone(),
                    },
                    _ => ReadinessError::DeploymentNotReady {
                        deployment: id.clone(),
                        attempts,
                        waited_ms: waited.as_millis() as u64,
                    },
                });
            }

            tracing::trace!(deployment = %id, attempt = attempts, ?last, ?delay, "Not ready, backing off");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ReadinessError::Cancelled { deployment: id.clone() });
                }
                _ = tokio::time::sleep(delay) => {}
            }
            waited += delay;
        }
    }

    /// Stay idle for the eviction gap so the next request lands on a new
    /// instance.
    pub async fn force_eviction(&mut self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(self.eviction_gap) => {
                self.fresh = true;
                Ok(())
            }
        }
    }

    /// Classify a successful invocation. Consumes the fresh flag.
    pub fn classify(&mut self) -> Classification {
        if std::mem::replace(&mut self.fresh, false) {
            Classification::Cold
        } else {
            Classification::Warm
        }
    }

    /// Whether a successful forced-cold response really looks cold.
    pub fn assess_cold(&self, response: &InvocationResponse) -> ColdAssessment {
        if response.instance_reused == Some(true) {
            return ColdAssessment::Ambiguous {
                reason: "function reported a reused instance".to_string(),
            };
        }

        if let Some(fastest) = self.fastest_cold {
            let floor = fastest.mul_f64(self.ambiguity_ratio);
            if response.elapsed < floor {
                return ColdAssessment::Ambiguous {
                    reason: format!(
                        "{} is below {} of the fastest cold sample ({})",
                        LatencyClock::format(response.elapsed),
                        self.ambiguity_ratio,
                        LatencyClock::format(fastest)
                    ),
                };
            }
        }

        ColdAssessment::Confirmed
    }

    /// Remember a confirmed cold latency.
    pub fn record_cold(&mut self, elapsed: Duration) {
        self.fastest_cold = Some(match self.fastest_cold {
            Some(fastest) => fastest.min(elapsed),
            None => elapsed,
        });
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn fastest_cold(&self) -> Option<Duration> {
        self.fastest_cold
    }
}
