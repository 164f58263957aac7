// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Google Cloud Functions provider backed by the `gcloud` CLI.
//!
//! Deploys with `--min-instances=0` so idle instances are recycled by the
//! platform, which is what makes forced cold starts possible.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::process::Command;

use coldbench_core::{
    DeleteError, DeployError, Deployment, DeploymentId, DeploymentProvider, FunctionVariant,
    Generation, LatencyClock, PlatformConfig, ReadinessError, ReadyState,
};

use crate::metrics;

/// Deploys of large bundles routinely take several minutes.
const DEPLOY_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const DESCRIBE_TIMEOUT: Duration = Duration::from_secs(60);
const DELETE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Stderr fragments that mark a failure worth retrying.
const TRANSIENT_MARKERS: &[&str] = &[
    "429",
    "quota",
    "rate limit",
    "500",
    "502",
    "503",
    "504",
    "unavailable",
    "internal error",
    "try again",
];

/// Failure of a single gcloud invocation.
#[derive(Debug, Error)]
pub enum GcloudError {
    #[error("failed to run gcloud: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("gcloud timed out after {0:?}")]
    Timeout(Duration),

    #[error("gcloud exited with {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
}

impl GcloudError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Failed { stderr, .. } => {
                let lower = stderr.to_lowercase();
                lower.contains("not found") || lower.contains("not_found") || lower.contains("404")
            }
            _ => false,
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Failed { stderr, .. } => {
                let lower = stderr.to_lowercase();
                TRANSIENT_MARKERS.iter().any(|m| lower.contains(m))
            }
            Self::Spawn(_) => false,
        }
    }
}

/// Deployment provider driving `gcloud functions`.
pub struct GcloudProvider {
    platform: PlatformConfig,
    binary: String,
    generations: DashMap<DeploymentId, Generation>,
}

impl GcloudProvider {
    pub fn new(platform: PlatformConfig) -> Self {
        Self {
            platform,
            binary: "gcloud".to_string(),
            generations: DashMap::new(),
        }
    }

    /// Use a different gcloud executable.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Arguments for `gcloud functions deploy`.
    pub fn deploy_args(&self, variant: &FunctionVariant) -> Vec<String> {
        let mut args = vec![
            "functions".to_string(),
            "deploy".to_string(),
            variant.name.to_string(),
        ];
        if variant.generation == Generation::Gen2 {
            args.push("--gen2".to_string());
        }
        args.extend([
            format!("--runtime={}", variant.runtime),
            format!("--region={}", self.platform.region),
            format!("--source={}", variant.source.as_path().display()),
            format!("--entry-point={}", variant.entry_point),
            "--trigger-http".to_string(),
            "--allow-unauthenticated".to_string(),
        ]);
        if !variant.environment.is_empty() {
            args.push(format!("--set-env-vars={}", variant.env_vars_arg()));
        }
        args.extend([
            "--min-instances=0".to_string(),
            format!("--max-instances={}", self.platform.max_instances),
            format!("--timeout={}s", self.platform.timeout_secs),
            format!("--memory={}", self.platform.memory),
        ]);
        if let Some(cpu) = &self.platform.cpu {
            args.push(format!("--cpu={}", cpu));
        }
        args.extend(self.common_args());
        args
    }

    /// Arguments for `gcloud functions describe`.
    pub fn describe_args(&self, id: &DeploymentId, format: &str) -> Vec<String> {
        let mut args = vec![
            "functions".to_string(),
            "describe".to_string(),
            id.to_string(),
            format!("--region={}", self.platform.region),
        ];
        if self.generation_of(id) == Generation::Gen2 {
            args.push("--gen2".to_string());
        }
        args.push(format!("--format={}", format));
        args.push(format!("--project={}", self.platform.project));
        args
    }

    /// Arguments for `gcloud functions delete`.
    pub fn delete_args(&self, id: &DeploymentId) -> Vec<String> {
        let mut args = vec![
            "functions".to_string(),
            "delete".to_string(),
            id.to_string(),
            format!("--region={}", self.platform.region),
        ];
        if self.generation_of(id) == Generation::Gen2 {
            args.push("--gen2".to_string());
        }
        args.extend(self.common_args());
        args
    }

    fn common_args(&self) -> [String; 2] {
        [
            format!("--project={}", self.platform.project),
            "--quiet".to_string(),
        ]
    }

    fn generation_of(&self, id: &DeploymentId) -> Generation {
        self.generations
            .get(id)
            .map(|g| *g)
            .unwrap_or_default()
    }

    /// Run gcloud and return trimmed stdout.
    async fn gcloud(&self, args: &[String], timeout: Duration) -> Result<String, GcloudError> {
        tracing::debug!(binary = %self.binary, args = ?args, "Running gcloud");

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| GcloudError::Timeout(timeout))??;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(GcloudError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn url_of(&self, id: &DeploymentId) -> Result<String, GcloudError> {
        let format = match self.generation_of(id) {
            Generation::Gen2 => "value(serviceConfig.uri)",
            Generation::Gen1 => "value(httpsTrigger.url)",
        };
        self.gcloud(&self.describe_args(id, format), DESCRIBE_TIMEOUT)
            .await
    }
}

#[async_trait]
impl DeploymentProvider for GcloudProvider {
    async fn deploy(&self, variant: &FunctionVariant) -> Result<Deployment, DeployError> {
        let id = self.identifier_for(variant);
        self.generations.insert(id.clone(), variant.generation);

        let t0 = LatencyClock::start();
        let result = self.gcloud(&self.deploy_args(variant), DEPLOY_TIMEOUT).await;

        if let Err(e) = result {
            let outcome = if e.is_transient() { "transient" } else { "rejected" };
            metrics::DEPLOYMENTS
                .with_label_values(&[variant.name.as_str(), outcome])
                .inc();
            return Err(match e {
                GcloudError::Timeout(after) => DeployError::Timeout {
                    variant: variant.name.clone(),
                    after_secs: after.as_secs(),
                },
                e if e.is_transient() => DeployError::Transient {
                    variant: variant.name.clone(),
                    reason: e.to_string(),
                },
                e => DeployError::Rejected {
                    variant: variant.name.clone(),
                    reason: e.to_string(),
                },
            });
        }

        let elapsed = LatencyClock::elapsed(t0);
        metrics::DEPLOYMENTS
            .with_label_values(&[variant.name.as_str(), "deployed"])
            .inc();
        metrics::DEPLOY_DURATION
            .with_label_values(&[variant.name.as_str()])
            .observe(elapsed.as_secs_f64());

        let url = self.url_of(&id).await.map_err(|e| DeployError::Transient {
            variant: variant.name.clone(),
            reason: format!("deployed but URL lookup failed: {}", e),
        })?;

        if url.is_empty() {
            return Err(DeployError::Rejected {
                variant: variant.name.clone(),
                reason: "deployed function has no HTTPS trigger URL".to_string(),
            });
        }

        Ok(Deployment { id, url })
    }

    async fn delete(&self, id: &DeploymentId) -> Result<(), DeleteError> {
        match self.gcloud(&self.delete_args(id), DELETE_TIMEOUT).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!(deployment = %id, "Already absent");
                Ok(())
            }
            Err(GcloudError::Timeout(after)) => {
                metrics::CLEANUP_FAILURES.inc();
                Err(DeleteError::Timeout {
                    deployment: id.clone(),
                    after_secs: after.as_secs(),
                })
            }
            Err(e) => {
                metrics::CLEANUP_FAILURES.inc();
                Err(DeleteError::Failed {
                    deployment: id.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn describe(&self, id: &DeploymentId) -> Result<ReadyState, ReadinessError> {
        match self
            .gcloud(&self.describe_args(id, "value(state)"), DESCRIBE_TIMEOUT)
            .await
        {
            Ok(state) => Ok(parse_state(&state)),
            Err(e) if e.is_not_found() => Ok(ReadyState::NotFound),
            Err(e) => Err(ReadinessError::Probe {
                deployment: id.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Map a Cloud Functions state to readiness.
pub fn parse_state(state: &str) -> ReadyState {
    match state.trim() {
        "ACTIVE" => ReadyState::Ready,
        _ => ReadyState::NotReadyYet,
    }
}
