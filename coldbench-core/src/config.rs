// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Validates benchmark configurations before any remote resource is created.
//! Any invalid field results in a HardValidationError that aborts the run.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult, HardValidationError};
use crate::retry::RetryPolicy;
use crate::types::{Generation, RuntimeVersion, SourceBundle, VariantName};
use crate::variant::{FunctionVariant, VariantRole};

/// Upper bound on simultaneously running benchmark tasks.
const MAX_CONCURRENCY: usize = 256;

/// Upper bound on replicas of a single declared variant.
const MAX_REPLICAS: usize = 999;

/// Raw retry policy; unset fields fall back to the section's default policy.
#[derive(Debug, Default, Deserialize)]
struct RawRetryPolicy {
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    multiplier: Option<f64>,
    max_backoff_ms: Option<u64>,
    max_wait_secs: Option<u64>,
}

/// Raw benchmark settings.
#[derive(Debug, Deserialize)]
struct RawBenchmarkConfig {
    #[serde(default = "default_concurrency")]
    concurrency: usize,
    #[serde(default = "default_cold_samples")]
    cold_samples: u32,
    #[serde(default = "default_warm_samples")]
    warm_samples: u32,
    #[serde(default = "default_eviction_gap_secs")]
    eviction_gap_secs: u64,
    #[serde(default)]
    readiness: RawRetryPolicy,
    #[serde(default)]
    deploy_retry: RawRetryPolicy,
    #[serde(default = "default_invocation_retries")]
    invocation_retries: u32,
    #[serde(default = "default_cold_retry_budget")]
    cold_retry_budget: u32,
    #[serde(default = "default_ambiguity_ratio")]
    ambiguity_ratio: f64,
    #[serde(default = "default_alpha")]
    alpha: f64,
    #[serde(default)]
    deadline_secs: Option<u64>,
    #[serde(default = "default_payload")]
    payload: serde_json::Value,
}

fn default_concurrency() -> usize {
    4
}

fn default_cold_samples() -> u32 {
    1
}

fn default_warm_samples() -> u32 {
    10
}

fn default_eviction_gap_secs() -> u64 {
    15 * 60 // Cloud Functions recycles idle instances after roughly 15 minutes
}

fn default_invocation_retries() -> u32 {
    3
}

fn default_cold_retry_budget() -> u32 {
    2
}

fn default_ambiguity_ratio() -> f64 {
    0.25
}

fn default_alpha() -> f64 {
    crate::analyzer::DEFAULT_ALPHA
}

fn default_payload() -> serde_json::Value {
    serde_json::json!({ "message": "coldbench" })
}

impl Default for RawBenchmarkConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            cold_samples: default_cold_samples(),
            warm_samples: default_warm_samples(),
            eviction_gap_secs: default_eviction_gap_secs(),
            readiness: RawRetryPolicy::default(),
            deploy_retry: RawRetryPolicy::default(),
            invocation_retries: default_invocation_retries(),
            cold_retry_budget: default_cold_retry_budget(),
            ambiguity_ratio: default_ambiguity_ratio(),
            alpha: default_alpha(),
            deadline_secs: None,
            payload: default_payload(),
        }
    }
}

/// Raw platform section.
#[derive(Debug, Deserialize)]
struct RawPlatformConfig {
    project: String,
    #[serde(default = "default_region")]
    region: String,
    #[serde(default = "default_memory")]
    memory: String,
    #[serde(default = "default_cpu")]
    cpu: Option<String>,
    #[serde(default = "default_function_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_max_instances")]
    max_instances: u32,
}

fn default_region() -> String {
    "us-central1".to_string()
}

fn default_memory() -> String {
    "256Mi".to_string()
}

fn default_cpu() -> Option<String> {
    None
}

fn default_function_timeout_secs() -> u64 {
    60
}

fn default_max_instances() -> u32 {
    1
}

/// Raw variant declaration.
#[derive(Debug, Deserialize)]
struct RawVariantConfig {
    name: String,
    #[serde(default = "default_generation")]
    generation: String,
    runtime: String,
    #[serde(default)]
    agent_enabled: bool,
    entry_point: String,
    source: String,
    #[serde(default)]
    environment: BTreeMap<String, String>,
    #[serde(default = "default_replicas")]
    replicas: usize,
}

fn default_generation() -> String {
    "gen2".to_string()
}

fn default_replicas() -> usize {
    1
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    benchmark: RawBenchmarkConfig,
    #[serde(default)]
    platform: Option<RawPlatformConfig>,
    variants: Vec<RawVariantConfig>,
}

/// Validated benchmark settings shared by every task of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSettings {
    /// Maximum simultaneously active benchmark tasks.
    pub concurrency: usize,
    /// Forced-cold invocations per variant.
    pub cold_samples: u32,
    /// Back-to-back warm invocations per variant.
    pub warm_samples: u32,
    /// Idle gap enforced before each cold invocation.
    pub eviction_gap: Duration,
    pub readiness: RetryPolicy,
    pub deploy_retry: RetryPolicy,
    /// Extra attempts per sample after a failed invocation.
    pub invocation_retries: u32,
    /// Re-forcing attempts after an ambiguous cold sample.
    pub cold_retry_budget: u32,
    /// A forced-cold response faster than this fraction of the fastest
    /// confirmed cold sample is treated as ambiguous.
    pub ambiguity_ratio: f64,
    pub alpha: f64,
    /// Global deadline for the whole run.
    pub deadline: Option<Duration>,
    pub payload: serde_json::Value,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            cold_samples: default_cold_samples(),
            warm_samples: default_warm_samples(),
            eviction_gap: Duration::from_secs(default_eviction_gap_secs()),
            readiness: RetryPolicy::readiness(),
            deploy_retry: RetryPolicy::deployment(),
            invocation_retries: default_invocation_retries(),
            cold_retry_budget: default_cold_retry_budget(),
            ambiguity_ratio: default_ambiguity_ratio(),
            alpha: default_alpha(),
            deadline: None,
            payload: default_payload(),
        }
    }
}

/// Validated platform settings consumed by the gcloud provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub project: String,
    pub region: String,
    pub memory: String,
    pub cpu: Option<String>,
    pub timeout_secs: u64,
    pub max_instances: u32,
}

/// A declared variant and how many copies of it to deploy.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSpec {
    pub variant: FunctionVariant,
    pub replicas: usize,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub benchmark: BenchmarkSettings,
    pub platform: Option<PlatformConfig>,
    pub variants: Vec<VariantSpec>,
}

impl Config {
    /// Expand replicas into independently deployable variants.
    ///
    /// A variant with one replica keeps its declared name; otherwise copies
    /// are named `<name>-001`, `<name>-002`, ...
    pub fn expand_variants(&self) -> BenchResult<Vec<FunctionVariant>> {
        let mut expanded = Vec::new();
        let mut seen = HashSet::new();

        for spec in &self.variants {
            let names = if spec.replicas == 1 {
                vec![spec.variant.name.clone()]
            } else {
                (1..=spec.replicas)
                    .map(|i| spec.variant.name.replica(i))
                    .collect::<Result<Vec<_>, _>>()?
            };

            for name in names {
                if !seen.insert(name.clone()) {
                    return Err(HardValidationError::DuplicateVariantName {
                        name: name.to_string(),
                    }
                    .into());
                }
                expanded.push(FunctionVariant {
                    name,
                    ..spec.variant.clone()
                });
            }
        }

        Ok(expanded)
    }

    /// Check that every variant's source bundle exists on disk.
    pub fn check_sources(&self) -> BenchResult<()> {
        for spec in &self.variants {
            SourceBundle::new(spec.variant.source.as_path())?;
        }
        Ok(())
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> BenchResult<Config> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> BenchResult<Config> {
        let benchmark = Self::validate_benchmark(raw.benchmark)?;
        let platform = raw.platform.map(Self::validate_platform).transpose()?;

        let mut variants = Vec::with_capacity(raw.variants.len());
        let mut seen_names = HashSet::new();

        for (index, raw_variant) in raw.variants.into_iter().enumerate() {
            let spec = Self::validate_variant(raw_variant, index)?;

            if !seen_names.insert(spec.variant.name.clone()) {
                return Err(HardValidationError::DuplicateVariantName {
                    name: spec.variant.name.to_string(),
                }
                .into());
            }

            variants.push(spec);
        }

        if variants.is_empty() {
            return Err(HardValidationError::SchemaValidation {
                message: "At least one variant must be defined".to_string(),
            }
            .into());
        }

        // A comparison needs both sides.
        for role in [VariantRole::Control, VariantRole::Treatment] {
            if !variants.iter().any(|s| s.variant.role() == role) {
                return Err(HardValidationError::SchemaValidation {
                    message: format!("No {} variant defined", role),
                }
                .into());
            }
        }

        let config = Config {
            benchmark,
            platform,
            variants,
        };
        // Surfaces replica name collisions before anything is deployed.
        config.expand_variants()?;

        Ok(config)
    }

    fn validate_benchmark(raw: RawBenchmarkConfig) -> BenchResult<BenchmarkSettings> {
        if raw.concurrency == 0 || raw.concurrency > MAX_CONCURRENCY {
            return Err(invalid(
                "concurrency",
                raw.concurrency,
                format!("Must be between 1 and {}", MAX_CONCURRENCY),
            ));
        }

        // The first invocation after deployment is always a cold sample.
        if raw.cold_samples == 0 {
            return Err(invalid(
                "cold_samples",
                raw.cold_samples,
                "Must be at least 1".to_string(),
            ));
        }

        if !(raw.ambiguity_ratio >= 0.0 && raw.ambiguity_ratio < 1.0) {
            return Err(invalid(
                "ambiguity_ratio",
                raw.ambiguity_ratio,
                "Must be in [0, 1)".to_string(),
            ));
        }

        if !(raw.alpha > 0.0 && raw.alpha < 1.0) {
            return Err(invalid("alpha", raw.alpha, "Must be in (0, 1)".to_string()));
        }

        if raw.deadline_secs == Some(0) {
            return Err(invalid(
                "deadline_secs",
                0,
                "Deadline must be greater than 0".to_string(),
            ));
        }

        Ok(BenchmarkSettings {
            concurrency: raw.concurrency,
            cold_samples: raw.cold_samples,
            warm_samples: raw.warm_samples,
            eviction_gap: Duration::from_secs(raw.eviction_gap_secs),
            readiness: Self::validate_retry("readiness", raw.readiness, RetryPolicy::readiness())?,
            deploy_retry: Self::validate_retry(
                "deploy_retry",
                raw.deploy_retry,
                RetryPolicy::deployment(),
            )?,
            invocation_retries: raw.invocation_retries,
            cold_retry_budget: raw.cold_retry_budget,
            ambiguity_ratio: raw.ambiguity_ratio,
            alpha: raw.alpha,
            deadline: raw.deadline_secs.map(Duration::from_secs),
            payload: raw.payload,
        })
    }

    /// Merge a raw retry section over its default policy.
    fn validate_retry(
        field: &'static str,
        raw: RawRetryPolicy,
        defaults: RetryPolicy,
    ) -> BenchResult<RetryPolicy> {
        let policy = RetryPolicy {
            max_attempts: raw.max_attempts.unwrap_or(defaults.max_attempts),
            initial_backoff: raw
                .initial_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            multiplier: raw.multiplier.unwrap_or(defaults.multiplier),
            max_backoff: raw
                .max_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
            max_wait: match raw.max_wait_secs {
                Some(secs) => Some(Duration::from_secs(secs)),
                None => defaults.max_wait,
            },
        };

        if policy.max_attempts == 0 {
            return Err(invalid(field, "max_attempts = 0", "At least one attempt is required".to_string()));
        }

        if !(policy.multiplier >= 1.0 && policy.multiplier.is_finite()) {
            return Err(invalid(
                field,
                format!("multiplier = {}", policy.multiplier),
                "Multiplier must be a finite number >= 1".to_string(),
            ));
        }

        if policy.max_backoff < policy.initial_backoff {
            return Err(invalid(
                field,
                format!("max_backoff = {:?}", policy.max_backoff),
                "Max backoff must not be smaller than the initial backoff".to_string(),
            ));
        }

        Ok(policy)
    }

    fn validate_platform(raw: RawPlatformConfig) -> BenchResult<PlatformConfig> {
        if raw.project.trim().is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "project",
                context: "platform".to_string(),
            }
            .into());
        }

        if raw.region.trim().is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "region",
                context: "platform".to_string(),
            }
            .into());
        }

        // Cloud Functions caps the request timeout at 60 minutes.
        if raw.timeout_secs == 0 || raw.timeout_secs > 3600 {
            return Err(invalid(
                "timeout_secs",
                raw.timeout_secs,
                "Must be between 1 and 3600 seconds".to_string(),
            ));
        }

        if raw.max_instances == 0 {
            return Err(invalid(
                "max_instances",
                0,
                "At least one instance is required".to_string(),
            ));
        }

        Ok(PlatformConfig {
            project: raw.project,
            region: raw.region,
            memory: raw.memory,
            cpu: raw.cpu,
            timeout_secs: raw.timeout_secs,
            max_instances: raw.max_instances,
        })
    }

    fn validate_variant(raw: RawVariantConfig, index: usize) -> BenchResult<VariantSpec> {
        let context = format!("variant at index {}", index);

        let name = VariantName::new(raw.name)?;
        let generation = Generation::parse(&raw.generation)?;
        let runtime = RuntimeVersion::new(raw.runtime)?;

        if raw.entry_point.trim().is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "entry_point",
                context,
            }
            .into());
        }

        if raw.source.trim().is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "source",
                context,
            }
            .into());
        }

        // Existence is checked separately, see `Config::check_sources`.
        let source = SourceBundle::new_unchecked(&raw.source);

        for key in raw.environment.keys() {
            if key.is_empty() || key.contains(['=', ',']) {
                return Err(invalid(
                    "environment",
                    format!("{:?} in {}", key, context),
                    "Environment variable names must be non-empty without '=' or ','"
                        .to_string(),
                ));
            }
        }

        if raw.replicas == 0 || raw.replicas > MAX_REPLICAS {
            return Err(invalid(
                "replicas",
                raw.replicas,
                format!("Must be between 1 and {}", MAX_REPLICAS),
            ));
        }

        Ok(VariantSpec {
            variant: FunctionVariant {
                name,
                generation,
                runtime,
                agent_enabled: raw.agent_enabled,
                entry_point: raw.entry_point,
                source,
                environment: raw.environment,
            },
            replicas: raw.replicas,
        })
    }
}

fn invalid(field: &'static str, value: impl ToString, reason: String) -> BenchError {
    HardValidationError::InvalidFieldValue {
        field,
        value: value.to_string(),
        reason,
    }
    .into()
}
