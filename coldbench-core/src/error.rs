//! Custom error types for Coldbench.
//!
//! Explicit enum error types for every failure class of a benchmark run.
//! No `Box<dyn Error>`, no `anyhow::Result` - all errors are strongly typed.
//! Per-task errors are folded into that task's `BenchmarkResult`; only
//! configuration and reporting errors ever reach the caller as `Err`.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{DeploymentId, VariantName};

/// Top-level error type for the Coldbench engine.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateTransitionError),

    // =========================================================================
    // Remote Deployment Errors - Contained Per Task
    // =========================================================================
    #[error("Deployment error: {0}")]
    Deploy(#[from] DeployError),

    #[error("Cleanup error: {0}")]
    Delete(#[from] DeleteError),

    #[error("Readiness error: {0}")]
    Readiness(#[from] ReadinessError),

    #[error("Invocation error: {0}")]
    Invocation(#[from] InvocationError),

    // =========================================================================
    // Analysis & Reporting Errors
    // =========================================================================
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Reporter error: {0}")]
    Reporter(#[from] crate::reporter::ReporterError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors reject a configuration before any resource is created.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Duplicate variant name: {name}")]
    DuplicateVariantName { name: String },

    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String },
}

/// Variant lifecycle transition errors.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("Cannot transition from {from} to {to} for variant {variant}")]
    InvalidTransition {
        variant: VariantName,
        from: &'static str,
        to: &'static str,
    },

    #[error("Variant {variant} is in terminal state: {state}")]
    TerminalState {
        variant: VariantName,
        state: &'static str,
    },
}

/// Remote deployment rejected, timed out or interrupted.
#[derive(Debug, Clone, Error)]
pub enum DeployError {
    #[error("Deployment of {variant} rejected: {reason}")]
    Rejected { variant: VariantName, reason: String },

    #[error("Deployment of {variant} timed out after {after_secs}s")]
    Timeout { variant: VariantName, after_secs: u64 },

    #[error("Transient deployment failure for {variant}: {reason}")]
    Transient { variant: VariantName, reason: String },

    #[error("Deployment of {variant} cancelled")]
    Cancelled { variant: VariantName },
}

impl DeployError {
    /// Whether the deployment may succeed if attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }
}

/// Cleanup failures. Logged and recorded, never escalated.
#[derive(Debug, Clone, Error)]
pub enum DeleteError {
    #[error("Failed to delete {deployment}: {reason}")]
    Failed {
        deployment: DeploymentId,
        reason: String,
    },

    #[error("Deleting {deployment} timed out after {after_secs}s")]
    Timeout {
        deployment: DeploymentId,
        after_secs: u64,
    },
}

/// Readiness polling failures.
#[derive(Debug, Clone, Error)]
pub enum ReadinessError {
    #[error("Deployment {deployment} not ready after {attempts} polls ({waited_ms}ms)")]
    DeploymentNotReady {
        deployment: DeploymentId,
        attempts: u32,
        waited_ms: u64,
    },

    #[error("Deployment {deployment} not found")]
    NotFound { deployment: DeploymentId },

    #[error("Readiness probe for {deployment} failed: {reason}")]
    Probe {
        deployment: DeploymentId,
        reason: String,
    },

    #[error("Readiness wait for {deployment} cancelled")]
    Cancelled { deployment: DeploymentId },
}

/// Failure of a single invocation attempt.
#[derive(Debug, Clone, Error)]
pub enum InvocationError {
    #[error("Network error calling {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Invocation of {url} timed out after {after_ms}ms")]
    Timeout { url: String, after_ms: u64 },
}

/// Statistical analysis errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Insufficient data for {group}: {observations} observations (need {required})")]
    InsufficientData {
        group: &'static str,
        observations: usize,
        required: usize,
    },

    #[error("Significance threshold must be in (0, 1), got {alpha}")]
    InvalidSignificance { alpha: f64 },

    #[error("Distribution error: {reason}")]
    Distribution { reason: String },
}

/// A suspension point observed the abort signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;
