//! Coldbench Core Library
//!
//! Comparative cold-start benchmark engine for serverless functions.
//! Deploys matched pairs of function variants (agent-enabled vs. plain),
//! forces genuine cold starts, measures invocation latency and decides
//! whether the agent introduces a statistically significant penalty.

pub mod analyzer;
pub mod clock;
pub mod config;
pub mod detector;
pub mod error;
pub mod manager;
pub mod progress;
pub mod provider;
pub mod report;
pub mod reporter;
pub mod result;
pub mod retry;
pub mod state;
pub mod task;
pub mod types;
pub mod variant;

// Re-export commonly used types
pub use analyzer::{ComparisonVerdict, EffectMagnitude, StatisticalAnalyzer};
pub use clock::LatencyClock;
pub use config::{BenchmarkSettings, Config, ConfigLoader, PlatformConfig, VariantSpec};
pub use detector::ColdStartDetector;
pub use error::{
    AnalysisError, BenchError, BenchResult, Cancelled, DeleteError, DeployError, HardValidationError,
    InvocationError, ReadinessError,
};
pub use manager::{ConcurrencyManager, RunOutcome};
pub use progress::{Progress, ProgressTracker};
pub use provider::{Deployment, DeploymentProvider, InvocationClient, InvocationResponse, ReadyState};
pub use report::{MetricComparison, ReportBuilder, RunReport, SystemInfo};
pub use reporter::{JsonReporter, ReporterError};
pub use result::{
    BenchmarkResult, Classification, CleanupOutcome, Confidence, DeploymentOutcome,
    InvocationSample, SampleOutcome, TaskFailure,
};
pub use retry::RetryPolicy;
pub use state::{TaskPhase, VariantLifecycle, VariantState};
pub use task::BenchmarkTask;
pub use types::{DeploymentId, Generation, RuntimeVersion, SourceBundle, VariantName};
pub use variant::{FunctionVariant, VariantRole};
