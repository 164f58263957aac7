// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `coldbench run` command - Execute a benchmark run.
//!
//! Deploys every variant through gcloud, measures cold and warm latency,
//! tears everything down and writes the report.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use coldbench_core::{
    ConcurrencyManager, ConfigLoader, JsonReporter, ProgressTracker, ReportBuilder,
    StatisticalAnalyzer, SystemInfo,
};

use crate::gcloud::GcloudProvider;
use crate::http_client::HttpInvocationClient;
use crate::{metrics, summary};

/// Headroom over the function timeout before the client gives up.
const CLIENT_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Overrides taken from the command line.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub output: String,
    pub deadline_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub metrics_port: Option<u16>,
}

pub async fn execute(
    config_path: &str,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(config = %config_path, "Loading configuration");
    let config = ConfigLoader::load_file(config_path)?;
    config.check_sources()?;

    let platform = config
        .platform
        .clone()
        .ok_or("configuration has no `platform` section; `run` needs one")?;

    let mut settings = config.benchmark.clone();
    if let Some(secs) = options.deadline_secs {
        settings.deadline = Some(Duration::from_secs(secs));
    }
    if let Some(concurrency) = options.concurrency {
        if concurrency == 0 {
            return Err("--concurrency must be at least 1".into());
        }
        settings.concurrency = concurrency;
    }

    let variants = config.expand_variants()?;
    let analyzer = StatisticalAnalyzer::new(settings.alpha)?;
    let reporter = JsonReporter::new(&options.output)?;

    if let Some(port) = options.metrics_port {
        metrics::start_metrics_server(port);
    }

    let client_timeout = Duration::from_secs(platform.timeout_secs) + CLIENT_TIMEOUT_MARGIN;
    let provider = Arc::new(GcloudProvider::new(platform));
    let client = Arc::new(HttpInvocationClient::new(client_timeout)?);

    let manager = ConcurrencyManager::new(provider, client, settings.clone());
    abort_on_ctrl_c(manager.abort_handle());

    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("║                 COLDBENCH - Cold Start Benchmark              ║");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "Running {} variant deployment(s), {} at a time. Press Ctrl+C to abort.",
        variants.len(),
        settings.concurrency
    );
    println!();

    let progress = Arc::new(ProgressTracker::new(&variants));
    let watcher = {
        let mut rx = progress.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = *rx.borrow_and_update();
                metrics::TASKS_COMPLETED.set(snapshot.completed as i64);
                println!("  [{}]", snapshot);
                if snapshot.is_finished() {
                    break;
                }
            }
        })
    };

    let outcome = manager.run_tracked(variants, progress).await;
    watcher.abort();

    let report = ReportBuilder::new(analyzer)
        .with_settings(settings)
        .with_system_info(SystemInfo::collect())
        .build_outcome(&outcome);

    let path = reporter.save(&report)?;

    println!();
    print!("{}", summary::render(&report));
    println!();
    println!("Report written to {}", path.display());

    if report.deployments.cleanup_failures > 0 {
        eprintln!(
            "⚠ {} deployment(s) could not be deleted; remove them manually",
            report.deployments.cleanup_failures
        );
    }

    Ok(())
}

/// Cancel `abort` on the first Ctrl+C.
fn abort_on_ctrl_c(abort: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!();
            println!("Aborting, cleaning up deployed functions...");
            tracing::warn!("Interrupt received, aborting run");
            abort.cancel();
        }
    });
}
