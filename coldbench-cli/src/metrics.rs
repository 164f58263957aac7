// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Prometheus metrics for a running benchmark.
//!
//! Recorded by the gcloud provider and the HTTP client, served in the text
//! exposition format when `--metrics-port` is given.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

lazy_static! {
    pub static ref DEPLOYMENTS: IntCounterVec = register_int_counter_vec!(
        "coldbench_deployments_total",
        "Deployment attempts by outcome",
        &["variant", "outcome"]
    )
    .unwrap();
    pub static ref DEPLOY_DURATION: HistogramVec = register_histogram_vec!(
        "coldbench_deploy_duration_seconds",
        "Wall time of successful deployments",
        &["variant"],
        vec![15.0, 30.0, 60.0, 90.0, 120.0, 180.0, 300.0, 600.0]
    )
    .unwrap();
    pub static ref INVOCATIONS: IntCounterVec = register_int_counter_vec!(
        "coldbench_invocations_total",
        "Invocations by status class",
        &["status"]
    )
    .unwrap();
    pub static ref INVOCATION_LATENCY: HistogramVec = register_histogram_vec!(
        "coldbench_invocation_duration_seconds",
        "Invocation round-trip latency",
        &["status"],
        // Warm requests land in the low buckets, cold starts in the high ones.
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();
    pub static ref CLEANUP_FAILURES: IntCounter = register_int_counter!(
        "coldbench_cleanup_failures_total",
        "Deployments that could not be deleted"
    )
    .unwrap();
    pub static ref TASKS_COMPLETED: IntGauge = register_int_gauge!(
        "coldbench_tasks_completed",
        "Benchmark tasks that reached a terminal phase"
    )
    .unwrap();
}

/// Status label for an HTTP status code.
pub fn status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Start the metrics server in a background task.
pub fn start_metrics_server(port: u16) {
    // Force initialization of metrics
    lazy_static::initialize(&DEPLOYMENTS);
    lazy_static::initialize(&DEPLOY_DURATION);
    lazy_static::initialize(&INVOCATIONS);
    lazy_static::initialize(&INVOCATION_LATENCY);
    lazy_static::initialize(&CLEANUP_FAILURES);
    lazy_static::initialize(&TASKS_COMPLETED);

    tokio::spawn(async move {
        let addr = format!("0.0.0.0:{}", port);
        match TcpListener::bind(&addr).await {
            Ok(listener) => {
                tracing::info!("Metrics server starting on {}", addr);
                loop {
                    if let Ok((mut socket, _)) = listener.accept().await {
                        tokio::spawn(async move {
                            let body = metrics_handler();
                            let response = format!(
                                "HTTP/1.0 200 OK\r\nConnection: close\r\nContent-Length: {}\r\nContent-Type: text/plain; version=0.0.4\r\n\r\n{}",
                                body.len(),
                                body
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.flush().await;
                        });
                    }
                }
            }
            Err(e) => {
                tracing::error!("Failed to bind metrics server: {}", e);
            }
        }
    });
}

fn metrics_handler() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("Encoding error"))
}
