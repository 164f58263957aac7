// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Human-readable rendering of a run report.

use std::fmt::Write;

use coldbench_core::{LatencyClock, MetricComparison, RunReport};

/// Render the report as a text summary.
pub fn render(report: &RunReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "═══════════════════════════════════════════════════════════════");
    let _ = writeln!(out, "  COLD START BENCHMARK  {}", report.run_id);
    let _ = writeln!(out, "═══════════════════════════════════════════════════════════════");
    let _ = writeln!(
        out,
        "  Generated: {}   Elapsed: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        LatencyClock::format_nanos(report.status.elapsed_ns as f64)
    );
    if report.status.aborted {
        let _ = writeln!(out, "  ⚠ Run aborted before completion");
    }
    if report.status.deadline_hit {
        let _ = writeln!(out, "  ⚠ Global deadline reached");
    }

    let d = &report.deployments;
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  Deployments: {} total, {} deployed, {} failed, {} not attempted",
        d.total, d.deployed, d.failed, d.not_attempted
    );
    let _ = writeln!(
        out,
        "  Completed:   {}   Cleanup failures: {}",
        d.completed, d.cleanup_failures
    );

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  {:<24} {:<10} {:<15} {:>12} {:>12}",
        "VARIANT", "ROLE", "PHASE", "COLD MEAN", "WARM MEAN"
    );
    for v in &report.variants {
        let _ = writeln!(
            out,
            "  {:<24} {:<10} {:<15} {:>12} {:>12}",
            v.variant.as_str(),
            v.role.to_string(),
            v.phase.name(),
            mean_or_dash(v.cold.mean_ns),
            mean_or_dash(v.warm.mean_ns),
        );
        if let Some(failure) = &v.failure {
            let _ = writeln!(out, "    ✗ {}", failure);
        }
    }

    let comparisons = [
        ("Cold start latency", &report.comparisons.cold),
        ("Warm latency", &report.comparisons.warm),
        ("Deployment duration", &report.comparisons.deployment_duration),
    ];
    for (title, comparison) in comparisons {
        let _ = writeln!(out);
        render_comparison(&mut out, title, comparison);
    }

    let _ = writeln!(out);
    let verdict = if report.any_significant() {
        "Agent introduces a statistically significant difference"
    } else {
        "No statistically significant difference detected"
    };
    let _ = writeln!(out, "  Verdict: {}", verdict);
    out
}

fn render_comparison(out: &mut String, title: &str, comparison: &MetricComparison) {
    let _ = writeln!(out, "  {}", title);
    let verdict = match comparison {
        MetricComparison::Computed { verdict } => verdict,
        MetricComparison::InsufficientData { reason } => {
            let _ = writeln!(out, "    insufficient data: {}", reason);
            return;
        }
    };

    let _ = writeln!(
        out,
        "    control:   n={:<4} mean {:>12}  sd {:>12}",
        verdict.control.count,
        LatencyClock::format_nanos(verdict.control.mean),
        LatencyClock::format_nanos(verdict.control.std_dev),
    );
    let _ = writeln!(
        out,
        "    treatment: n={:<4} mean {:>12}  sd {:>12}",
        verdict.treatment.count,
        LatencyClock::format_nanos(verdict.treatment.mean),
        LatencyClock::format_nanos(verdict.treatment.std_dev),
    );

    let pct = verdict
        .overhead_pct
        .map(|p| format!(" ({:+.1}%)", p))
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "    overhead:  {}{}",
        LatencyClock::format_nanos(verdict.overhead_mean),
        pct
    );
    let _ = writeln!(
        out,
        "    welch t = {:.3}, df = {:.1}, p = {:.4}  effect: {}",
        verdict.t_test.t_statistic,
        verdict.t_test.degrees_of_freedom,
        verdict.t_test.p_value,
        verdict.effect_size.magnitude,
    );
    let _ = writeln!(
        out,
        "    {} at alpha = {}",
        if verdict.significant {
            "SIGNIFICANT"
        } else {
            "not significant"
        },
        verdict.alpha
    );
}

fn mean_or_dash(mean_ns: Option<f64>) -> String {
    mean_ns
        .map(LatencyClock::format_nanos)
        .unwrap_or_else(|| "-".to_string())
}
