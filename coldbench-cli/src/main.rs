// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Coldbench CLI
//!
//! Command-line interface for the Coldbench cold-start benchmark.

use clap::{Parser, Subcommand};

mod commands;
mod gcloud;
mod http_client;
mod metrics;
mod summary;

/// Coldbench - Comparative cold-start benchmark for serverless functions
#[derive(Parser)]
#[command(name = "coldbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "coldbench.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy the variants, measure them and write a report
    Run {
        /// Directory reports are written to
        #[arg(short, long, default_value = "coldbench-reports")]
        output: String,

        /// Abort the run after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Override the number of variants benchmarked at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Serve Prometheus metrics on this port
        #[arg(long)]
        metrics_port: Option<u16>,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },

    /// List the variant deployments the configuration expands to
    List,

    /// Re-analyse a saved report
    Analyze {
        /// Report file (defaults to the latest in --dir)
        report: Option<String>,

        /// Directory holding saved reports
        #[arg(short, long, default_value = "coldbench-reports")]
        dir: String,

        /// Significance threshold to recompute with
        #[arg(long)]
        alpha: Option<f64>,

        /// Save the re-analysed report as a new file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Run {
            output,
            deadline_secs,
            concurrency,
            metrics_port,
        } => {
            let options = commands::run::RunOptions {
                output,
                deadline_secs,
                concurrency,
                metrics_port,
            };
            commands::run::execute(&cli.config, options).await
        }
        Commands::Validate { file } => commands::validate::execute(&file).await,
        Commands::List => commands::list::execute(&cli.config).await,
        Commands::Analyze {
            report,
            dir,
            alpha,
            save,
        } => commands::analyze::execute(report.as_deref(), &dir, alpha, save).await,
    }
}
