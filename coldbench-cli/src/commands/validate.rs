// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `coldbench validate` command - Validate configuration file.

use coldbench_core::{ConfigLoader, LatencyClock};

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    let result = ConfigLoader::load_file(file).and_then(|config| {
        config.check_sources()?;
        let variants = config.expand_variants()?;
        Ok((config, variants))
    });

    match result {
        Ok((config, variants)) => {
            let b = &config.benchmark;
            println!("✓ Configuration is valid");
            println!();
            println!("Benchmark Settings:");
            println!("  Concurrency:        {}", b.concurrency);
            println!("  Cold Samples:       {}", b.cold_samples);
            println!("  Warm Samples:       {}", b.warm_samples);
            println!("  Eviction Gap:       {}", LatencyClock::format(b.eviction_gap));
            println!("  Cold Retry Budget:  {}", b.cold_retry_budget);
            println!("  Invocation Retries: {}", b.invocation_retries);
            println!("  Ambiguity Ratio:    {}", b.ambiguity_ratio);
            println!("  Alpha:              {}", b.alpha);
            match b.deadline {
                Some(deadline) => println!("  Deadline:           {}", LatencyClock::format(deadline)),
                None => println!("  Deadline:           none"),
            }
            println!();
            match &config.platform {
                Some(p) => println!(
                    "Platform: project {} in {} (memory: {}, timeout: {}s)",
                    p.project, p.region, p.memory, p.timeout_secs
                ),
                None => println!("Platform: not configured (required for `run`)"),
            }
            println!();
            println!(
                "Variants ({} declared, {} deployments):",
                config.variants.len(),
                variants.len()
            );
            for spec in &config.variants {
                let v = &spec.variant;
                println!(
                    "  - {} ({}, {}, {}, replicas: {})",
                    v.name,
                    v.role(),
                    v.generation,
                    v.runtime,
                    spec.replicas
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
