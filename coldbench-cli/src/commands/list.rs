// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `coldbench list` command - Show the deployment plan.
//!
//! Lists every variant copy the configuration expands to.

use coldbench_core::ConfigLoader;

pub async fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load_file(config_path)?;
    let variants = config.expand_variants()?;

    if variants.is_empty() {
        println!("No variants defined in configuration.");
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════════════════════════════════════╗");
    println!("║                              DEPLOYMENT PLAN                                 ║");
    println!("╠═══════════════════════════╦════════════╦══════╦════════════╦═════════════════╣");
    println!("║ Name                      ║ Role       ║ Gen  ║ Runtime    ║ Entry Point     ║");
    println!("╠═══════════════════════════╬════════════╬══════╬════════════╬═════════════════╣");

    for v in &variants {
        println!(
            "║ {:<25} ║ {:<10} ║ {:<4} ║ {:<10} ║ {:<15} ║",
            v.name.as_str(),
            v.role().to_string(),
            v.generation.to_string(),
            v.runtime.as_str(),
            v.entry_point
        );
    }

    println!("╚═══════════════════════════╩════════════╩══════╩════════════╩═════════════════╝");
    println!();

    let treatment = variants.iter().filter(|v| v.agent_enabled).count();
    println!(
        "Total: {} deployment(s), {} control, {} treatment",
        variants.len(),
        variants.len() - treatment,
        treatment
    );

    Ok(())
}
