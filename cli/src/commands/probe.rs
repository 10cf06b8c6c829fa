// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Probe every configured backend once and report the resulting order

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use crate::services::Services;

pub async fn execute(config_path: Option<PathBuf>, json: bool) -> Result<()> {
    let services = Services::load(config_path).await?;

    if services.registry.is_empty() {
        println!("{}", "No oracle backends configured".yellow());
        return Ok(());
    }

    let results = services.prober.probe_all().await;
    let status = services.orchestrator.status();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Backend availability:".bold());
    for backend in &status.backends {
        let available = results.get(&backend.name).copied().unwrap_or(false);
        let marker = if available { "✓".green() } else { "✗".red() };
        println!(
            "  {} {} (priority {}, success rate {:.2})",
            marker,
            backend.name.bold(),
            backend.priority,
            backend.success_rate
        );
    }
    println!();
    println!(
        "{} {}/{} available",
        "Summary:".bold(),
        status.available_backends,
        status.total_backends
    );
    println!("{} {}", "Failover order:".bold(), status.failover_order.join(" → "));

    Ok(())
}
