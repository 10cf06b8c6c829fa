// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! One-shot analysis against the configured backends

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Instant;

use oracle_core::domain::{
    analysis::{AnalysisRequest, AnalysisResult, Depth, Protocol},
    repository::{AnalysisId, StoredAnalysis},
};

use crate::services::Services;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Signal text to analyze (15-5000 characters, or @file)
    #[arg(value_name = "SIGNAL")]
    pub signal: String,

    /// Analysis protocol (spiral, fractal, quantum, linear, mythotechnic)
    #[arg(short, long, default_value = "spiral")]
    pub protocol: String,

    /// Analysis depth (1-5)
    #[arg(short, long, default_value_t = 3)]
    pub depth: u8,

    /// Store the result in the analysis repository
    #[arg(long)]
    pub save: bool,

    /// Print the raw JSON result instead of formatted text
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: AnalyzeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let request = build_request(&args)?;
    let services = Services::load(config_path).await?;
    let persister = services.start_persister();

    let started = Instant::now();
    let outcome = services.orchestrator.analyze(&request).await;
    let total_ms = started.elapsed().as_millis() as u64;

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            // Failed attempts still belong in the metrics table
            services.drain(persister).await;
            return Err(anyhow::Error::new(e).context("Analysis failed"));
        }
    };

    let reported = report(&args, &request, &result, total_ms, &services).await;
    services.drain(persister).await;
    reported
}

async fn report(
    args: &AnalyzeArgs,
    request: &AnalysisRequest,
    result: &AnalysisResult,
    total_ms: u64,
    services: &Services,
) -> Result<()> {
    let mut saved_id = None;
    if args.save {
        let stored = StoredAnalysis {
            id: AnalysisId::new(),
            signal: request.signal().to_string(),
            protocol: request.protocol(),
            depth: request.depth().get(),
            content: result.content().to_string(),
            backend: result.backend().to_string(),
            processing_time_ms: total_ms,
            confidence: result.confidence(),
            created_at: chrono::Utc::now(),
        };
        services
            .repository
            .save_analysis(&stored)
            .await
            .context("Failed to save analysis")?;
        saved_id = Some(stored.id);
    }

    if args.json {
        let body = serde_json::json!({
            "content": result.content(),
            "oracle": result.backend(),
            "confidence": result.confidence(),
            "processingTime": total_ms,
            "protocol": request.protocol(),
            "depth": request.depth().get(),
            "complexity": request.complexity(),
            "savedId": saved_id.map(|id| id.0),
            "metadata": result.metadata(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!(
            "{} {} via {} (confidence {:.2}, {} ms)",
            "✓".green(),
            format!("{} analysis", request.protocol()).bold(),
            result.backend().cyan(),
            result.confidence(),
            total_ms
        );
        if let Some(id) = saved_id {
            println!("  Saved as {}", id.0.to_string().dimmed());
        }
        println!();
        println!("{}", result.content());
    }

    Ok(())
}

fn build_request(args: &AnalyzeArgs) -> Result<AnalysisRequest> {
    let signal = match args.signal.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read signal from {}", path))?,
        None => args.signal.clone(),
    };
    let protocol: Protocol = args.protocol.parse().map_err(|e| anyhow!("{}", e))?;
    let depth = Depth::new(args.depth).map_err(|e| anyhow!("{}", e))?;

    let request = AnalysisRequest::validated(signal.trim(), protocol, depth)
        .map_err(|e| anyhow!("{}", e))?
        .with_computed_complexity();
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(signal: &str, protocol: &str, depth: u8) -> AnalyzeArgs {
        AnalyzeArgs {
            signal: signal.to_string(),
            protocol: protocol.to_string(),
            depth,
            save: false,
            json: false,
        }
    }

    #[test]
    fn test_build_request_validates_fields() {
        let request = build_request(&args("A tower of books that hums at night.", "Quantum", 4)).unwrap();
        assert_eq!(request.protocol(), Protocol::Quantum);
        assert_eq!(request.depth().get(), 4);
        assert!(request.complexity().is_some());

        assert!(build_request(&args("too short", "spiral", 3)).is_err());
        assert!(build_request(&args("A tower of books that hums at night.", "astral", 3)).is_err());
        assert!(build_request(&args("A tower of books that hums at night.", "spiral", 6)).is_err());
    }

    #[test]
    fn test_build_request_reads_signal_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "The sea was made of folded maps.").unwrap();

        let signal = format!("@{}", file.path().display());
        let request = build_request(&args(&signal, "linear", 1)).unwrap();
        assert_eq!(request.signal(), "The sea was made of folded maps.");
    }
}
