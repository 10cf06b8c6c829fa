// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use oracle_core::domain::config::{
    BackendConfig, DatabaseConfig, LoggingConfig, MetricsConfig, ObservabilityConfig,
    OracleConfigManifest, ProviderType,
};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./oracle-config.yaml)
        #[arg(short, long, default_value = "./oracle-config.yaml")]
        output: PathBuf,

        /// Include example backends, database and observability sections
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = OracleConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        for (i, path) in OracleConfigManifest::search_paths().iter().enumerate() {
            let marker = if path.exists() { "✓".green() } else { " ".normal() };
            println!("  {}. {} {}", i + 2, path.display(), marker);
        }
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!();

    println!("{}", "Oracle Backends:".bold());
    if config.spec.backends.is_empty() {
        println!("  {}", "(none configured)".dimmed());
    }
    for backend in &config.spec.backends {
        let state = if backend.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!(
            "  {} ({}, priority {}, {})",
            backend.name.bold(),
            backend.provider_type,
            backend.priority,
            state
        );
        println!(
            "    Endpoint: {}",
            backend.resolved_endpoint().unwrap_or("(missing)")
        );
        println!("    Model: {}", backend.model);
        if let Some(probe_model) = &backend.probe_model {
            println!("    Probe model: {}", probe_model);
        }
        println!(
            "    API key: {}",
            if backend.api_key.is_some() { "set" } else { "(none)" }
        );
    }
    println!();

    let orchestration = &config.spec.orchestration;
    println!("{}", "Orchestration:".bold());
    println!("  Attempt timeout: {} ms", orchestration.attempt_timeout_ms);
    println!("  Probe timeout: {} ms", orchestration.probe_timeout_ms);
    println!("  Probe interval: {} s", orchestration.health_probe_interval_secs);
    println!();

    println!("{}", "Network:".bold());
    println!(
        "  Listen: {}:{}",
        config.spec.network.bind_address, config.spec.network.port
    );
    println!(
        "  Database: {}",
        if config.spec.database.is_some() {
            "postgres"
        } else {
            "in-memory"
        }
    );

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OracleConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    let enabled = config.enabled_backends().count();
    println!("{}", "✓ Configuration is valid".green());
    println!("  {} backend(s) enabled", enabled);
    if enabled == 0 {
        println!(
            "{}",
            "  No backends enabled; set ANTHROPIC_API_KEY or OPENAI_API_KEY, or add spec.backends".yellow()
        );
    }

    Ok(())
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = sample_config(with_examples);
    sample
        .to_yaml_file(output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn sample_config(with_examples: bool) -> OracleConfigManifest {
    let mut config = OracleConfigManifest::default();

    config.spec.backends.push(BackendConfig {
        name: "anthropic-claude".to_string(),
        provider_type: ProviderType::Anthropic,
        endpoint: None,
        api_key: Some("env:ANTHROPIC_API_KEY".to_string()),
        model: "claude-3-sonnet-20240229".to_string(),
        probe_model: None,
        priority: 1,
        enabled: true,
        max_tokens: 2048,
        temperature: 0.7,
    });

    if with_examples {
        config.spec.backends.push(BackendConfig {
            name: "openai-gpt".to_string(),
            provider_type: ProviderType::Openai,
            endpoint: None,
            api_key: Some("env:OPENAI_API_KEY".to_string()),
            model: "gpt-4".to_string(),
            probe_model: Some("gpt-3.5-turbo".to_string()),
            priority: 2,
            enabled: true,
            max_tokens: 2048,
            temperature: 0.7,
        });
        config.spec.backends.push(BackendConfig {
            name: "local-lm-studio".to_string(),
            provider_type: ProviderType::OpenaiCompatible,
            endpoint: Some("http://localhost:1234/v1".to_string()),
            api_key: None,
            model: "local-model".to_string(),
            probe_model: None,
            priority: 3,
            enabled: false,
            max_tokens: 2048,
            temperature: 0.7,
        });
        config.spec.database = Some(DatabaseConfig {
            url: "env:ORACLE_DATABASE_URL".to_string(),
            max_connections: 5,
        });
        config.spec.observability = Some(ObservabilityConfig {
            logging: Some(LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            }),
            metrics: Some(MetricsConfig {
                enabled: true,
                port: 9090,
            }),
        });
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_writes_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oracle-config.yaml");

        generate(&path, true).await.unwrap();

        let loaded = OracleConfigManifest::from_yaml_file(&path).unwrap();
        loaded.validate().unwrap();
        assert_eq!(loaded.spec.backends.len(), 3);
        assert_eq!(loaded.enabled_backends().count(), 2);
        assert!(loaded.spec.database.is_some());
    }

    #[test]
    fn test_minimal_sample_has_single_backend() {
        let config = sample_config(false);
        assert_eq!(config.spec.backends.len(), 1);
        assert!(config.spec.database.is_none());
        config.validate().unwrap();
    }
}
