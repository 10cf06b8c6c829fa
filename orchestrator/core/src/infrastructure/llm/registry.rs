// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Backend Registry Construction
//
// Turns the configured backend list into provider adapters wrapped by
// BackendAdapters. A backend that cannot be initialized (missing key,
// unknown endpoint) is skipped with a warning; the rest still register.

use super::anthropic::AnthropicAdapter;
use super::openai::OpenAIAdapter;
use super::prompt::PromptTemplateEngine;
use super::GenerationSettings;
use crate::domain::backend::BackendAdapter;
use crate::domain::config::{BackendConfig, OracleConfigManifest, ProviderType};
use crate::domain::llm::OracleProvider;
use crate::domain::registry::BackendRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Build the backend registry from configuration
pub fn build_registry(config: &OracleConfigManifest) -> anyhow::Result<BackendRegistry> {
    let prompts = Arc::new(PromptTemplateEngine::new()?);
    let attempt_timeout_ms = config.spec.orchestration.attempt_timeout_ms;
    let mut registry = BackendRegistry::new();

    info!("Initializing oracle backend registry");

    for backend_config in &config.spec.backends {
        if !backend_config.enabled {
            info!("Backend '{}' disabled, skipping", backend_config.name);
            continue;
        }

        let provider = match create_provider(backend_config, prompts.clone()) {
            Ok(provider) => provider,
            Err(e) => {
                warn!("Failed to initialize backend '{}': {}", backend_config.name, e);
                continue;
            }
        };

        let mut adapter = BackendAdapter::new(backend_config.name.clone(), backend_config.priority, provider);
        if attempt_timeout_ms > 0 {
            adapter = adapter.with_attempt_timeout(Duration::from_millis(attempt_timeout_ms));
        }
        registry.register(adapter)?;
    }

    if registry.is_empty() {
        warn!("No oracle backends configured - analysis requests will be rejected");
    }

    Ok(registry)
}

/// Create a provider instance from configuration
pub fn create_provider(
    config: &BackendConfig,
    prompts: Arc<PromptTemplateEngine>,
) -> anyhow::Result<Arc<dyn OracleProvider>> {
    let endpoint = config
        .resolved_endpoint()
        .ok_or_else(|| anyhow::anyhow!("No endpoint configured"))?
        .to_string();
    let api_key = resolve_api_key(&config.api_key)?;
    let settings = GenerationSettings::from(config);

    let provider: Arc<dyn OracleProvider> = match config.provider_type {
        ProviderType::Anthropic => {
            let api_key = api_key.ok_or_else(|| anyhow::anyhow!("Anthropic backends require an api_key"))?;
            Arc::new(AnthropicAdapter::new(endpoint, api_key, settings, prompts))
        }
        ProviderType::Openai => {
            let api_key = api_key.ok_or_else(|| anyhow::anyhow!("OpenAI backends require an api_key"))?;
            Arc::new(OpenAIAdapter::new(endpoint, Some(api_key), settings, prompts))
        }
        // OpenAI-compatible APIs (LM Studio, vLLM, etc.)
        ProviderType::OpenaiCompatible => Arc::new(OpenAIAdapter::new(endpoint, api_key, settings, prompts)),
    };

    Ok(provider)
}

/// Resolve API key from config (supports "env:VAR_NAME" syntax)
pub fn resolve_api_key(key: &Option<String>) -> anyhow::Result<Option<String>> {
    resolve_api_key_from(key, |var| std::env::var(var).ok())
}

fn resolve_api_key_from<F>(key: &Option<String>, lookup: F) -> anyhow::Result<Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    match key.as_deref() {
        Some(k) => match k.strip_prefix("env:") {
            Some(var_name) => lookup(var_name)
                .filter(|v| !v.is_empty())
                .map(Some)
                .ok_or_else(|| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(Some(k.to_string())),
        },
        // Local providers without auth
        None => Ok(None),
    }
}
