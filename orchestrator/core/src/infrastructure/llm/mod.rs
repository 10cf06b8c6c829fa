// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Oracle Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each provider adapter translates between the domain OracleProvider
// interface and one external API.

pub mod anthropic;
pub mod openai;
pub mod prompt;
pub mod registry;

pub use registry::build_registry;

use crate::domain::config::BackendConfig;
use crate::domain::llm::ProviderError;
use reqwest::StatusCode;

/// Model and sampling settings shared by all adapters
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub probe_model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationSettings {
    /// Model used for availability probes
    pub fn probe_model(&self) -> &str {
        self.probe_model.as_deref().unwrap_or(&self.model)
    }
}

impl From<&BackendConfig> for GenerationSettings {
    fn from(config: &BackendConfig) -> Self {
        Self {
            model: config.model.clone(),
            probe_model: config.probe_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn map_error_status(status: StatusCode, body: String, model: &str) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Authentication(body),
        429 => ProviderError::RateLimit,
        404 => ProviderError::ModelNotFound(model.to_string()),
        _ => ProviderError::Provider(format!("HTTP {}: {}", status, body)),
    }
}
