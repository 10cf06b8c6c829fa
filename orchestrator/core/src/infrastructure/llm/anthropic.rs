// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Anthropic Oracle Provider Adapter
//
// Anti-Corruption Layer for the Anthropic Messages API

use super::prompt::{indicator_confidence, PromptStyle, PromptTemplateEngine};
use super::{map_error_status, GenerationSettings};
use crate::domain::analysis::AnalysisRequest;
use crate::domain::llm::{OracleProvider, ProviderError, ProviderResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    settings: GenerationSettings,
    prompts: Arc<PromptTemplateEngine>,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: AnthropicUsage,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

impl AnthropicAdapter {
    pub fn new(
        base_url: impl Into<String>,
        api_key: String,
        settings: GenerationSettings,
        prompts: Arc<PromptTemplateEngine>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            settings,
            prompts,
        }
    }

    async fn send(&self, request: &AnthropicRequest<'_>) -> Result<AnthropicResponse, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_error_status(status, error_text, request.model));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// Quality heuristic over the response text
    fn confidence(content: &str) -> f64 {
        indicator_confidence(&[
            content.contains("PATTERN") || content.contains("**"),
            content.contains("ANALYSIS") || content.contains("1."),
            content.chars().count() > 500,
            content.contains("consciousness") || content.contains("archetypal"),
            !content.contains("I cannot") && !content.contains("I'm sorry"),
            content.contains("TRANSFORMATION") || content.contains("INSIGHTS"),
            content.split('\n').count() > 10,
        ])
    }
}

#[async_trait]
impl OracleProvider for AnthropicAdapter {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<ProviderResponse, ProviderError> {
        let prompt = self
            .prompts
            .render(request, PromptStyle::Archaeology)
            .map_err(|e| ProviderError::Provider(e.to_string()))?;

        debug!(model = %self.settings.model, protocol = %request.protocol(), "Sending Anthropic analysis");
        let response = self
            .send(&AnthropicRequest {
                model: &self.settings.model,
                messages: vec![AnthropicMessage {
                    role: "user",
                    content: &prompt,
                }],
                max_tokens: self.settings.max_tokens,
                temperature: Some(self.settings.temperature),
            })
            .await?;

        let content = response
            .content
            .iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text.clone())
            .ok_or_else(|| ProviderError::InvalidResponse("Response contained no text content".to_string()))?;

        let usage = &response.usage;
        let metadata = json!({
            "model": self.settings.model,
            "inputTokens": usage.input_tokens,
            "outputTokens": usage.output_tokens,
            "totalTokens": usage.input_tokens + usage.output_tokens,
            "stopReason": response.stop_reason,
        });

        Ok(ProviderResponse {
            confidence: Self::confidence(&content),
            content,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        })
    }

    async fn is_available(&self) -> Result<bool, ProviderError> {
        // Minimal token spend; any successful completion means reachable
        self.send(&AnthropicRequest {
            model: self.settings.probe_model(),
            messages: vec![AnthropicMessage {
                role: "user",
                content: "Hi",
            }],
            max_tokens: 5,
            temperature: None,
        })
        .await
        .map(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_heuristic() {
        assert_eq!(AnthropicAdapter::confidence("I'm sorry"), 0.0);

        let rich = format!(
            "**PATTERN IDENTIFICATION**\n1. ANALYSIS of consciousness\n**TRANSFORMATION INSIGHTS**\n{}",
            "line\n".repeat(120)
        );
        assert_eq!(AnthropicAdapter::confidence(&rich), 1.0);
    }
}
