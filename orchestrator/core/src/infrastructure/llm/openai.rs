// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI Oracle Provider Adapter
//
// Anti-Corruption Layer for the Chat Completions API. Also serves any
// OpenAI-compatible server (LM Studio, vLLM, LocalAI) through `base_url`.

use super::prompt::{indicator_confidence, PromptStyle, PromptTemplateEngine, STRUCTURED_SYSTEM_PROMPT};
use super::{map_error_status, GenerationSettings};
use crate::domain::analysis::AnalysisRequest;
use crate::domain::llm::{OracleProvider, ProviderError, ProviderResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub struct OpenAIAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    settings: GenerationSettings,
    prompts: Arc<PromptTemplateEngine>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

impl OpenAIAdapter {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
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

    async fn send(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, ProviderError> {
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(request);

        // Local servers usually run without a key
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
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

    fn confidence(content: &str) -> f64 {
        indicator_confidence(&[
            content.contains("ANALYSIS") || content.contains("PATTERN"),
            content.contains("1.") || content.contains("**"),
            content.chars().count() > 400,
            content.contains("consciousness") || content.contains("archetypal"),
            !content.contains("I cannot provide") && !content.contains("I'm unable"),
            content.contains("TRANSFORMATION") || content.contains("practices"),
            content.split("**").count() > 4,
        ])
    }
}

#[async_trait]
impl OracleProvider for OpenAIAdapter {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<ProviderResponse, ProviderError> {
        let prompt = self
            .prompts
            .render(request, PromptStyle::Structured)
            .map_err(|e| ProviderError::Provider(e.to_string()))?;

        debug!(model = %self.settings.model, protocol = %request.protocol(), "Sending OpenAI analysis");
        let response = self
            .send(&ChatRequest {
                model: &self.settings.model,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: STRUCTURED_SYSTEM_PROMPT,
                    },
                    ChatMessage {
                        role: "user",
                        content: &prompt,
                    },
                ],
                max_tokens: self.settings.max_tokens,
                temperature: Some(self.settings.temperature),
                presence_penalty: Some(0.1),
                frequency_penalty: Some(0.1),
            })
            .await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;
        let content = choice.message.content.clone().unwrap_or_default();
        let usage = response.usage.unwrap_or_default();

        let metadata = json!({
            "model": self.settings.model,
            "promptTokens": usage.prompt_tokens,
            "completionTokens": usage.completion_tokens,
            "totalTokens": usage.total_tokens,
            "finishReason": choice.finish_reason,
        });

        Ok(ProviderResponse {
            confidence: Self::confidence(&content),
            content,
            metadata: metadata.as_object().cloned().unwrap_or_default(),
        })
    }

    async fn is_available(&self) -> Result<bool, ProviderError> {
        self.send(&ChatRequest {
            model: self.settings.probe_model(),
            messages: vec![ChatMessage {
                role: "user",
                content: "Test",
            }],
            max_tokens: 5,
            temperature: None,
            presence_penalty: None,
            frequency_penalty: None,
        })
        .await
        .map(|_| true)
    }
}
