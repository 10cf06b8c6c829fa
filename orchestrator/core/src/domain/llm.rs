// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Provides the provider-facing contract every oracle backend implements.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary between orchestration and vendor APIs

// Oracle Provider Domain Interface
//
// Concrete vendor adapters live in infrastructure/llm/. The orchestrator never
// sees them directly: it talks to a BackendAdapter, which wraps one provider
// and keeps its health statistics.

use crate::domain::analysis::AnalysisRequest;
use async_trait::async_trait;

/// Domain interface for analysis providers
#[async_trait]
pub trait OracleProvider: Send + Sync {
    /// Run one analysis against the provider
    async fn analyze(&self, request: &AnalysisRequest) -> Result<ProviderResponse, ProviderError>;

    /// Lightweight availability check, independent of request traffic
    async fn is_available(&self) -> Result<bool, ProviderError>;
}

/// Raw output of a provider call, before the adapter stamps identity and timing
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    /// Generated analysis text
    pub content: String,

    /// Provider-specific quality estimate in `[0, 1]`
    pub confidence: f64,

    /// Opaque provider metadata (model, token usage, finish reason)
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Errors that can occur during provider calls
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),
}
