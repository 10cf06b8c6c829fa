// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contract for analysis outcomes. The orchestrator never reads
//! from it; it only emits outcome data that the persistence collaborator
//! stores.
//!
//! | Trait | Records | Implementations |
//! |-------|---------|----------------|
//! | `AnalysisRepository` | `StoredAnalysis`, `BackendMetric` | `InMemoryAnalysisRepository`, `PostgresAnalysisRepository` |
//!
//! The implementation is picked at startup: PostgreSQL when a database URL is
//! configured, in-memory otherwise.

use crate::domain::analysis::Protocol;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisId(pub Uuid);

impl AnalysisId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

/// Analysis saved at the caller's request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAnalysis {
    pub id: AnalysisId,
    pub signal: String,
    pub protocol: Protocol,
    pub depth: u8,
    pub content: String,
    pub backend: String,
    pub processing_time_ms: u64,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// One backend attempt as recorded for offline analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendMetric {
    pub backend: String,
    pub response_time_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub protocol: Protocol,
    pub confidence: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// Persist an analysis under its id
    async fn save_analysis(&self, analysis: &StoredAnalysis) -> Result<(), RepositoryError>;

    async fn find_analysis(&self, id: AnalysisId) -> Result<Option<StoredAnalysis>, RepositoryError>;

    /// Most recent analyses first
    async fn history(&self, limit: usize) -> Result<Vec<StoredAnalysis>, RepositoryError>;

    async fn record_backend_metric(&self, metric: &BackendMetric) -> Result<(), RepositoryError>;

    /// Most recent metrics for one backend first
    async fn backend_metrics(&self, backend: &str, limit: usize) -> Result<Vec<BackendMetric>, RepositoryError>;

    /// Connectivity check backing `/health` and `/ready`
    async fn ping(&self) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}
