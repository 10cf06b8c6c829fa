// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the `AnalysisRepository` abstraction
//! defined in the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist analyses and per-attempt backend metrics
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **PostgresAnalysisRepository** - `consciousness_analyses` and `oracle_metrics` tables
//! - **InMemoryAnalysisRepository** - Default when no database is configured

pub mod postgres;

pub use postgres::PostgresAnalysisRepository;

use crate::domain::repository::{AnalysisId, AnalysisRepository, BackendMetric, RepositoryError, StoredAnalysis};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub const DEFAULT_MAX_ANALYSES: usize = 1_000;
pub const DEFAULT_MAX_METRICS_PER_BACKEND: usize = 1_000;

#[derive(Default)]
struct AnalysisStore {
    by_id: HashMap<AnalysisId, StoredAnalysis>,
    // Insertion order, oldest first
    order: VecDeque<AnalysisId>,
}

/// Thread-safe, process-local repository.
///
/// Both stores are capped; the oldest entries are evicted first.
#[derive(Clone)]
pub struct InMemoryAnalysisRepository {
    analyses: Arc<RwLock<AnalysisStore>>,
    metrics: Arc<RwLock<HashMap<String, VecDeque<BackendMetric>>>>,
    max_analyses: usize,
    max_metrics_per_backend: usize,
}

impl InMemoryAnalysisRepository {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ANALYSES, DEFAULT_MAX_METRICS_PER_BACKEND)
    }

    pub fn with_capacity(max_analyses: usize, max_metrics_per_backend: usize) -> Self {
        Self {
            analyses: Arc::new(RwLock::new(AnalysisStore::default())),
            metrics: Arc::new(RwLock::new(HashMap::new())),
            max_analyses: max_analyses.max(1),
            max_metrics_per_backend: max_metrics_per_backend.max(1),
        }
    }
}

impl Default for InMemoryAnalysisRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisRepository for InMemoryAnalysisRepository {
    async fn save_analysis(&self, analysis: &StoredAnalysis) -> Result<(), RepositoryError> {
        let mut store = self.analyses.write();
        if store.by_id.insert(analysis.id, analysis.clone()).is_none() {
            store.order.push_back(analysis.id);
            while store.order.len() > self.max_analyses {
                if let Some(evicted) = store.order.pop_front() {
                    store.by_id.remove(&evicted);
                }
            }
        }
        Ok(())
    }

    async fn find_analysis(&self, id: AnalysisId) -> Result<Option<StoredAnalysis>, RepositoryError> {
        Ok(self.analyses.read().by_id.get(&id).cloned())
    }

    async fn history(&self, limit: usize) -> Result<Vec<StoredAnalysis>, RepositoryError> {
        let mut analyses: Vec<StoredAnalysis> = self.analyses.read().by_id.values().cloned().collect();
        analyses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        analyses.truncate(limit);
        Ok(analyses)
    }

    async fn record_backend_metric(&self, metric: &BackendMetric) -> Result<(), RepositoryError> {
        let mut metrics = self.metrics.write();
        let recent = metrics.entry(metric.backend.clone()).or_default();
        recent.push_back(metric.clone());
        while recent.len() > self.max_metrics_per_backend {
            recent.pop_front();
        }
        Ok(())
    }

    async fn backend_metrics(&self, backend: &str, limit: usize) -> Result<Vec<BackendMetric>, RepositoryError> {
        Ok(self
            .metrics
            .read()
            .get(backend)
            .map(|recent| recent.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::Protocol;
    use chrono::{Duration, Utc};

    fn metric(backend: &str, response_time_ms: u64, success: bool) -> BackendMetric {
        BackendMetric {
            backend: backend.to_string(),
            response_time_ms,
            success,
            error_message: None,
            protocol: Protocol::Linear,
            confidence: None,
            recorded_at: Utc::now(),
        }
    }

    fn analysis(signal: &str, minutes_ago: i64) -> StoredAnalysis {
        StoredAnalysis {
            id: AnalysisId::new(),
            signal: signal.to_string(),
            protocol: Protocol::Spiral,
            depth: 3,
            content: "reading".to_string(),
            backend: "claude".to_string(),
            processing_time_ms: 120,
            confidence: 0.8,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let repo = InMemoryAnalysisRepository::new();
        let stored = analysis("a dream of falling", 0);
        repo.save_analysis(&stored).await.unwrap();

        assert_eq!(repo.find_analysis(stored.id).await.unwrap(), Some(stored));
        assert_eq!(repo.find_analysis(AnalysisId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_history_newest_first_with_limit() {
        let repo = InMemoryAnalysisRepository::new();
        repo.save_analysis(&analysis("oldest", 30)).await.unwrap();
        repo.save_analysis(&analysis("newest", 1)).await.unwrap();
        repo.save_analysis(&analysis("middle", 10)).await.unwrap();

        let history = repo.history(2).await.unwrap();
        let signals: Vec<_> = history.iter().map(|a| a.signal.as_str()).collect();
        assert_eq!(signals, vec!["newest", "middle"]);
    }

    #[tokio::test]
    async fn test_backend_metrics_filtered_by_backend() {
        let repo = InMemoryAnalysisRepository::new();
        for (backend, success) in [("claude", true), ("gpt", false), ("claude", false)] {
            repo.record_backend_metric(&metric(backend, 10, success)).await.unwrap();
        }

        let claude = repo.backend_metrics("claude", 10).await.unwrap();
        assert_eq!(claude.len(), 2);
        // Most recent first
        assert!(!claude[0].success);
        assert_eq!(repo.backend_metrics("claude", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_backend_metrics_capped_per_backend() {
        let repo = InMemoryAnalysisRepository::with_capacity(10, 3);
        for i in 0..50 {
            repo.record_backend_metric(&metric("claude", i, true)).await.unwrap();
        }
        repo.record_backend_metric(&metric("gpt", 7, false)).await.unwrap();

        let claude = repo.backend_metrics("claude", usize::MAX).await.unwrap();
        let times: Vec<u64> = claude.iter().map(|m| m.response_time_ms).collect();
        assert_eq!(times, vec![49, 48, 47]);
        // Other backends keep their own budget
        assert_eq!(repo.backend_metrics("gpt", usize::MAX).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_oldest_analyses_evicted_at_capacity() {
        let repo = InMemoryAnalysisRepository::with_capacity(2, 10);
        let first = analysis("first", 3);
        let second = analysis("second", 2);
        let third = analysis("third", 1);
        for stored in [&first, &second, &third] {
            repo.save_analysis(stored).await.unwrap();
        }

        assert_eq!(repo.find_analysis(first.id).await.unwrap(), None);
        assert!(repo.find_analysis(third.id).await.unwrap().is_some());
        assert_eq!(repo.history(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resave_replaces_without_growing() {
        let repo = InMemoryAnalysisRepository::with_capacity(2, 10);
        let mut stored = analysis("revisited", 0);
        repo.save_analysis(&stored).await.unwrap();
        stored.confidence = 0.3;
        repo.save_analysis(&stored).await.unwrap();

        let history = repo.history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].confidence, 0.3);
    }
}
