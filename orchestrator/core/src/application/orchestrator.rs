// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Analysis Orchestrator Application Service
//!
//! Routes one analysis request through the ranked backends, one at a time,
//! until a backend succeeds or every candidate has failed.
//!
//! - ranking is recomputed from current health on every request
//! - attempts are strictly sequential (no fan-out)
//! - every failed attempt counts as one failover event
//! - outcome events go to the event bus for the persistence collaborator

use crate::domain::analysis::{AnalysisRequest, AnalysisResult};
use crate::domain::analytics::{Analytics, AnalyticsSnapshot};
use crate::domain::backend::BackendStatus;
use crate::domain::events::{AnalysisEvent, RequestId};
use crate::domain::registry::BackendRegistry;
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestrationError {
    #[error("No oracle backends configured")]
    NoBackendsConfigured,

    #[error("All oracle backends failed after {attempts} attempts. Last error: {last_error}")]
    AllBackendsFailed { attempts: usize, last_error: String },
}

/// Aggregate view of backends and analytics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleStatusReport {
    pub total_backends: usize,
    pub available_backends: usize,
    /// Order computed by the most recent request or probe
    pub failover_order: Vec<String>,
    pub analytics: AnalyticsSnapshot,
    pub backends: Vec<BackendStatus>,
}

pub struct AnalysisOrchestrator {
    registry: Arc<BackendRegistry>,
    analytics: Arc<Analytics>,
    event_bus: Arc<EventBus>,
}

impl AnalysisOrchestrator {
    pub fn new(
        registry: Arc<BackendRegistry>,
        analytics: Arc<Analytics>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            analytics,
            event_bus,
        }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Run one request through the failover chain
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, OrchestrationError> {
        if self.registry.is_empty() {
            error!("Analysis requested with no oracle backends configured");
            return Err(OrchestrationError::NoBackendsConfigured);
        }

        let request_id = RequestId::new();
        let started = Instant::now();
        self.analytics.record_query();
        counter!("oracle_queries_total", "protocol" => request.protocol().as_str()).increment(1);

        let ranked = self.registry.ranked_order();
        let candidates: Vec<String> = ranked.iter().map(|b| b.name().to_string()).collect();
        info!(
            %request_id,
            protocol = %request.protocol(),
            depth = request.depth().get(),
            order = ?candidates,
            "Starting oracle analysis"
        );
        self.event_bus.publish_analysis_event(AnalysisEvent::AnalysisStarted {
            request_id,
            protocol: request.protocol(),
            depth: request.depth().get(),
            candidates,
            started_at: Utc::now(),
        });

        let mut last_error = None;
        let mut attempts = 0;

        for backend in ranked {
            attempts += 1;
            debug!(%request_id, backend = backend.name(), attempt = attempts, "Attempting backend");

            let attempt_started = Instant::now();
            let outcome = backend.submit(request).await;
            let attempt_ms = attempt_started.elapsed().as_millis() as u64;
            histogram!("oracle_attempt_duration_ms", "backend" => backend.name().to_string())
                .record(attempt_ms as f64);

            match outcome {
                Ok(result) => {
                    let total_ms = started.elapsed().as_millis() as u64;
                    self.analytics.record_success(total_ms as f64);
                    counter!("oracle_successful_queries_total", "backend" => backend.name().to_string())
                        .increment(1);

                    self.event_bus.publish_analysis_event(AnalysisEvent::BackendAttempted {
                        request_id,
                        backend: backend.name().to_string(),
                        attempt: attempts,
                        success: true,
                        response_time_ms: result.processing_time_ms(),
                        protocol: request.protocol(),
                        confidence: Some(result.confidence()),
                        error: None,
                        attempted_at: Utc::now(),
                    });
                    self.event_bus.publish_analysis_event(AnalysisEvent::AnalysisCompleted {
                        request_id,
                        backend: backend.name().to_string(),
                        attempts,
                        total_time_ms: total_ms,
                        completed_at: Utc::now(),
                    });

                    info!(
                        %request_id,
                        backend = backend.name(),
                        attempts,
                        total_ms,
                        "Oracle analysis completed"
                    );
                    return Ok(result);
                }
                Err(e) => {
                    self.analytics.record_failover();
                    counter!("oracle_failover_events_total", "backend" => backend.name().to_string())
                        .increment(1);
                    warn!(%request_id, backend = backend.name(), error = %e, "Oracle backend failed, failing over");

                    self.event_bus.publish_analysis_event(AnalysisEvent::BackendAttempted {
                        request_id,
                        backend: backend.name().to_string(),
                        attempt: attempts,
                        success: false,
                        response_time_ms: attempt_ms,
                        protocol: request.protocol(),
                        confidence: None,
                        error: Some(e.to_string()),
                        attempted_at: Utc::now(),
                    });
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no backend attempted".to_string());
        counter!("oracle_exhausted_queries_total").increment(1);
        error!(%request_id, attempts, last_error = %last_error, "All oracle backends failed");
        self.event_bus.publish_analysis_event(AnalysisEvent::AnalysisFailed {
            request_id,
            attempts,
            last_error: last_error.clone(),
            failed_at: Utc::now(),
        });

        Err(OrchestrationError::AllBackendsFailed {
            attempts,
            last_error,
        })
    }

    pub fn analytics(&self) -> AnalyticsSnapshot {
        self.analytics.snapshot(self.registry.len())
    }

    /// Status report; does not recompute the failover order
    pub fn status(&self) -> OracleStatusReport {
        let backends = self.registry.statuses();
        OracleStatusReport {
            total_backends: backends.len(),
            available_backends: backends.iter().filter(|b| b.is_healthy).count(),
            failover_order: self.registry.failover_order(),
            analytics: self.analytics(),
            backends,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{Depth, Protocol};
    use crate::domain::backend::BackendAdapter;
    use crate::domain::llm::{OracleProvider, ProviderError, ProviderResponse};
    use crate::infrastructure::event_bus::DomainEvent;
    use async_trait::async_trait;

    struct FixedProvider(Result<&'static str, &'static str>);

    #[async_trait]
    impl OracleProvider for FixedProvider {
        async fn analyze(&self, _request: &AnalysisRequest) -> Result<ProviderResponse, ProviderError> {
            match self.0 {
                Ok(content) => Ok(ProviderResponse {
                    content: content.to_string(),
                    confidence: 0.7,
                    metadata: Default::default(),
                }),
                Err(msg) => Err(ProviderError::Provider(msg.to_string())),
            }
        }

        async fn is_available(&self) -> Result<bool, ProviderError> {
            Ok(self.0.is_ok())
        }
    }

    fn orchestrator(backends: Vec<(&str, u32, Result<&'static str, &'static str>)>) -> AnalysisOrchestrator {
        let mut registry = BackendRegistry::new();
        for (name, priority, outcome) in backends {
            registry
                .register(BackendAdapter::new(name, priority, Arc::new(FixedProvider(outcome))))
                .unwrap();
        }
        AnalysisOrchestrator::new(
            Arc::new(registry),
            Arc::new(Analytics::new()),
            Arc::new(EventBus::new(64)),
        )
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("the tide keeps returning", Protocol::Linear, Depth::new(2).unwrap())
    }

    #[tokio::test]
    async fn test_no_backends_does_not_count_query() {
        let orchestrator = orchestrator(vec![]);
        let err = orchestrator.analyze(&request()).await.unwrap_err();
        assert_eq!(err, OrchestrationError::NoBackendsConfigured);
        assert_eq!(orchestrator.analytics().total_queries, 0);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_error() {
        let orchestrator = orchestrator(vec![("a", 1, Err("first down")), ("b", 2, Err("second down"))]);

        let err = orchestrator.analyze(&request()).await.unwrap_err();
        match err {
            OrchestrationError::AllBackendsFailed { attempts, last_error } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("second down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let analytics = orchestrator.analytics();
        assert_eq!(analytics.total_queries, 1);
        assert_eq!(analytics.successful_queries, 0);
        assert_eq!(analytics.failover_events, 2);
    }

    #[tokio::test]
    async fn test_events_for_failover_then_success() {
        let orchestrator = orchestrator(vec![("a", 1, Err("down")), ("b", 2, Ok("insight"))]);
        let mut receiver = orchestrator.event_bus.subscribe();

        let result = orchestrator.analyze(&request()).await.unwrap();
        assert_eq!(result.backend(), "b");

        let mut kinds = Vec::new();
        while let Ok(DomainEvent::Analysis(event)) = receiver.try_recv() {
            kinds.push(match event {
                AnalysisEvent::AnalysisStarted { .. } => "started".to_string(),
                AnalysisEvent::BackendAttempted { backend, success, .. } => format!("{backend}:{success}"),
                AnalysisEvent::AnalysisCompleted { .. } => "completed".to_string(),
                AnalysisEvent::AnalysisFailed { .. } => "failed".to_string(),
            });
        }
        assert_eq!(kinds, vec!["started", "a:false", "b:true", "completed"]);
    }

    #[tokio::test]
    async fn test_status_report() {
        let orchestrator = orchestrator(vec![("a", 1, Err("down")), ("b", 2, Ok("insight"))]);
        orchestrator.analyze(&request()).await.unwrap();

        let status = orchestrator.status();
        assert_eq!(status.total_backends, 2);
        assert_eq!(status.available_backends, 1);
        assert_eq!(status.failover_order, vec!["a", "b"]);
        assert_eq!(status.analytics.backend_count, 2);
        assert_eq!(status.analytics.success_rate, 1.0);
        assert_eq!(status.analytics.failover_rate, 1.0);
    }
}
