// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Backend adapter entity.
//!
//! A [`BackendAdapter`] wraps exactly one [`OracleProvider`] and owns that
//! provider's rolling health statistics. Every call to
//! [`BackendAdapter::submit`] applies the metrics update exactly once, whether
//! the provider call succeeded, failed or timed out.
//!
//! # Metrics policy
//!
//! - average response time: `new = (old + observed) / 2`
//! - success: healthy, success rate `+0.1` (capped at 1.0)
//! - failure: unhealthy, success rate `-0.2` (floored at 0.0)
//!
//! Health is advisory. It feeds ranking and never blocks an attempt.

use crate::domain::analysis::{AnalysisRequest, AnalysisResult};
use crate::domain::llm::{OracleProvider, ProviderError};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const SUCCESS_REWARD: f64 = 0.1;
const FAILURE_PENALTY: f64 = 0.2;

/// Mutable health state of one backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendHealth {
    pub is_healthy: bool,
    pub success_rate: f64,
    pub average_response_time_ms: f64,
}

impl Default for BackendHealth {
    fn default() -> Self {
        Self {
            is_healthy: true,
            success_rate: 1.0,
            average_response_time_ms: 0.0,
        }
    }
}

impl BackendHealth {
    /// Fold one attempt into the statistics
    pub fn record(&mut self, success: bool, response_time_ms: f64) {
        self.average_response_time_ms = (self.average_response_time_ms + response_time_ms) / 2.0;

        if success {
            self.is_healthy = true;
            self.success_rate = (self.success_rate + SUCCESS_REWARD).min(1.0);
        } else {
            self.is_healthy = false;
            self.success_rate = (self.success_rate - FAILURE_PENALTY).max(0.0);
        }
    }
}

/// Point-in-time view of a backend for status reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    pub name: String,
    pub priority: u32,
    pub is_healthy: bool,
    pub success_rate: f64,
    pub average_response_time_ms: f64,
}

/// A failed attempt against one backend
#[derive(Debug, Clone, thiserror::Error)]
#[error("{backend} analysis failed: {source}")]
pub struct BackendError {
    pub backend: String,
    #[source]
    pub source: ProviderError,
}

/// Uniform wrapper around one external provider
pub struct BackendAdapter {
    name: String,
    priority: u32,
    provider: Arc<dyn OracleProvider>,
    attempt_timeout: Option<Duration>,
    health: Mutex<BackendHealth>,
}

impl BackendAdapter {
    pub fn new(name: impl Into<String>, priority: u32, provider: Arc<dyn OracleProvider>) -> Self {
        Self {
            name: name.into(),
            priority,
            provider,
            attempt_timeout: None,
            health: Mutex::new(BackendHealth::default()),
        }
    }

    /// Bound each submit call; an elapsed timeout is recorded as a failure
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn health(&self) -> BackendHealth {
        *self.health.lock()
    }

    pub fn success_rate(&self) -> f64 {
        self.health.lock().success_rate
    }

    pub fn is_healthy(&self) -> bool {
        self.health.lock().is_healthy
    }

    /// Submit a request to the wrapped provider
    pub async fn submit(&self, request: &AnalysisRequest) -> Result<AnalysisResult, BackendError> {
        let started = Instant::now();

        let outcome = match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.analyze(request))
                .await
                .unwrap_or_else(|_| Err(ProviderError::Timeout(limit.as_millis() as u64))),
            None => self.provider.analyze(request).await,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.record_attempt(outcome.is_ok(), elapsed_ms as f64);

        match outcome {
            Ok(response) => {
                debug!(backend = %self.name, elapsed_ms, "Backend analysis completed");
                Ok(AnalysisResult::new(
                    response.content,
                    self.name.clone(),
                    response.confidence,
                    elapsed_ms,
                    response.metadata,
                ))
            }
            Err(source) => {
                warn!(backend = %self.name, elapsed_ms, error = %source, "Backend analysis failed");
                Err(BackendError {
                    backend: self.name.clone(),
                    source,
                })
            }
        }
    }

    /// Ask the provider whether it is reachable
    pub async fn check_availability(&self) -> Result<bool, ProviderError> {
        self.provider.is_available().await
    }

    /// Apply the metrics update for one attempt
    pub fn record_attempt(&self, success: bool, response_time_ms: f64) {
        self.health.lock().record(success, response_time_ms);
    }

    /// Direct health override from a probe; leaves the statistics untouched
    pub fn set_healthy(&self, healthy: bool) {
        self.health.lock().is_healthy = healthy;
    }

    pub fn status(&self) -> BackendStatus {
        let health = self.health();
        BackendStatus {
            name: self.name.clone(),
            priority: self.priority,
            is_healthy: health.is_healthy,
            success_rate: health.success_rate,
            average_response_time_ms: health.average_response_time_ms,
        }
    }
}

impl std::fmt::Debug for BackendAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendAdapter")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("health", &self.health())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{Depth, Protocol};
    use crate::domain::llm::ProviderResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        fail: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OracleProvider for ScriptedProvider {
        async fn analyze(&self, _request: &AnalysisRequest) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(ProviderError::Provider("boom".into()))
            } else {
                Ok(ProviderResponse {
                    content: "insight".into(),
                    confidence: 0.8,
                    metadata: Default::default(),
                })
            }
        }

        async fn is_available(&self) -> Result<bool, ProviderError> {
            Ok(!self.fail)
        }
    }

    fn provider(fail: bool, delay_ms: u64) -> Arc<ScriptedProvider> {
        Arc::new(ScriptedProvider {
            fail,
            delay: Duration::from_millis(delay_ms),
            calls: AtomicUsize::new(0),
        })
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("recurring dream about stairs", Protocol::Spiral, Depth::new(3).unwrap())
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_fresh_health_defaults() {
        let health = BackendHealth::default();
        assert!(health.is_healthy);
        assert_eq!(health.success_rate, 1.0);
        assert_eq!(health.average_response_time_ms, 0.0);
    }

    #[test]
    fn test_failure_then_success_is_asymmetric() {
        let mut health = BackendHealth::default();
        health.record(false, 100.0);
        assert_close(health.success_rate, 0.8);
        assert!(!health.is_healthy);
        health.record(true, 100.0);
        assert_close(health.success_rate, 0.9);
        assert!(health.is_healthy);
    }

    #[test]
    fn test_success_rate_stays_in_unit_interval() {
        let mut health = BackendHealth::default();
        for _ in 0..10 {
            health.record(false, 1.0);
        }
        assert_eq!(health.success_rate, 0.0);
        for _ in 0..20 {
            health.record(true, 1.0);
        }
        assert_eq!(health.success_rate, 1.0);
    }

    #[test]
    fn test_response_time_equal_weight_blend() {
        let mut health = BackendHealth::default();
        health.record(true, 100.0);
        assert_close(health.average_response_time_ms, 50.0);
        health.record(true, 300.0);
        assert_close(health.average_response_time_ms, 175.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_success_updates_metrics_once() {
        let inner = provider(false, 40);
        let adapter = BackendAdapter::new("alpha", 1, inner.clone());
        adapter.record_attempt(false, 0.0);

        let result = adapter.submit(&request()).await.unwrap();

        assert_eq!(result.backend(), "alpha");
        assert_eq!(result.content(), "insight");
        assert_eq!(result.processing_time_ms(), 40);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        let health = adapter.health();
        assert_close(health.success_rate, 0.9);
        assert_close(health.average_response_time_ms, 20.0);
    }

    #[tokio::test]
    async fn test_submit_failure_wraps_identity() {
        let adapter = BackendAdapter::new("beta", 2, provider(true, 0));

        let err = adapter.submit(&request()).await.unwrap_err();

        assert_eq!(err.backend, "beta");
        assert!(err.to_string().contains("beta analysis failed"));
        assert!(err.to_string().contains("boom"));
        assert!(!adapter.is_healthy());
        assert_close(adapter.success_rate(), 0.8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_timeout_counts_as_failure() {
        let adapter = BackendAdapter::new("slow", 1, provider(false, 10_000))
            .with_attempt_timeout(Duration::from_millis(250));

        let err = adapter.submit(&request()).await.unwrap_err();

        assert!(matches!(err.source, ProviderError::Timeout(250)));
        let health = adapter.health();
        assert!(!health.is_healthy);
        assert_close(health.success_rate, 0.8);
        assert_close(health.average_response_time_ms, 125.0);
    }

    #[test]
    fn test_probe_override_bypasses_smoothing() {
        let adapter = BackendAdapter::new("gamma", 1, provider(false, 0));
        adapter.set_healthy(false);
        let health = adapter.health();
        assert!(!health.is_healthy);
        assert_eq!(health.success_rate, 1.0);
        assert_eq!(health.average_response_time_ms, 0.0);
    }
}
