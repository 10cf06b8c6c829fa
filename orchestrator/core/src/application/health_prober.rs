// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Health Prober Application Service
//!
//! Out-of-band availability checks for every registered backend. Probe
//! results overwrite each adapter's health flag directly; the rolling
//! success rate is left alone, so a probe never moves a backend across
//! priority tiers.

use crate::domain::events::HealthEvent;
use crate::domain::registry::BackendRegistry;
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use futures::future::join_all;
use metrics::{counter, gauge};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct HealthProber {
    registry: Arc<BackendRegistry>,
    event_bus: Arc<EventBus>,
    probe_timeout: Duration,
}

impl HealthProber {
    pub fn new(registry: Arc<BackendRegistry>, event_bus: Arc<EventBus>, probe_timeout: Duration) -> Self {
        Self {
            registry,
            event_bus,
            probe_timeout,
        }
    }

    /// Probe every backend concurrently and apply the results.
    ///
    /// An error or timeout counts as unavailable. Never fails.
    pub async fn probe_all(&self) -> HashMap<String, bool> {
        let probes = self.registry.backends().iter().map(|backend| {
            let backend = backend.clone();
            let limit = self.probe_timeout;
            async move {
                let available = match tokio::time::timeout(limit, backend.check_availability()).await {
                    Ok(Ok(available)) => available,
                    Ok(Err(e)) => {
                        warn!(backend = backend.name(), error = %e, "Health probe failed");
                        false
                    }
                    Err(_) => {
                        warn!(backend = backend.name(), timeout_ms = limit.as_millis() as u64, "Health probe timed out");
                        false
                    }
                };
                backend.set_healthy(available);
                counter!(
                    "oracle_health_probes_total",
                    "backend" => backend.name().to_string(),
                    "available" => available.to_string()
                )
                .increment(1);
                (backend.name().to_string(), available)
            }
        });

        let results: HashMap<String, bool> = join_all(probes).await.into_iter().collect();

        self.registry.ranked_order();
        let failover_order = self.registry.failover_order();
        let healthy = results.values().filter(|ok| **ok).count();
        gauge!("oracle_available_backends").set(healthy as f64);
        info!(
            healthy,
            total = results.len(),
            order = ?failover_order,
            "Health probe completed"
        );

        self.event_bus.publish_health_event(HealthEvent::ProbeCompleted {
            results: results.clone(),
            failover_order,
            probed_at: Utc::now(),
        });

        results
    }

    /// Spawn periodic probing until `shutdown` flips to `true`.
    ///
    /// The first probe runs immediately.
    pub fn start(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        info!(interval_secs = interval.as_secs(), "Starting health prober background task");

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("Running scheduled health probe");
                        self.probe_all().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Shutting down health prober");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::AnalysisRequest;
    use crate::domain::backend::BackendAdapter;
    use crate::domain::llm::{OracleProvider, ProviderError, ProviderResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Probe {
        Up,
        Down,
        Broken,
        Hang,
    }

    struct ProbeProvider {
        probe: Probe,
        probes: AtomicUsize,
    }

    #[async_trait]
    impl OracleProvider for ProbeProvider {
        async fn analyze(&self, _request: &AnalysisRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse::default())
        }

        async fn is_available(&self) -> Result<bool, ProviderError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            match self.probe {
                Probe::Up => Ok(true),
                Probe::Down => Ok(false),
                Probe::Broken => Err(ProviderError::Network("refused".into())),
                Probe::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(true)
                }
            }
        }
    }

    fn provider(probe: Probe) -> Arc<ProbeProvider> {
        Arc::new(ProbeProvider {
            probe,
            probes: AtomicUsize::new(0),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_outcomes() {
        let mut registry = BackendRegistry::new();
        registry.register(BackendAdapter::new("up", 1, provider(Probe::Up))).unwrap();
        registry.register(BackendAdapter::new("down", 1, provider(Probe::Down))).unwrap();
        registry.register(BackendAdapter::new("broken", 2, provider(Probe::Broken))).unwrap();
        registry.register(BackendAdapter::new("hang", 3, provider(Probe::Hang))).unwrap();
        let registry = Arc::new(registry);

        let prober = HealthProber::new(registry.clone(), Arc::new(EventBus::new(8)), Duration::from_secs(10));
        let results = prober.probe_all().await;

        assert_eq!(results.len(), 4);
        assert!(results["up"]);
        assert!(!results["down"]);
        assert!(!results["broken"]);
        assert!(!results["hang"]);
        assert!(registry.get("up").unwrap().is_healthy());
        assert!(!registry.get("hang").unwrap().is_healthy());
        // Probes never touch the success rate
        assert_eq!(registry.get("down").unwrap().success_rate(), 1.0);
    }

    #[tokio::test]
    async fn test_probe_publishes_event() {
        let mut registry = BackendRegistry::new();
        registry.register(BackendAdapter::new("only", 1, provider(Probe::Up))).unwrap();
        let bus = Arc::new(EventBus::new(8));
        let mut receiver = bus.subscribe();

        let prober = HealthProber::new(Arc::new(registry), bus, Duration::from_secs(1));
        prober.probe_all().await;

        match receiver.try_recv() {
            Ok(crate::infrastructure::event_bus::DomainEvent::Health(HealthEvent::ProbeCompleted {
                results,
                failover_order,
                ..
            })) => {
                assert_eq!(results.get("only"), Some(&true));
                assert_eq!(failover_order, vec!["only"]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_registry_probe() {
        let prober = HealthProber::new(
            Arc::new(BackendRegistry::new()),
            Arc::new(EventBus::new(8)),
            Duration::from_secs(1),
        );
        assert!(prober.probe_all().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_probing_stops_on_shutdown() {
        let inner = provider(Probe::Up);
        let mut registry = BackendRegistry::new();
        registry.register(BackendAdapter::new("tick", 1, inner.clone())).unwrap();

        let prober = Arc::new(HealthProber::new(
            Arc::new(registry),
            Arc::new(EventBus::new(8)),
            Duration::from_secs(1),
        ));
        let (tx, rx) = watch::channel(false);
        let handle = prober.start(Duration::from_secs(60), rx);

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(inner.probes.load(Ordering::SeqCst), 3);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
