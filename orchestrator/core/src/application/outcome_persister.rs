// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Outcome Persister Application Service
//!
//! Subscribes to analysis events from the event bus and records one
//! `BackendMetric` per backend attempt. The orchestrator never waits on it
//! and never reads what it writes.

use crate::domain::events::AnalysisEvent;
use crate::domain::repository::{AnalysisRepository, BackendMetric};
use crate::infrastructure::event_bus::{DomainEvent, EventBus, EventBusError};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct OutcomePersister {
    repository: Arc<dyn AnalysisRepository>,
    event_bus: Arc<EventBus>,
}

impl OutcomePersister {
    pub fn new(repository: Arc<dyn AnalysisRepository>, event_bus: Arc<EventBus>) -> Self {
        Self {
            repository,
            event_bus,
        }
    }

    /// Start the background persistence task.
    ///
    /// Subscribes before spawning, so no attempt published after this call
    /// returns is missed. Runs until the event bus closes.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        info!("Starting outcome persister background task");
        let mut receiver = self.event_bus.subscribe();
        let repository = self.repository.clone();
        // The task holds only the receiver so the bus can close
        drop(self);

        tokio::spawn(async move {
            let mut recorded = 0u64;
            let mut errors = 0u64;

            loop {
                match receiver.recv().await {
                    Ok(DomainEvent::Analysis(AnalysisEvent::BackendAttempted {
                        backend,
                        success,
                        response_time_ms,
                        protocol,
                        confidence,
                        error,
                        attempted_at,
                        ..
                    })) => {
                        let metric = BackendMetric {
                            backend,
                            response_time_ms,
                            success,
                            error_message: error,
                            protocol,
                            confidence,
                            recorded_at: attempted_at,
                        };

                        match repository.record_backend_metric(&metric).await {
                            Ok(()) => {
                                recorded += 1;
                                if recorded % 100 == 0 {
                                    debug!("Outcome persister recorded {} metrics ({} errors)", recorded, errors);
                                }
                            }
                            Err(e) => {
                                errors += 1;
                                error!(backend = %metric.backend, error = %e, "Failed to persist backend metric");
                            }
                        }
                    }
                    Ok(_) => continue,
                    Err(EventBusError::Closed) => {
                        info!(
                            "Event bus closed, shutting down outcome persister ({} recorded, {} errors)",
                            recorded, errors
                        );
                        break;
                    }
                    Err(EventBusError::Lagged(n)) => {
                        warn!("Outcome persister lagged by {} events, some metrics were dropped", n);
                    }
                    Err(EventBusError::Empty) => continue,
                }
            }
        })
    }
}
