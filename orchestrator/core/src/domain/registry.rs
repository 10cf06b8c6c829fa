// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Backend registry and failover ranking.
//!
//! The registry owns the configured [`BackendAdapter`]s, keyed by unique name,
//! and derives the attempt order for each request:
//!
//! 1. priority tier, ascending
//! 2. success rate, descending
//!
//! Nothing else (latency, recency) takes part. Full ties keep registration
//! order, so ranking is a pure function of adapter state.

use crate::domain::backend::{BackendAdapter, BackendStatus};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Backend already registered: {0}")]
    DuplicateBackend(String),
}

#[derive(Debug, Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<BackendAdapter>>,
    failover_order: RwLock<Vec<String>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend; names must be unique
    pub fn register(&mut self, adapter: BackendAdapter) -> Result<(), RegistryError> {
        if self.get(adapter.name()).is_some() {
            return Err(RegistryError::DuplicateBackend(adapter.name().to_string()));
        }

        info!(
            backend = adapter.name(),
            priority = adapter.priority(),
            "Registered backend"
        );
        self.backends.push(Arc::new(adapter));
        self.ranked_order();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<BackendAdapter>> {
        self.backends.iter().find(|b| b.name() == name)
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// Adapters in registration order
    pub fn backends(&self) -> &[Arc<BackendAdapter>] {
        &self.backends
    }

    /// Recompute the attempt order from current adapter state.
    ///
    /// The result also becomes the order reported by [`Self::failover_order`].
    pub fn ranked_order(&self) -> Vec<Arc<BackendAdapter>> {
        let mut ranked: Vec<(u32, f64, Arc<BackendAdapter>)> = self
            .backends
            .iter()
            .map(|b| (b.priority(), b.success_rate(), b.clone()))
            .collect();

        ranked.sort_by(|(pa, ra, _), (pb, rb, _)| {
            pa.cmp(pb)
                .then_with(|| rb.partial_cmp(ra).unwrap_or(Ordering::Equal))
        });

        let ranked: Vec<Arc<BackendAdapter>> = ranked.into_iter().map(|(_, _, b)| b).collect();
        *self.failover_order.write() = ranked.iter().map(|b| b.name().to_string()).collect();
        ranked
    }

    /// Last computed failover order, without recomputing it
    pub fn failover_order(&self) -> Vec<String> {
        self.failover_order.read().clone()
    }

    pub fn statuses(&self) -> Vec<BackendStatus> {
        self.backends.iter().map(|b| b.status()).collect()
    }
}
