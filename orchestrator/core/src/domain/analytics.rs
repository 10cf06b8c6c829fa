// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Process-wide query analytics.
//!
//! One [`Analytics`] instance is created by the composition root and handed to
//! the orchestrator. Each mutation is a single critical section, so counters
//! stay exact under concurrent requests.

use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Counters {
    total_queries: u64,
    successful_queries: u64,
    failover_events: u64,
    average_response_time_ms: f64,
}

#[derive(Debug, Default)]
pub struct Analytics {
    counters: Mutex<Counters>,
}

/// Point-in-time analytics read
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failover_events: u64,
    pub average_response_time_ms: f64,
    pub backend_count: usize,
    pub success_rate: f64,
    pub failover_rate: f64,
}

impl Analytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self) {
        self.counters.lock().total_queries += 1;
    }

    /// Count a success and blend its latency into the running average
    pub fn record_success(&self, response_time_ms: f64) {
        let mut counters = self.counters.lock();
        counters.successful_queries += 1;
        counters.average_response_time_ms =
            (counters.average_response_time_ms + response_time_ms) / 2.0;
    }

    pub fn record_failover(&self) {
        self.counters.lock().failover_events += 1;
    }

    pub fn total_queries(&self) -> u64 {
        self.counters.lock().total_queries
    }

    pub fn snapshot(&self, backend_count: usize) -> AnalyticsSnapshot {
        let counters = *self.counters.lock();
        let ratio = |n: u64| {
            if counters.total_queries == 0 {
                0.0
            } else {
                n as f64 / counters.total_queries as f64
            }
        };

        AnalyticsSnapshot {
            total_queries: counters.total_queries,
            successful_queries: counters.successful_queries,
            failover_events: counters.failover_events,
            average_response_time_ms: counters.average_response_time_ms,
            backend_count,
            success_rate: ratio(counters.successful_queries),
            failover_rate: ratio(counters.failover_events),
        }
    }
}
