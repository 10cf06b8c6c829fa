// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::analysis::Protocol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Correlates every event emitted while serving one `analyze` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnalysisEvent {
    AnalysisStarted {
        request_id: RequestId,
        protocol: Protocol,
        depth: u8,
        candidates: Vec<String>,
        started_at: DateTime<Utc>,
    },
    BackendAttempted {
        request_id: RequestId,
        backend: String,
        attempt: usize,
        success: bool,
        response_time_ms: u64,
        protocol: Protocol,
        confidence: Option<f64>,
        error: Option<String>,
        attempted_at: DateTime<Utc>,
    },
    AnalysisCompleted {
        request_id: RequestId,
        backend: String,
        attempts: usize,
        total_time_ms: u64,
        completed_at: DateTime<Utc>,
    },
    AnalysisFailed {
        request_id: RequestId,
        attempts: usize,
        last_error: String,
        failed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HealthEvent {
    ProbeCompleted {
        results: HashMap<String, bool>,
        failover_order: Vec<String>,
        probed_at: DateTime<Utc>,
    },
}
