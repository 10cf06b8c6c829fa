// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! Use-case services coordinating domain objects and infrastructure.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Failover orchestration, health probing, outcome persistence

pub mod health_prober;
pub mod orchestrator;
pub mod outcome_persister;
