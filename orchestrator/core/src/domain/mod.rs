// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Pure types, traits and invariants of the oracle orchestrator.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Backend health, ranking, analytics and request/result value objects

pub mod analysis;
pub mod analytics;
pub mod backend;
pub mod config;
pub mod events;
pub mod llm;
pub mod registry;
pub mod repository;
