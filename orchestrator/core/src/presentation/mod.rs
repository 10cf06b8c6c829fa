// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`oracle-orchestrator-core`)
//!
//! HTTP surface that translates external requests into application service
//! calls. No business logic lives here.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Analysis, history, oracle status, health check and analytics endpoints |
//! | [`rate_limit`] | HTTP middleware | Per-client request quota on the `/api` routes |

pub mod api;
pub mod rate_limit;
