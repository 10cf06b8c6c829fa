// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype that is
//! injected into `PostgresAnalysisRepository`. Only used when
//! `spec.database` is configured; otherwise analyses stay in memory.

use crate::domain::config::DatabaseConfig;
use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool })
    }

    /// Connect using a config entry; `env:VAR` urls are resolved first
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let url = match config.url.strip_prefix("env:") {
            Some(var) => std::env::var(var)
                .with_context(|| format!("Database url variable {} is not set", var))?,
            None => config.url.clone(),
        };
        Self::new(&url, config.max_connections).await
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}
