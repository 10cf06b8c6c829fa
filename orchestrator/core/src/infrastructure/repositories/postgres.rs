// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL implementation of AnalysisRepository
//!
//! Tables are created on first use with `CREATE TABLE IF NOT EXISTS`.

use crate::domain::analysis::Protocol;
use crate::domain::repository::{AnalysisId, AnalysisRepository, BackendMetric, RepositoryError, StoredAnalysis};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

const CREATE_ANALYSES: &str = r#"
CREATE TABLE IF NOT EXISTS consciousness_analyses (
    id UUID PRIMARY KEY,
    signal TEXT NOT NULL,
    protocol VARCHAR(50) NOT NULL,
    depth_level INTEGER NOT NULL,
    analysis_result TEXT NOT NULL,
    oracle_used VARCHAR(100) NOT NULL,
    processing_time_ms BIGINT NOT NULL,
    confidence_score DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_METRICS: &str = r#"
CREATE TABLE IF NOT EXISTS oracle_metrics (
    id BIGSERIAL PRIMARY KEY,
    oracle_name VARCHAR(100) NOT NULL,
    response_time_ms BIGINT NOT NULL,
    success BOOLEAN NOT NULL,
    error_message TEXT,
    protocol_used VARCHAR(50) NOT NULL,
    confidence_score DOUBLE PRECISION,
    query_timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

pub struct PostgresAnalysisRepository {
    pool: PgPool,
}

impl PostgresAnalysisRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables if they do not exist yet
    pub async fn initialize(&self) -> Result<(), RepositoryError> {
        sqlx::query(CREATE_ANALYSES).execute(&self.pool).await?;
        sqlx::query(CREATE_METRICS).execute(&self.pool).await?;
        info!("Analysis tables initialized");
        Ok(())
    }

    fn parse_protocol(raw: &str) -> Result<Protocol, RepositoryError> {
        raw.parse()
            .map_err(|e| RepositoryError::Serialization(format!("Invalid protocol '{}': {}", raw, e)))
    }

    fn deserialize_analysis(row: &sqlx::postgres::PgRow) -> Result<StoredAnalysis, RepositoryError> {
        let id: Uuid = row.try_get("id")?;
        let protocol: String = row.try_get("protocol")?;
        let depth: i32 = row.try_get("depth_level")?;
        let processing_time_ms: i64 = row.try_get("processing_time_ms")?;

        Ok(StoredAnalysis {
            id: AnalysisId(id),
            signal: row.try_get("signal")?,
            protocol: Self::parse_protocol(&protocol)?,
            depth: u8::try_from(depth)
                .map_err(|_| RepositoryError::Serialization(format!("Invalid depth_level: {}", depth)))?,
            content: row.try_get("analysis_result")?,
            backend: row.try_get("oracle_used")?,
            processing_time_ms: processing_time_ms.max(0) as u64,
            confidence: row.try_get("confidence_score")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn deserialize_metric(row: &sqlx::postgres::PgRow) -> Result<BackendMetric, RepositoryError> {
        let protocol: String = row.try_get("protocol_used")?;
        let response_time_ms: i64 = row.try_get("response_time_ms")?;
        let recorded_at: DateTime<Utc> = row.try_get("query_timestamp")?;

        Ok(BackendMetric {
            backend: row.try_get("oracle_name")?,
            response_time_ms: response_time_ms.max(0) as u64,
            success: row.try_get("success")?,
            error_message: row.try_get("error_message")?,
            protocol: Self::parse_protocol(&protocol)?,
            confidence: row.try_get("confidence_score")?,
            recorded_at,
        })
    }
}

#[async_trait]
impl AnalysisRepository for PostgresAnalysisRepository {
    async fn save_analysis(&self, analysis: &StoredAnalysis) -> Result<(), RepositoryError> {
        debug!(id = %analysis.id.0, backend = %analysis.backend, "Saving analysis");
        sqlx::query(
            r#"
            INSERT INTO consciousness_analyses (
                id, signal, protocol, depth_level, analysis_result,
                oracle_used, processing_time_ms, confidence_score, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                analysis_result = EXCLUDED.analysis_result,
                oracle_used = EXCLUDED.oracle_used,
                processing_time_ms = EXCLUDED.processing_time_ms,
                confidence_score = EXCLUDED.confidence_score
            "#,
        )
        .bind(analysis.id.0)
        .bind(&analysis.signal)
        .bind(analysis.protocol.as_str())
        .bind(i32::from(analysis.depth))
        .bind(&analysis.content)
        .bind(&analysis.backend)
        .bind(analysis.processing_time_ms as i64)
        .bind(analysis.confidence)
        .bind(analysis.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_analysis(&self, id: AnalysisId) -> Result<Option<StoredAnalysis>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM consciousness_analyses WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::deserialize_analysis).transpose()
    }

    async fn history(&self, limit: usize) -> Result<Vec<StoredAnalysis>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM consciousness_analyses ORDER BY created_at DESC LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::deserialize_analysis).collect()
    }

    async fn record_backend_metric(&self, metric: &BackendMetric) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO oracle_metrics (
                oracle_name, response_time_ms, success, error_message,
                protocol_used, confidence_score, query_timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&metric.backend)
        .bind(metric.response_time_ms as i64)
        .bind(metric.success)
        .bind(&metric.error_message)
        .bind(metric.protocol.as_str())
        .bind(metric.confidence)
        .bind(metric.recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn backend_metrics(&self, backend: &str, limit: usize) -> Result<Vec<BackendMetric>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM oracle_metrics WHERE oracle_name = $1 ORDER BY query_timestamp DESC, id DESC LIMIT $2",
        )
        .bind(backend)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::deserialize_metric).collect()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
