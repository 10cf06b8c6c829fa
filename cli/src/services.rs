// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process service graph
//!
//! Builds the registry, event bus, repository and application services from a
//! loaded configuration. Shared by `oracle serve` and the one-shot commands.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use oracle_core::{
    application::{
        health_prober::HealthProber, orchestrator::AnalysisOrchestrator,
        outcome_persister::OutcomePersister,
    },
    domain::{
        analytics::Analytics, config::OracleConfigManifest, registry::BackendRegistry,
        repository::AnalysisRepository,
    },
    infrastructure::{
        db::Database,
        event_bus::EventBus,
        llm::build_registry,
        repositories::{InMemoryAnalysisRepository, PostgresAnalysisRepository},
    },
};

pub struct Services {
    pub config: OracleConfigManifest,
    pub registry: Arc<BackendRegistry>,
    pub event_bus: Arc<EventBus>,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    pub prober: Arc<HealthProber>,
    pub repository: Arc<dyn AnalysisRepository>,
}

impl Services {
    /// Discover, validate and wire the configuration at `config_path`
    pub async fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config = OracleConfigManifest::load_or_default(config_path)
            .context("Failed to load configuration")?;
        config
            .validate()
            .context("Configuration validation failed")?;
        Self::from_config(config).await
    }

    pub async fn from_config(config: OracleConfigManifest) -> Result<Self> {
        info!("Configuration loaded: name={}", config.metadata.name);

        let registry = Arc::new(
            build_registry(&config).context("Failed to initialize oracle backends")?,
        );
        let event_bus = Arc::new(EventBus::with_default_capacity());
        let repository = Self::repository(&config).await?;

        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            registry.clone(),
            Arc::new(Analytics::new()),
            event_bus.clone(),
        ));
        let prober = Arc::new(HealthProber::new(
            registry.clone(),
            event_bus.clone(),
            Duration::from_millis(config.spec.orchestration.probe_timeout_ms),
        ));

        Ok(Self {
            config,
            registry,
            event_bus,
            orchestrator,
            prober,
            repository,
        })
    }

    async fn repository(config: &OracleConfigManifest) -> Result<Arc<dyn AnalysisRepository>> {
        match &config.spec.database {
            Some(db_config) => {
                let database = Database::from_config(db_config).await?;
                let repository = PostgresAnalysisRepository::new(database.get_pool().clone());
                repository
                    .initialize()
                    .await
                    .context("Failed to initialize analysis tables")?;
                info!("Using PostgreSQL analysis repository");
                Ok(Arc::new(repository))
            }
            None => {
                info!("No database configured, analyses are kept in memory");
                Ok(Arc::new(InMemoryAnalysisRepository::new()))
            }
        }
    }

    /// Spawn the outcome persister against this graph's bus and repository
    pub fn start_persister(&self) -> JoinHandle<()> {
        Arc::new(OutcomePersister::new(self.repository.clone(), self.event_bus.clone())).start()
    }

    /// Drop the service graph and wait until queued attempts are stored
    pub async fn drain(self, persister: JoinHandle<()>) {
        // Dropping the graph closes the event bus, which ends the persister
        drop(self);
        if let Err(e) = persister.await {
            error!("Outcome persister task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_core::domain::analysis::{AnalysisRequest, Depth, Protocol};
    use oracle_core::domain::config::{BackendConfig, ProviderType};

    #[tokio::test]
    async fn test_drain_persists_failed_attempts() {
        let mut config = OracleConfigManifest::default();
        config.spec.backends.push(BackendConfig {
            name: "unreachable".to_string(),
            provider_type: ProviderType::OpenaiCompatible,
            endpoint: Some("http://127.0.0.1:9".to_string()),
            api_key: None,
            model: "local-model".to_string(),
            probe_model: None,
            priority: 1,
            enabled: true,
            max_tokens: 64,
            temperature: 0.5,
        });

        let services = Services::from_config(config).await.unwrap();
        let repository = services.repository.clone();
        let persister = services.start_persister();

        let request = AnalysisRequest::new(
            "A staircase that folds into itself.",
            Protocol::Linear,
            Depth::new(1).unwrap(),
        );
        assert!(services.orchestrator.analyze(&request).await.is_err());

        services.drain(persister).await;

        let metrics = repository.backend_metrics("unreachable", 10).await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert!(!metrics[0].success);
        assert!(metrics[0].error_message.is_some());
    }
}
