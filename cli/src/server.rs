// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Analysis server process

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{lookup_host, TcpListener};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use metrics_exporter_prometheus::PrometheusBuilder;
use oracle_core::presentation::api::{app, AppState};
use oracle_core::presentation::rate_limit::ApiRateLimiter;

use crate::services::Services;

/// Bind overrides from the command line
#[derive(Debug, Default, Clone)]
pub struct ServeOptions {
    pub host: Option<String>,
    pub port: Option<u16>,
}

pub async fn start_server(services: Services, options: ServeOptions) -> Result<()> {
    let network = &services.config.spec.network;
    let host = options.host.unwrap_or_else(|| network.bind_address.clone());
    let port = options.port.unwrap_or(network.port);

    if let Some(metrics) = services
        .config
        .spec
        .observability
        .as_ref()
        .and_then(|o| o.metrics.as_ref())
        .filter(|m| m.enabled)
    {
        let addr = lookup_host((host.as_str(), metrics.port))
            .await
            .with_context(|| format!("Invalid metrics address {}:{}", host, metrics.port))?
            .next()
            .with_context(|| format!("No address found for {}", host))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics exposed on {}", addr);
    }

    if !services.registry.is_empty() {
        info!(
            backends = services.registry.len(),
            order = ?services.registry.failover_order(),
            "Oracle backends registered"
        );
    }

    let persister = services.start_persister();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval_secs = services.config.spec.orchestration.health_probe_interval_secs;
    let prober_task = if interval_secs > 0 {
        Some(
            services
                .prober
                .clone()
                .start(Duration::from_secs(interval_secs), shutdown_rx),
        )
    } else {
        info!("Background health probing disabled");
        None
    };

    let rate_limiter = ApiRateLimiter::from_config(&network.rate_limit).map(Arc::new);
    if rate_limiter.is_none() {
        info!("API rate limiting disabled");
    }

    let router = app(AppState {
        orchestrator: services.orchestrator.clone(),
        prober: services.prober.clone(),
        repository: services.repository.clone(),
        rate_limiter,
        start_time: Instant::now(),
    });

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Oracle orchestrator listening on {}", addr);

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server shutting down");

    let _ = shutdown_tx.send(true);
    if let Some(task) = prober_task {
        if let Err(e) = task.await {
            error!("Health prober task failed: {}", e);
        }
    }

    services.drain(persister).await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
