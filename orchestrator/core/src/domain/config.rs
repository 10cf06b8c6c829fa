// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Oracle Configuration Types
//
// Defines the configuration schema for an oracle orchestrator process:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Backend (provider) declarations with priority tiers
// - Orchestration timeouts and health probe cadence
// - Network, database and observability settings

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "100monkeys.ai/v1";
pub const KIND: &str = "OracleConfig";

pub const ANTHROPIC_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

/// Top-level Kubernetes-style configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfigManifest {
    /// API version (must be "100monkeys.ai/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "OracleConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: OracleConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable instance name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleConfigSpec {
    /// Backends eligible for failover, in no particular order
    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    /// Analysis persistence; in-memory when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderType {
    Anthropic,
    Openai,
    OpenaiCompatible,
}

impl ProviderType {
    /// Public API base URL, if the provider has one
    pub fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            ProviderType::Anthropic => Some("https://api.anthropic.com"),
            ProviderType::Openai => Some("https://api.openai.com/v1"),
            ProviderType::OpenaiCompatible => None,
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Anthropic => write!(f, "anthropic"),
            ProviderType::Openai => write!(f, "openai"),
            ProviderType::OpenaiCompatible => write!(f, "openai-compatible"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Unique backend name (e.g., "anthropic-claude")
    pub name: String,

    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// API base URL; provider default when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used for analysis
    pub model: String,

    /// Cheaper model used for availability probes; `model` when omitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_model: Option<String>,

    /// Static priority tier (lower is tried first)
    #[serde(default = "default_priority")]
    pub priority: u32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl BackendConfig {
    pub fn resolved_endpoint(&self) -> Option<&str> {
        self.endpoint
            .as_deref()
            .or_else(|| self.provider_type.default_endpoint())
    }

    fn from_env_key(provider_type: ProviderType) -> Self {
        let (name, key_var, model, probe_model, priority) = match provider_type {
            ProviderType::Anthropic => (
                "anthropic-claude",
                ANTHROPIC_KEY_VAR,
                "claude-3-sonnet-20240229",
                None,
                1,
            ),
            _ => (
                "openai-gpt",
                OPENAI_KEY_VAR,
                "gpt-4",
                Some("gpt-3.5-turbo".to_string()),
                2,
            ),
        };

        Self {
            name: name.to_string(),
            provider_type,
            endpoint: None,
            api_key: Some(format!("env:{}", key_var)),
            model: model.to_string(),
            probe_model,
            priority,
            enabled: true,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Per-attempt timeout in milliseconds (0 disables)
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_ms: u64,

    /// Per-probe timeout in milliseconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Background probe cadence in seconds (0 disables)
    #[serde(default = "default_probe_interval")]
    pub health_probe_interval_secs: u64,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: default_attempt_timeout(),
            probe_timeout_ms: default_probe_timeout(),
            health_probe_interval_secs: default_probe_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Per-client request limit on the `/api` routes
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests allowed per client within one window
    #[serde(default = "default_rate_limit_requests")]
    pub max_requests: u32,

    #[serde(default = "default_rate_limit_window")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_rate_limit_requests(),
            window_secs: default_rate_limit_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection string (supports "env:VAR_NAME")
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prometheus exporter port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    1
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

fn default_attempt_timeout() -> u64 {
    60_000
}

fn default_probe_timeout() -> u64 {
    10_000
}

fn default_probe_interval() -> u64 {
    300
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    3000
}

fn default_rate_limit_requests() -> u32 {
    100
}

fn default_rate_limit_window() -> u64 {
    900
}

fn default_max_connections() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for OracleConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "oracle-node".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: OracleConfigSpec::default(),
        }
    }
}

impl OracleConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Candidate config locations, in precedence order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var("ORACLE_CONFIG_PATH") {
            paths.push(PathBuf::from(path));
        }
        paths.push(PathBuf::from("./oracle-config.yaml"));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".oracle").join("config.yaml"));
        }
        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/oracle/config.yaml"));
        #[cfg(windows)]
        paths.push(PathBuf::from("C:\\ProgramData\\Oracle\\config.yaml"));
        paths
    }

    /// Discover configuration file using precedence order
    /// 1. ORACLE_CONFIG_PATH environment variable
    /// 2. ./oracle-config.yaml (working directory)
    /// 3. ~/.oracle/config.yaml (user home)
    /// 4. /etc/oracle/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|p| p.exists())
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path fails hard when missing or invalid
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply process environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// - `ANTHROPIC_API_KEY` / `OPENAI_API_KEY` add a default backend of that
    ///   type when none is configured
    /// - `ORACLE_DATABASE_URL` sets the database connection string
    /// - `ORACLE_PORT` sets the HTTP port
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let has_key = |var: &str| lookup(var).map(|v| !v.trim().is_empty()).unwrap_or(false);

        for (provider_type, var) in [
            (ProviderType::Anthropic, ANTHROPIC_KEY_VAR),
            (ProviderType::Openai, OPENAI_KEY_VAR),
        ] {
            let configured = self
                .spec
                .backends
                .iter()
                .any(|b| b.provider_type == provider_type);
            if !configured && has_key(var) {
                tracing::info!("Environment override: {} set, registering default backend", var);
                self.spec.backends.push(BackendConfig::from_env_key(provider_type));
            }
        }

        if let Some(url) = lookup("ORACLE_DATABASE_URL").filter(|u| !u.is_empty()) {
            tracing::info!("Environment override: ORACLE_DATABASE_URL");
            match self.spec.database.as_mut() {
                Some(db) => db.url = url,
                None => {
                    self.spec.database = Some(DatabaseConfig {
                        url,
                        max_connections: default_max_connections(),
                    })
                }
            }
        }

        if let Some(val) = lookup("ORACLE_PORT") {
            match val.parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: ORACLE_PORT={}", port);
                    self.spec.network.port = port;
                }
                Err(_) => {
                    tracing::warn!("Invalid value for ORACLE_PORT: '{}'. Ignoring.", val);
                }
            }
        }
    }

    /// Backends that should be registered
    pub fn enabled_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.spec.backends.iter().filter(|b| b.enabled)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut seen = HashSet::new();
        for backend in &self.spec.backends {
            if backend.name.is_empty() {
                anyhow::bail!("Backend name cannot be empty");
            }

            if !seen.insert(backend.name.as_str()) {
                anyhow::bail!("Duplicate backend name: {}", backend.name);
            }

            if backend.resolved_endpoint().map(str::is_empty).unwrap_or(true) {
                anyhow::bail!("Backend endpoint cannot be empty for: {}", backend.name);
            }

            if backend.model.is_empty() {
                anyhow::bail!("Backend model cannot be empty for: {}", backend.name);
            }

            if !(0.0..=2.0).contains(&backend.temperature) {
                anyhow::bail!(
                    "Backend temperature must be within 0.0..=2.0 for: {}",
                    backend.name
                );
            }
        }

        if self.spec.orchestration.probe_timeout_ms == 0 {
            anyhow::bail!("spec.orchestration.probe_timeout_ms must be greater than 0");
        }

        let rate_limit = &self.spec.network.rate_limit;
        if rate_limit.enabled && (rate_limit.max_requests == 0 || rate_limit.window_secs == 0) {
            anyhow::bail!("spec.network.rate_limit needs a non-zero max_requests and window_secs");
        }

        if let Some(db) = &self.spec.database {
            if db.url.is_empty() {
                anyhow::bail!("spec.database.url cannot be empty");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(name: &str, provider_type: ProviderType) -> BackendConfig {
        BackendConfig {
            name: name.to_string(),
            provider_type,
            endpoint: None,
            api_key: None,
            model: "model".to_string(),
            probe_model: None,
            priority: 1,
            enabled: true,
            max_tokens: 256,
            temperature: 0.5,
        }
    }

    #[test]
    fn test_default_manifest() {
        let manifest = OracleConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert!(!manifest.metadata.name.is_empty());
        assert!(manifest.spec.backends.is_empty());
        assert_eq!(manifest.spec.network.port, 3000);
        assert_eq!(manifest.spec.orchestration.attempt_timeout_ms, 60_000);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml_with_defaults() {
        let yaml = r#"
apiVersion: 100monkeys.ai/v1
kind: OracleConfig
metadata:
  name: test-oracle
spec:
  backends:
    - name: claude
      type: anthropic
      api_key: env:ANTHROPIC_API_KEY
      model: claude-3-sonnet-20240229
    - name: local
      type: openai-compatible
      endpoint: http://localhost:1234/v1
      model: llama3
      priority: 2
      enabled: false
  orchestration:
    attempt_timeout_ms: 15000
"#;
        let manifest = OracleConfigManifest::from_yaml_str(yaml).unwrap();
        assert!(manifest.validate().is_ok());

        let backends = &manifest.spec.backends;
        assert_eq!(backends.len(), 2);
        assert_eq!(backends[0].priority, 1);
        assert_eq!(backends[0].max_tokens, 2048);
        assert_eq!(backends[0].resolved_endpoint(), Some("https://api.anthropic.com"));
        assert_eq!(backends[1].provider_type, ProviderType::OpenaiCompatible);
        assert_eq!(manifest.enabled_backends().count(), 1);
        assert_eq!(manifest.spec.orchestration.attempt_timeout_ms, 15_000);
        assert_eq!(manifest.spec.orchestration.probe_timeout_ms, 10_000);
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oracle-config.yaml");

        let mut manifest = OracleConfigManifest::default();
        manifest.spec.backends.push(backend("claude", ProviderType::Anthropic));
        manifest.to_yaml_file(&path).unwrap();

        let loaded = OracleConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.spec.backends.len(), 1);
        assert_eq!(loaded.spec.backends[0].name, "claude");
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(OracleConfigManifest::load_or_default(Some(missing)).is_err());
    }

    #[test]
    fn test_env_keys_register_default_backends() {
        let mut manifest = OracleConfigManifest::default();
        manifest.apply_overrides_from(|key| match key {
            ANTHROPIC_KEY_VAR => Some("sk-ant".to_string()),
            OPENAI_KEY_VAR => Some("sk-oai".to_string()),
            _ => None,
        });

        let backends = &manifest.spec.backends;
        assert_eq!(backends.len(), 2);
        assert_eq!(backends[0].name, "anthropic-claude");
        assert_eq!(backends[0].priority, 1);
        assert_eq!(backends[1].name, "openai-gpt");
        assert_eq!(backends[1].priority, 2);
        assert_eq!(backends[1].probe_model.as_deref(), Some("gpt-3.5-turbo"));
    }

    #[test]
    fn test_env_keys_do_not_duplicate_configured_type() {
        let mut manifest = OracleConfigManifest::default();
        manifest.spec.backends.push(backend("my-claude", ProviderType::Anthropic));
        manifest.apply_overrides_from(|key| match key {
            ANTHROPIC_KEY_VAR => Some("sk-ant".to_string()),
            OPENAI_KEY_VAR => Some("   ".to_string()),
            _ => None,
        });
        assert_eq!(manifest.spec.backends.len(), 1);
        assert_eq!(manifest.spec.backends[0].name, "my-claude");
    }

    #[test]
    fn test_database_and_port_overrides() {
        let mut manifest = OracleConfigManifest::default();
        manifest.apply_overrides_from(|key| match key {
            "ORACLE_DATABASE_URL" => Some("postgres://localhost/oracle".to_string()),
            "ORACLE_PORT" => Some("8081".to_string()),
            _ => None,
        });
        assert_eq!(
            manifest.spec.database.as_ref().map(|d| d.url.as_str()),
            Some("postgres://localhost/oracle")
        );
        assert_eq!(manifest.spec.network.port, 8081);

        manifest.apply_overrides_from(|key| match key {
            "ORACLE_PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(manifest.spec.network.port, 8081);
    }

    #[test]
    fn test_validation() {
        let mut manifest = OracleConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "WrongKind".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.backends.push(backend("dup", ProviderType::Openai));
        manifest.spec.backends.push(backend("dup", ProviderType::Anthropic));
        assert!(manifest.validate().is_err());
        manifest.spec.backends.pop();
        assert!(manifest.validate().is_ok());

        // openai-compatible has no default endpoint
        manifest.spec.backends.push(backend("local", ProviderType::OpenaiCompatible));
        assert!(manifest.validate().is_err());
        manifest.spec.backends.pop();

        let mut hot = backend("hot", ProviderType::Openai);
        hot.temperature = 3.5;
        manifest.spec.backends.push(hot);
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_probe_timeout_and_rate_limit() {
        let mut manifest = OracleConfigManifest::default();
        manifest.spec.orchestration.probe_timeout_ms = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.orchestration.probe_timeout_ms = 500;

        manifest.spec.network.rate_limit.max_requests = 0;
        assert!(manifest.validate().is_err());

        // A disabled limiter is not checked
        manifest.spec.network.rate_limit.enabled = false;
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_rate_limit_defaults() {
        let manifest = OracleConfigManifest::default();
        let rate_limit = &manifest.spec.network.rate_limit;
        assert!(rate_limit.enabled);
        assert_eq!(rate_limit.max_requests, 100);
        assert_eq!(rate_limit.window_secs, 900);
    }
}
