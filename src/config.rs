//! Configuration
//!
//! One JSON document (camelCase, every section optional) plus credentials from the
//! environment. `.env` files are honored through dotenvy.

use crate::ai::naming::{EscalationPolicy, NamingConfig};
use crate::ai::providers::{
    builtin_providers, ModelInfo, PriorityError, PriorityTable, ProviderConfig, ProviderRegistry,
    RetryPolicy, TaskType,
};
use crate::queue::QueueConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Env var naming an optional config file
pub const CONFIG_PATH_ENV: &str = "SENTINEL_NAMER_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Priority(#[from] PriorityError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Override of (or addition to) the built-in provider catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOverride {
    pub provider_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Replaces the provider's model list
    #[serde(default)]
    pub models: Option<Vec<ModelInfo>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityRef {
    pub provider_id: String,
    pub model_id: String,
}

/// Per-task model order; rank is the position in the list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriorityConfig {
    pub chat: Option<Vec<PriorityRef>>,
    pub vision: Option<Vec<PriorityRef>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamerConfig {
    pub retry: RetryPolicy,
    pub escalation: EscalationPolicy,
    pub naming: NamingConfig,
    pub queue: QueueConfig,
    pub providers: Vec<ProviderOverride>,
    pub priorities: PriorityConfig,
    pub request_timeout_secs: u64,
}

impl Default for NamerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            escalation: EscalationPolicy::default(),
            naming: NamingConfig::default(),
            queue: QueueConfig::default(),
            providers: Vec::new(),
            priorities: PriorityConfig::default(),
            request_timeout_secs: crate::ai::http_client::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl NamerConfig {
    /// Read and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load `.env` (current dir, then parent), then the file named by
    /// `SENTINEL_NAMER_CONFIG` if set, else defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();

        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim())),
            _ => {
                debug!("No config file configured, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "requestTimeoutSecs must be positive".to_string(),
            ));
        }
        if self.naming.max_name_length == 0 {
            return Err(ConfigError::Invalid(
                "naming.maxNameLength must be positive".to_string(),
            ));
        }
        let sep = self.naming.separator;
        if sep.is_whitespace()
            || sep.is_control()
            || matches!(sep, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '.')
        {
            return Err(ConfigError::Invalid(format!(
                "naming.separator {:?} is not allowed in file names",
                sep
            )));
        }
        if self.queue.baseline_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "queue.baselineConcurrency must be positive".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid(
                "retry.baseDelayMs exceeds retry.maxDelayMs".to_string(),
            ));
        }
        for over in &self.providers {
            if over.provider_id.trim().is_empty() {
                return Err(ConfigError::Invalid("provider override without providerId".to_string()));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Built-in catalog with overrides applied and credentials read from the environment
    pub fn build_registry(&self) -> Result<ProviderRegistry, ConfigError> {
        let mut providers = builtin_providers();

        for over in &self.providers {
            match providers
                .iter()
                .position(|p| p.provider_id == over.provider_id)
            {
                Some(idx) => apply_override(&mut providers[idx], over),
                None => {
                    let base_url = over.base_url.clone().ok_or_else(|| {
                        ConfigError::Invalid(format!(
                            "provider {} is not built in and has no baseUrl",
                            over.provider_id
                        ))
                    })?;
                    providers.push(ProviderConfig {
                        provider_id: over.provider_id.clone(),
                        display_name: over
                            .display_name
                            .clone()
                            .unwrap_or_else(|| over.provider_id.clone()),
                        base_url,
                        credential: None,
                        api_key_env: over.api_key_env.clone(),
                        models: over.models.clone().unwrap_or_default(),
                    });
                }
            }
        }

        let registry = ProviderRegistry::new(providers);
        let loaded = registry.load_env_credentials();
        info!(
            providers = registry.providers().len(),
            credentials = loaded,
            "Provider registry ready"
        );
        Ok(registry)
    }

    /// Default priorities, replaced per task type by any configured order. Every
    /// configured entry must name a model the registry offers for that task.
    pub fn build_priority_table(
        &self,
        registry: &ProviderRegistry,
    ) -> Result<PriorityTable, ConfigError> {
        let table = PriorityTable::builtin_defaults();

        for (task, refs) in [
            (TaskType::Chat, &self.priorities.chat),
            (TaskType::Vision, &self.priorities.vision),
        ] {
            let Some(refs) = refs else {
                continue;
            };
            for r in refs {
                if registry.model(&r.provider_id, &r.model_id, task).is_some() {
                    continue;
                }
                let offered = registry
                    .provider(&r.provider_id)
                    .is_some_and(|p| p.models.iter().any(|m| m.model_id == r.model_id));
                return Err(ConfigError::Invalid(if offered {
                    format!("{}/{} is not a {} model", r.provider_id, r.model_id, task)
                } else {
                    format!(
                        "unknown model {}/{} in {} priorities",
                        r.provider_id, r.model_id, task
                    )
                }));
            }
            let order: Vec<(&str, &str)> = refs
                .iter()
                .map(|r| (r.provider_id.as_str(), r.model_id.as_str()))
                .collect();
            table.set_order(task, &order)?;
        }

        Ok(table)
    }
}

/// Load `.env` from the current directory, falling back to the parent directory
pub fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path("../.env");
    }
}

fn apply_override(provider: &mut ProviderConfig, over: &ProviderOverride) {
    if let Some(name) = &over.display_name {
        provider.display_name = name.clone();
    }
    if let Some(url) = &over.base_url {
        provider.base_url = url.clone();
    }
    if let Some(env) = &over.api_key_env {
        provider.api_key_env = Some(env.clone());
    }
    if let Some(models) = &over.models {
        provider.models = models.clone();
    }
}
