//! Provider registry
//!
//! Static catalog of OpenAI-compatible inference providers and the models they expose
//! per task type. Provider definitions are fixed for the lifetime of a run; credentials
//! live in a concurrent map so they can be rotated while workers are calling out.

use super::types::TaskType;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A model offered by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub model_id: String,
    pub task_type: TaskType,
    pub display_label: String,
}

impl ModelInfo {
    pub fn new(model_id: &str, task_type: TaskType, display_label: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            task_type,
            display_label: display_label.to_string(),
        }
    }
}

/// Identity, endpoint and model catalog of one provider
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub provider_id: String,
    pub display_name: String,
    /// OpenAI-compatible base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Initial credential. Moved into the registry's credential map on construction.
    #[serde(default, skip_serializing)]
    pub credential: Option<String>,
    /// Environment variable the credential is read from
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

// Manual impl keeps credentials out of logs
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider_id", &self.provider_id)
            .field("display_name", &self.display_name)
            .field("base_url", &self.base_url)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("models", &self.models)
            .finish()
    }
}

impl ProviderConfig {
    pub fn supports(&self, task: TaskType) -> bool {
        self.models.iter().any(|m| m.task_type == task)
    }
}

/// Registry of all known providers plus their current credentials
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
    credentials: DashMap<String, String>,
}

impl ProviderRegistry {
    /// Build a registry. Credentials present on the configs are moved into the
    /// credential map; the stored configs never carry them.
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        let credentials = DashMap::new();
        let providers = providers
            .into_iter()
            .map(|mut p| {
                if let Some(key) = p.credential.take().filter(|k| !k.trim().is_empty()) {
                    credentials.insert(p.provider_id.clone(), key);
                }
                p
            })
            .collect();

        Self {
            providers,
            credentials,
        }
    }

    /// Registry populated with the built-in provider catalog and no credentials
    pub fn builtin() -> Self {
        Self::new(builtin_providers())
    }

    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    pub fn provider(&self, provider_id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.provider_id == provider_id)
    }

    /// Insert or replace a provider definition
    pub fn upsert_provider(&mut self, mut config: ProviderConfig) {
        if let Some(key) = config.credential.take().filter(|k| !k.trim().is_empty()) {
            self.credentials.insert(config.provider_id.clone(), key);
        }
        match self
            .providers
            .iter_mut()
            .find(|p| p.provider_id == config.provider_id)
        {
            Some(existing) => *existing = config,
            None => self.providers.push(config),
        }
    }

    /// Set (or, with an empty key, clear) a provider credential.
    ///
    /// Returns `false` if the provider is unknown.
    pub fn set_credential(&self, provider_id: &str, api_key: &str) -> bool {
        if self.provider(provider_id).is_none() {
            return false;
        }
        if api_key.trim().is_empty() {
            self.credentials.remove(provider_id);
        } else {
            self.credentials
                .insert(provider_id.to_string(), api_key.trim().to_string());
        }
        true
    }

    pub fn clear_credential(&self, provider_id: &str) {
        self.credentials.remove(provider_id);
    }

    pub fn credential(&self, provider_id: &str) -> Option<String> {
        self.credentials.get(provider_id).map(|v| v.value().clone())
    }

    pub fn is_configured(&self, provider_id: &str) -> bool {
        self.credentials.contains_key(provider_id)
    }

    /// Provider ids that currently have a credential, in catalog order
    pub fn configured_providers(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|p| self.is_configured(&p.provider_id))
            .map(|p| p.provider_id.as_str())
            .collect()
    }

    /// A model as offered for one task; the same id may serve both chat and vision
    pub fn model(&self, provider_id: &str, model_id: &str, task: TaskType) -> Option<&ModelInfo> {
        self.provider(provider_id)?
            .models
            .iter()
            .find(|m| m.model_id == model_id && m.task_type == task)
    }

    /// All (provider, model) pairs serving a task type
    pub fn models_for(&self, task: TaskType) -> Vec<(&str, &ModelInfo)> {
        self.providers
            .iter()
            .flat_map(|p| {
                p.models
                    .iter()
                    .filter(move |m| m.task_type == task)
                    .map(move |m| (p.provider_id.as_str(), m))
            })
            .collect()
    }

    /// Load credentials from each provider's `api_key_env` variable.
    ///
    /// Returns the number of providers that received a credential.
    pub fn load_env_credentials(&self) -> usize {
        let mut loaded = 0;
        for provider in &self.providers {
            let Some(var) = provider.api_key_env.as_deref() else {
                continue;
            };
            let Ok(key) = std::env::var(var) else {
                continue;
            };
            if key.trim().is_empty() {
                continue;
            }
            if self.set_credential(&provider.provider_id, &key) {
                tracing::debug!(provider = %provider.provider_id, "Loaded credential from {}", var);
                loaded += 1;
            }
        }
        loaded
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn provider(
    provider_id: &str,
    display_name: &str,
    base_url: &str,
    api_key_env: &str,
    models: Vec<ModelInfo>,
) -> ProviderConfig {
    ProviderConfig {
        provider_id: provider_id.to_string(),
        display_name: display_name.to_string(),
        base_url: base_url.to_string(),
        credential: None,
        api_key_env: Some(api_key_env.to_string()),
        models,
    }
}

/// Built-in catalog. Every entry speaks the OpenAI chat-completions protocol.
pub fn builtin_providers() -> Vec<ProviderConfig> {
    use TaskType::{Chat, Vision};

    vec![
        provider(
            "openai",
            "OpenAI",
            "https://api.openai.com/v1",
            "OPENAI_API_KEY",
            vec![
                ModelInfo::new("gpt-4o-mini", Chat, "GPT-4o mini"),
                ModelInfo::new("gpt-4o", Vision, "GPT-4o"),
                ModelInfo::new("gpt-4o-mini", Vision, "GPT-4o mini (vision)"),
            ],
        ),
        provider(
            "xai",
            "xAI Grok",
            "https://api.x.ai/v1",
            "XAI_API_KEY",
            vec![
                ModelInfo::new("grok-4-1-fast", Chat, "Grok 4.1 Fast"),
                ModelInfo::new("grok-2-vision-1212", Vision, "Grok 2 Vision"),
            ],
        ),
        provider(
            "deepseek",
            "DeepSeek",
            "https://api.deepseek.com/v1",
            "DEEPSEEK_API_KEY",
            vec![ModelInfo::new("deepseek-chat", Chat, "DeepSeek V3")],
        ),
        provider(
            "qwen",
            "Qwen (DashScope)",
            "https://dashscope.aliyuncs.com/compatible-mode/v1",
            "DASHSCOPE_API_KEY",
            vec![
                ModelInfo::new("qwen-plus", Chat, "Qwen Plus"),
                ModelInfo::new("qwen-vl-plus", Vision, "Qwen VL Plus"),
            ],
        ),
        provider(
            "zhipu",
            "Zhipu GLM",
            "https://open.bigmodel.cn/api/paas/v4",
            "ZHIPU_API_KEY",
            vec![
                ModelInfo::new("glm-4-flash", Chat, "GLM-4 Flash"),
                ModelInfo::new("glm-4v-flash", Vision, "GLM-4V Flash"),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_no_credentials() {
        let registry = ProviderRegistry::builtin();
        assert!(!registry.providers().is_empty());
        assert!(registry.configured_providers().is_empty());
    }

    #[test]
    fn test_set_and_clear_credential() {
        let registry = ProviderRegistry::builtin();
        assert!(registry.set_credential("openai", "  sk-test  "));
        assert!(registry.is_configured("openai"));
        assert_eq!(registry.credential("openai").as_deref(), Some("sk-test"));

        assert!(registry.set_credential("openai", ""));
        assert!(!registry.is_configured("openai"));

        assert!(!registry.set_credential("nope", "key"));
    }

    #[test]
    fn test_credentials_moved_out_of_config() {
        let mut configs = builtin_providers();
        configs[0].credential = Some("sk-inline".to_string());
        let registry = ProviderRegistry::new(configs);

        assert!(registry.is_configured("openai"));
        assert!(registry.provider("openai").unwrap().credential.is_none());
    }

    #[test]
    fn test_debug_redacts_credential() {
        let mut config = builtin_providers().remove(0);
        config.credential = Some("sk-secret".to_string());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_models_for_task() {
        let registry = ProviderRegistry::builtin();
        let vision = registry.models_for(TaskType::Vision);
        assert!(vision.iter().all(|(_, m)| m.task_type == TaskType::Vision));
        assert!(vision.iter().any(|(p, _)| *p == "qwen"));
        assert!(!vision.iter().any(|(p, _)| *p == "deepseek"));
    }

    #[test]
    fn test_model_lookup_is_per_task() {
        let registry = ProviderRegistry::builtin();
        let chat = registry.model("openai", "gpt-4o-mini", TaskType::Chat).unwrap();
        let vision = registry.model("openai", "gpt-4o-mini", TaskType::Vision).unwrap();
        assert_eq!(chat.task_type, TaskType::Chat);
        assert_eq!(vision.task_type, TaskType::Vision);
        assert!(registry.model("deepseek", "deepseek-chat", TaskType::Vision).is_none());
    }

    #[test]
    fn test_upsert_provider_replaces() {
        let mut registry = ProviderRegistry::builtin();
        let mut custom = builtin_providers().remove(0);
        custom.base_url = "http://localhost:8080/v1".to_string();
        custom.credential = Some("local".to_string());
        registry.upsert_provider(custom);

        assert_eq!(
            registry.provider("openai").unwrap().base_url,
            "http://localhost:8080/v1"
        );
        assert!(registry.is_configured("openai"));
    }
}
