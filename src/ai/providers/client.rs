//! Multi-provider client
//!
//! Walks the priority table for a task type, skipping providers without a credential.
//! Each entry gets up to `max_retries` attempts with exponential backoff, but only
//! rate-limit and timeout failures are retried in place. Server, auth, bad-request and
//! unknown failures move straight to the next entry: a provider that is structurally
//! failing should not eat the retry budget.

use super::error::{ErrorClass, InferenceError};
use super::priority::PriorityTable;
use super::registry::ProviderRegistry;
use super::transport::InferenceTransport;
use super::types::{InferenceRequest, InferenceResult, TaskType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Per-entry retry budget and backoff curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Attempts per priority entry (including the first)
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 2000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after the given (1-based) failed attempt: `base * 2^(attempt-1)`, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// One failed attempt, kept for diagnostics and escalation decisions
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub provider_id: String,
    pub model_id: String,
    /// 1-based attempt number within the entry
    pub attempt: u32,
    pub class: ErrorClass,
    pub message: String,
}

/// Every configured entry was tried and none succeeded
#[derive(Debug, Clone, Error, PartialEq)]
#[error("all {task} providers failed after {} attempts; last error: {last_error}", .attempts.len())]
pub struct AggregateFailure {
    pub task: TaskType,
    pub last_error: InferenceError,
    pub attempts: Vec<AttemptRecord>,
}

impl AggregateFailure {
    pub fn class(&self) -> ErrorClass {
        self.last_error.class
    }

    /// How many of the most recent attempts share the final error class
    pub fn trailing_same_class(&self) -> u32 {
        let class = self.class();
        self.attempts
            .iter()
            .rev()
            .take_while(|a| a.class == class)
            .count() as u32
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CallError {
    #[error("no provider with a credential is configured for {0} tasks")]
    NoProviderConfigured(TaskType),
    #[error(transparent)]
    Exhausted(#[from] AggregateFailure),
}

impl CallError {
    /// Class of the final failure; `None` when nothing was attempted
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            Self::NoProviderConfigured(_) => None,
            Self::Exhausted(failure) => Some(failure.class()),
        }
    }
}

/// Failover client over the ranked (provider, model) entries
pub struct MultiProviderClient {
    registry: Arc<ProviderRegistry>,
    priorities: Arc<PriorityTable>,
    transport: Arc<dyn InferenceTransport>,
    policy: RetryPolicy,
}

impl MultiProviderClient {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        priorities: Arc<PriorityTable>,
        transport: Arc<dyn InferenceTransport>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            priorities,
            transport,
            policy,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn priorities(&self) -> &PriorityTable {
        &self.priorities
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Whether at least one entry for the task has a credential
    pub fn has_provider(&self, task: TaskType) -> bool {
        self.priorities
            .entries(task)
            .iter()
            .any(|e| {
                self.registry.provider(&e.provider_id).is_some()
                    && self.registry.is_configured(&e.provider_id)
            })
    }

    /// Run the request against the ranked entries until one succeeds
    pub async fn call(
        &self,
        task: TaskType,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, CallError> {
        let candidates: Vec<_> = self
            .priorities
            .entries(task)
            .into_iter()
            .filter_map(|entry| {
                let provider = self.registry.provider(&entry.provider_id)?;
                let credential = self.registry.credential(&entry.provider_id)?;
                Some((entry, provider, credential))
            })
            .collect();

        if candidates.is_empty() {
            warn!(task = %task, "[MultiProviderClient] No configured provider");
            return Err(CallError::NoProviderConfigured(task));
        }

        let max_attempts = self.policy.attempts();
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut last_error: Option<InferenceError> = None;

        for (entry, provider, credential) in candidates {
            for attempt in 1..=max_attempts {
                debug!(
                    provider = %entry.provider_id,
                    model = %entry.model_id,
                    attempt,
                    "[MultiProviderClient] Sending {} request",
                    task
                );

                match self
                    .transport
                    .send(provider, &credential, &entry.model_id, request)
                    .await
                {
                    Ok(mut result) => {
                        result.provider_id = entry.provider_id.clone();
                        result.model_id = entry.model_id.clone();
                        if !attempts.is_empty() {
                            info!(
                                provider = %entry.provider_id,
                                model = %entry.model_id,
                                failed_attempts = attempts.len(),
                                "[MultiProviderClient] Recovered after failover"
                            );
                        }
                        return Ok(result);
                    }
                    Err(err) => {
                        warn!(
                            provider = %entry.provider_id,
                            model = %entry.model_id,
                            attempt,
                            class = %err.class,
                            "[MultiProviderClient] Attempt failed: {}",
                            err.message
                        );
                        attempts.push(AttemptRecord {
                            provider_id: entry.provider_id.clone(),
                            model_id: entry.model_id.clone(),
                            attempt,
                            class: err.class,
                            message: err.message.clone(),
                        });

                        let retry_here = err.class.is_retryable() && attempt < max_attempts;
                        last_error = Some(err);
                        if !retry_here {
                            break;
                        }
                        tokio::time::sleep(self.policy.backoff(attempt)).await;
                    }
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| {
            InferenceError::new(ErrorClass::Unknown, "no attempt was made")
        });
        warn!(
            task = %task,
            attempts = attempts.len(),
            class = %last_error.class,
            "[MultiProviderClient] All providers exhausted"
        );

        Err(AggregateFailure {
            task,
            last_error,
            attempts,
        }
        .into())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport shared by the client, orchestrator and batch tests

    use super::*;
    use crate::ai::providers::registry::{ProviderConfig, ProviderRegistry};
    use crate::ai::providers::priority::{PriorityEntry, PriorityTable};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Per-model queue of scripted replies. An exhausted script repeats its last reply;
    /// an unscripted model fails with `Unknown`.
    #[derive(Default)]
    pub struct ScriptedTransport {
        scripts: Mutex<HashMap<String, VecDeque<Result<String, ErrorClass>>>>,
        last: Mutex<HashMap<String, Result<String, ErrorClass>>>,
        pub calls: Mutex<Vec<(String, String, TaskType)>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(self, model_id: &str, replies: Vec<Result<&str, ErrorClass>>) -> Self {
            self.scripts.lock().unwrap().insert(
                model_id.to_string(),
                replies
                    .into_iter()
                    .map(|r| r.map(|s| s.to_string()))
                    .collect(),
            );
            self
        }

        pub fn calls_to(&self, provider_id: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, _, _)| p == provider_id)
                .count()
        }

        pub fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls_for_task(&self, task: TaskType) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, _, t)| *t == task)
                .count()
        }
    }

    #[async_trait]
    impl InferenceTransport for ScriptedTransport {
        async fn send(
            &self,
            provider: &ProviderConfig,
            _credential: &str,
            model_id: &str,
            request: &InferenceRequest,
        ) -> Result<InferenceResult, InferenceError> {
            self.calls.lock().unwrap().push((
                provider.provider_id.clone(),
                model_id.to_string(),
                request.task_type,
            ));

            let reply = {
                let mut scripts = self.scripts.lock().unwrap();
                let next = scripts.get_mut(model_id).and_then(|q| q.pop_front());
                let mut last = self.last.lock().unwrap();
                match next {
                    Some(reply) => {
                        last.insert(model_id.to_string(), reply.clone());
                        reply
                    }
                    None => last
                        .get(model_id)
                        .cloned()
                        .unwrap_or(Err(ErrorClass::Unknown)),
                }
            };

            match reply {
                Ok(content) => Ok(InferenceResult {
                    raw_content: content,
                    provider_id: String::new(),
                    model_id: String::new(),
                    usage: None,
                    finish_reason: Some("stop".to_string()),
                }),
                Err(class) => Err(InferenceError::new(class, format!("scripted {}", class))),
            }
        }
    }

    fn test_provider(id: &str) -> ProviderConfig {
        use crate::ai::providers::registry::ModelInfo;
        ProviderConfig {
            provider_id: id.to_string(),
            display_name: id.to_uppercase(),
            base_url: format!("http://{}.invalid/v1", id),
            credential: Some(format!("key-{}", id)),
            api_key_env: None,
            models: vec![
                ModelInfo::new(&format!("{}-chat", id), TaskType::Chat, "chat"),
                ModelInfo::new(&format!("{}-vision", id), TaskType::Vision, "vision"),
            ],
        }
    }

    /// Registry of credentialed test providers and a table ranking them in the given
    /// order for both task types
    pub fn fixture(ids: &[&str]) -> (Arc<ProviderRegistry>, Arc<PriorityTable>) {
        let registry = ProviderRegistry::new(ids.iter().map(|id| test_provider(id)).collect());
        let table = PriorityTable::new();
        for task in [TaskType::Chat, TaskType::Vision] {
            let entries = ids
                .iter()
                .enumerate()
                .map(|(rank, id)| PriorityEntry::new(id, &format!("{}-{}", id, task), rank as u32))
                .collect();
            table.set_entries(task, entries).unwrap();
        }
        (Arc::new(registry), Arc::new(table))
    }

    pub fn client_with(ids: &[&str], transport: Arc<ScriptedTransport>) -> MultiProviderClient {
        client_with_policy(ids, transport, RetryPolicy::default())
    }

    pub fn client_with_policy(
        ids: &[&str],
        transport: Arc<ScriptedTransport>,
        policy: RetryPolicy,
    ) -> MultiProviderClient {
        let (registry, table) = fixture(ids);
        MultiProviderClient::new(registry, table, transport, policy)
    }
}
