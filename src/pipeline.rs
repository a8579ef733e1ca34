//! Wiring: config → registry, priorities, client, orchestrator, queue, batch processor

use crate::ai::http_client::{build_client, DEFAULT_TIMEOUT_SECS};
use crate::ai::naming::{
    DefaultPromptBuilder, FallbackOrchestrator, PromptBuilder, RenameOutcome, RenameTask,
};
use crate::ai::providers::{
    HttpTransport, InferenceTransport, MultiProviderClient, PriorityTable, ProviderRegistry,
    TaskType,
};
use crate::batch::{BatchFile, BatchOptions, BatchProcessor, BatchProgress};
use crate::config::{ConfigError, NamerConfig};
use crate::queue::AdaptiveQueueManager;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything needed to name files, built from one [`NamerConfig`]
pub struct NamingPipeline {
    config: NamerConfig,
    registry: Arc<ProviderRegistry>,
    priorities: Arc<PriorityTable>,
    orchestrator: Arc<FallbackOrchestrator>,
    queue: Arc<AdaptiveQueueManager>,
    batch: BatchProcessor,
}

impl NamingPipeline {
    /// Pipeline over HTTP providers with the stock prompt templates
    pub fn from_config(config: NamerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = if config.request_timeout_secs == DEFAULT_TIMEOUT_SECS {
            HttpTransport::new()
        } else {
            HttpTransport::with_client(build_client(config.request_timeout())?)
        };
        Self::with_transport(config, Arc::new(transport), Arc::new(DefaultPromptBuilder))
    }

    pub fn with_transport(
        config: NamerConfig,
        transport: Arc<dyn InferenceTransport>,
        prompts: Arc<dyn PromptBuilder>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(config.build_registry()?);
        let priorities = Arc::new(config.build_priority_table(&registry)?);
        let client = Arc::new(MultiProviderClient::new(
            Arc::clone(&registry),
            Arc::clone(&priorities),
            transport,
            config.retry,
        ));

        for task in [TaskType::Chat, TaskType::Vision] {
            if !client.has_provider(task) {
                warn!(task = %task, "No credentialed provider; files will use local fallbacks");
            }
        }

        let orchestrator = Arc::new(FallbackOrchestrator::new(
            client,
            prompts,
            config.naming.clone(),
            config.escalation,
        ));
        let queue = Arc::new(AdaptiveQueueManager::new(config.queue.clone()));
        let batch = BatchProcessor::new(Arc::clone(&orchestrator), Arc::clone(&queue));

        info!(
            configured = ?registry.configured_providers(),
            "Naming pipeline ready"
        );

        Ok(Self {
            config,
            registry,
            priorities,
            orchestrator,
            queue,
            batch,
        })
    }

    pub fn config(&self) -> &NamerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn priorities(&self) -> &PriorityTable {
        &self.priorities
    }

    pub fn orchestrator(&self) -> &FallbackOrchestrator {
        &self.orchestrator
    }

    pub fn queue(&self) -> &AdaptiveQueueManager {
        &self.queue
    }

    /// Name a single file outside the queue
    pub async fn generate_name(&self, task: &RenameTask) -> RenameOutcome {
        self.orchestrator.generate_name(task).await
    }

    pub async fn process_batch<F>(
        &self,
        files: Vec<BatchFile>,
        options: &BatchOptions,
        progress_callback: F,
    ) -> Vec<RenameOutcome>
    where
        F: Fn(BatchProgress) + Send + Sync,
    {
        self.batch
            .process_batch(files, options, progress_callback)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::naming::{FileKind, MethodUsed};
    use crate::ai::providers::testing::ScriptedTransport;
    use crate::ai::providers::ErrorClass;

    fn pipeline(transport: Arc<ScriptedTransport>) -> NamingPipeline {
        let pipeline = NamingPipeline::with_transport(
            NamerConfig::default(),
            transport,
            Arc::new(DefaultPromptBuilder),
        )
        .unwrap();
        pipeline.registry().set_credential("openai", "test-key");
        pipeline
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_names_document() {
        let transport = Arc::new(
            ScriptedTransport::new().script("gpt-4o-mini", vec![Ok(r#"{"suggestedName":"Lease-2024"}"#)]),
        );
        let pipeline = pipeline(Arc::clone(&transport));

        let task = RenameTask::new("1", FileKind::Document, "scan.pdf").with_text("lease agreement");
        let outcome = pipeline.generate_name(&task).await;

        assert_eq!(outcome.method_used, MethodUsed::Chat);
        assert_eq!(outcome.provider_id.as_deref(), Some("openai"));
        assert_eq!(outcome.suggested_name, "Lease-2024.pdf");
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipeline_batch_uses_vision_priorities() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("gpt-4o", vec![Err(ErrorClass::ServerError)])
                .script("gpt-4o-mini", vec![Ok("Whiteboard-Sketch")]),
        );
        let pipeline = pipeline(Arc::clone(&transport));

        let files: Vec<BatchFile> = serde_json::from_str(
            r#"[{"id":"i","kind":"image","name":"IMG_1.png","imageRef":"data:image/png;base64,AAAA"}]"#,
        )
        .unwrap();
        let outcomes = pipeline
            .process_batch(files, &BatchOptions::default(), |_| {})
            .await;

        assert_eq!(outcomes[0].method_used, MethodUsed::OcrChatFallback);
        assert_eq!(outcomes[0].suggested_name, "Whiteboard-Sketch.png");
        assert_eq!(pipeline.queue().stats().server_error_count, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = NamerConfig {
            request_timeout_secs: 0,
            ..NamerConfig::default()
        };
        assert!(NamingPipeline::from_config(config).is_err());
    }
}
