//! Degradation ladder
//!
//! ```text
//!  image ──► VisionHybrid / VisionOnly ──(rate limit, timeout, server error)──► OcrChat
//!                     │                                                          │
//!                     │ other failures                                  any failure
//!                     ▼                                                          ▼
//!               ErrorFallback ◄──(no text)── DocumentChat ◄── document      OcrBasic
//! ```
//!
//! Each rung is a named [`LadderStep`]; transitions are decided on the typed
//! [`CallError`] coming back from the client. `generate_name` never fails: prompt
//! errors, unclassified provider failures and panics all land on the catch-all.

use super::heuristic::{category_suffix, heuristic_name};
use super::normalizer::{NamingConfig, ResponseNormalizer};
use super::prompts::{
    document_prompt, ocr_chat_prompt, vision_hybrid_prompt, vision_only_prompt, PromptBuilder,
    PromptError,
};
use super::types::{
    FileKind, MethodUsed, OutcomeError, RenameOutcome, RenameTask, TIMESTAMP_NAME_CONFIDENCE,
};
use crate::ai::providers::{
    CallError, ErrorClass, InferenceRequest, InferenceResult, MultiProviderClient, TaskType,
};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// When a failed vision call is worth retrying as chat + OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EscalationPolicy {
    /// Consecutive rate-limited attempts before giving up on vision
    pub rate_limit_attempts: u32,
    /// Consecutive timed-out attempts before giving up on vision
    pub timeout_attempts: u32,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            rate_limit_attempts: 2,
            timeout_attempts: 2,
        }
    }
}

impl EscalationPolicy {
    /// Whether a vision failure moves down to chat + OCR instead of the catch-all
    pub fn should_degrade(&self, err: &CallError) -> bool {
        match err {
            CallError::NoProviderConfigured(_) => true,
            CallError::Exhausted(failure) => match failure.class() {
                ErrorClass::ServerError => true,
                ErrorClass::RateLimit => failure.trailing_same_class() >= self.rate_limit_attempts,
                ErrorClass::Timeout => failure.trailing_same_class() >= self.timeout_attempts,
                ErrorClass::AuthError | ErrorClass::BadRequest | ErrorClass::Unknown => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LadderStep {
    VisionHybrid,
    VisionOnly,
    OcrChat,
    OcrBasic,
    DocumentChat,
}

#[derive(Debug, Error)]
enum LadderError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Provider(#[from] CallError),
    #[error("image task has no image reference")]
    MissingImage,
    #[error("naming panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Aborted(String),
}

impl LadderError {
    fn class(&self) -> Option<ErrorClass> {
        match self {
            Self::Provider(err) => err.class(),
            _ => None,
        }
    }
}

pub struct FallbackOrchestrator {
    client: Arc<MultiProviderClient>,
    prompts: Arc<dyn PromptBuilder>,
    normalizer: ResponseNormalizer,
    escalation: EscalationPolicy,
}

impl FallbackOrchestrator {
    pub fn new(
        client: Arc<MultiProviderClient>,
        prompts: Arc<dyn PromptBuilder>,
        naming: NamingConfig,
        escalation: EscalationPolicy,
    ) -> Self {
        Self {
            client,
            prompts,
            normalizer: ResponseNormalizer::new(naming),
            escalation,
        }
    }

    pub fn client(&self) -> &MultiProviderClient {
        &self.client
    }

    pub fn normalizer(&self) -> &ResponseNormalizer {
        &self.normalizer
    }

    /// Produce a name for one file. Always returns an outcome.
    pub async fn generate_name(&self, task: &RenameTask) -> RenameOutcome {
        let ladder = AssertUnwindSafe(self.run_ladder(task)).catch_unwind().await;

        match ladder {
            Ok(Ok(outcome)) => {
                info!(
                    file = %task.file_id,
                    method = outcome.method_used.as_str(),
                    name = %outcome.suggested_name,
                    "[FallbackOrchestrator] Named file"
                );
                outcome
            }
            Ok(Err(err)) => {
                warn!(
                    file = %task.file_id,
                    "[FallbackOrchestrator] Falling back to catch-all name: {}",
                    err
                );
                self.error_outcome(task, &err)
            }
            Err(payload) => {
                let err = LadderError::Panicked(panic_message(payload.as_ref()));
                error!(file = %task.file_id, "[FallbackOrchestrator] {}", err);
                self.error_outcome(task, &err)
            }
        }
    }

    /// Catch-all outcome for a task that could not be processed at all
    pub fn fallback_outcome(&self, task: &RenameTask, message: &str) -> RenameOutcome {
        self.error_outcome(task, &LadderError::Aborted(message.to_string()))
    }

    fn initial_step(task: &RenameTask) -> LadderStep {
        match task.file_kind {
            FileKind::Image => {
                let opts = &task.options;
                if opts.skip_vision || opts.force_ocr_fallback || task.image_ref.is_none() {
                    LadderStep::OcrChat
                } else if opts.enable_ocr {
                    LadderStep::VisionHybrid
                } else {
                    LadderStep::VisionOnly
                }
            }
            FileKind::Document | FileKind::Other => LadderStep::DocumentChat,
        }
    }

    async fn run_ladder(&self, task: &RenameTask) -> Result<RenameOutcome, LadderError> {
        let mut step = Self::initial_step(task);
        let mut degraded_by: Option<OutcomeError> = None;

        loop {
            debug!(file = %task.file_id, step = ?step, "[FallbackOrchestrator] Step");

            step = match step {
                LadderStep::VisionHybrid | LadderStep::VisionOnly => {
                    let method = if step == LadderStep::VisionHybrid {
                        MethodUsed::VisionOcrHybrid
                    } else {
                        MethodUsed::VisionOnly
                    };
                    match self.attempt_vision(task, method).await {
                        Ok(outcome) => return Ok(outcome),
                        Err(LadderError::MissingImage) => LadderStep::OcrChat,
                        Err(LadderError::Provider(err)) if self.escalation.should_degrade(&err) => {
                            info!(
                                file = %task.file_id,
                                class = ?err.class(),
                                "[FallbackOrchestrator] Vision unavailable, trying chat with OCR text"
                            );
                            degraded_by = Some(degradation(&err));
                            LadderStep::OcrChat
                        }
                        Err(LadderError::Provider(err)) if task.has_text() => {
                            info!(
                                file = %task.file_id,
                                class = ?err.class(),
                                "[FallbackOrchestrator] Vision rejected, naming from OCR text locally"
                            );
                            degraded_by = Some(degradation(&err));
                            LadderStep::OcrBasic
                        }
                        Err(err) => return Err(err),
                    }
                }
                LadderStep::OcrChat => {
                    match self.attempt_chat(task, MethodUsed::OcrChatFallback).await {
                        Ok(outcome) => return Ok(with_degradation(outcome, degraded_by)),
                        Err(LadderError::Provider(err)) => {
                            info!(
                                file = %task.file_id,
                                class = ?err.class(),
                                "[FallbackOrchestrator] Chat failed, naming from OCR text locally"
                            );
                            degraded_by = Some(degradation(&err));
                            LadderStep::OcrBasic
                        }
                        Err(err) => return Err(err),
                    }
                }
                LadderStep::DocumentChat => match self.attempt_chat(task, MethodUsed::Chat).await {
                    Ok(outcome) => return Ok(outcome),
                    Err(LadderError::Provider(err)) if task.has_text() => {
                        degraded_by = Some(degradation(&err));
                        LadderStep::OcrBasic
                    }
                    Err(err) => return Err(err),
                },
                LadderStep::OcrBasic => return Ok(self.heuristic_outcome(task, degraded_by)),
            };
        }
    }

    async fn attempt_vision(
        &self,
        task: &RenameTask,
        method: MethodUsed,
    ) -> Result<RenameOutcome, LadderError> {
        let image_ref = task.image_ref.as_deref().ok_or(LadderError::MissingImage)?;
        let hybrid = method == MethodUsed::VisionOcrHybrid;
        let text = if hybrid { task.extracted_text.as_str() } else { "" };

        let base = self.prompts.build(
            &task.options.template,
            text,
            task.options.custom_instructions.as_deref(),
        )?;
        let prompt = if hybrid {
            vision_hybrid_prompt(&base, &task.original_name)
        } else {
            vision_only_prompt(&base, &task.original_name)
        };

        let result = self
            .client
            .call(TaskType::Vision, &InferenceRequest::vision(prompt, image_ref))
            .await?;
        Ok(self.success_outcome(task, method, result))
    }

    async fn attempt_chat(
        &self,
        task: &RenameTask,
        method: MethodUsed,
    ) -> Result<RenameOutcome, LadderError> {
        let base = self.prompts.build(
            &task.options.template,
            &task.extracted_text,
            task.options.custom_instructions.as_deref(),
        )?;
        let prompt = match method {
            MethodUsed::OcrChatFallback => {
                ocr_chat_prompt(&base, &task.original_name, task.has_text())
            }
            _ => document_prompt(&base, &task.original_name),
        };

        let result = self
            .client
            .call(TaskType::Chat, &InferenceRequest::chat(prompt))
            .await?;
        Ok(self.success_outcome(task, method, result))
    }

    fn success_outcome(
        &self,
        task: &RenameTask,
        method: MethodUsed,
        result: InferenceResult,
    ) -> RenameOutcome {
        let parsed = self.normalizer.parse(&result.raw_content);
        debug!(
            file = %task.file_id,
            reported_confidence = ?parsed.confidence,
            "[FallbackOrchestrator] Parsed provider response"
        );

        RenameOutcome {
            file_id: task.file_id.clone(),
            success: true,
            suggested_name: self
                .normalizer
                .finalize(&parsed.suggested_name, &task.original_name),
            reasoning: parsed.reasoning,
            confidence: method.confidence(),
            method_used: method,
            provider_id: Some(result.provider_id),
            model_id: Some(result.model_id),
            fallback_name: None,
            error: None,
        }
    }

    fn heuristic_outcome(&self, task: &RenameTask, degraded_by: Option<OutcomeError>) -> RenameOutcome {
        let config = self.normalizer.config();
        let (stem, confidence, reasoning) = match heuristic_name(
            &task.extracted_text,
            task.file_kind,
            config.heuristic_prefix_chars,
            config.separator,
        ) {
            Some(name) => (
                name,
                MethodUsed::OcrBasicFallback.confidence(),
                "Derived locally from extracted text",
            ),
            None => (
                self.normalizer
                    .timestamp_name(category_suffix("", task.file_kind)),
                TIMESTAMP_NAME_CONFIDENCE,
                "No usable text; timestamp name",
            ),
        };

        RenameOutcome {
            file_id: task.file_id.clone(),
            success: true,
            suggested_name: self.normalizer.finalize(&stem, &task.original_name),
            reasoning: Some(reasoning.to_string()),
            confidence,
            method_used: MethodUsed::OcrBasicFallback,
            provider_id: None,
            model_id: None,
            fallback_name: None,
            error: degraded_by,
        }
    }

    fn error_outcome(&self, task: &RenameTask, err: &LadderError) -> RenameOutcome {
        let name = self.normalizer.error_fallback_name(&task.original_name);
        let class = err.class();

        RenameOutcome {
            file_id: task.file_id.clone(),
            success: false,
            suggested_name: name.clone(),
            reasoning: None,
            confidence: MethodUsed::ErrorFallback.confidence(),
            method_used: MethodUsed::ErrorFallback,
            provider_id: None,
            model_id: None,
            fallback_name: Some(name),
            error: Some(OutcomeError {
                class,
                message: err.to_string(),
                retryable: class.is_some_and(|c| c.is_transient()),
            }),
        }
    }
}

fn degradation(err: &CallError) -> OutcomeError {
    OutcomeError {
        class: err.class(),
        message: err.to_string(),
        retryable: false,
    }
}

fn with_degradation(mut outcome: RenameOutcome, degraded_by: Option<OutcomeError>) -> RenameOutcome {
    outcome.error = degraded_by;
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::naming::prompts::DefaultPromptBuilder;
    use crate::ai::naming::types::RenameOptions;
    use crate::ai::providers::testing::{client_with, client_with_policy, ScriptedTransport};
    use crate::ai::providers::RetryPolicy;
    use ErrorClass::*;

    fn orchestrator(client: MultiProviderClient) -> FallbackOrchestrator {
        FallbackOrchestrator::new(
            Arc::new(client),
            Arc::new(DefaultPromptBuilder),
            NamingConfig::default(),
            EscalationPolicy::default(),
        )
    }

    fn image(id: &str) -> RenameTask {
        RenameTask::new(id, FileKind::Image, "IMG_0001.jpg").with_image("data:image/png;base64,AAAA")
    }

    struct PanickingPrompts;

    impl PromptBuilder for PanickingPrompts {
        fn build(&self, _: &str, _: &str, _: Option<&str>) -> Result<String, PromptError> {
            panic!("template engine blew up");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_document_chat() {
        let transport = Arc::new(ScriptedTransport::new().script(
            "a-chat",
            vec![Ok(r#"{"suggestedName":"预算报告-2024","reasoning":"budget report"}"#)],
        ));
        let orch = orchestrator(client_with(&["a"], Arc::clone(&transport)));
        let task = RenameTask::new("b", FileKind::Document, "scan.pdf").with_text("预算报告2024");

        let outcome = orch.generate_name(&task).await;

        assert!(outcome.success);
        assert_eq!(outcome.method_used, MethodUsed::Chat);
        assert_eq!(outcome.confidence, 0.8);
        assert_eq!(outcome.suggested_name, "预算报告-2024.pdf");
        assert_eq!(outcome.provider_id.as_deref(), Some("a"));
        assert_eq!(outcome.model_id.as_deref(), Some("a-chat"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_vision_paths() {
        let transport = Arc::new(
            ScriptedTransport::new().script("a-vision", vec![Ok("Sunset over the harbor")]),
        );
        let orch = orchestrator(client_with(&["a"], Arc::clone(&transport)));

        let hybrid = orch.generate_name(&image("1")).await;
        assert_eq!(hybrid.method_used, MethodUsed::VisionOcrHybrid);
        assert_eq!(hybrid.confidence, 0.9);
        assert_eq!(hybrid.suggested_name, "Sunset-over-the-harbor.jpg");

        let task = image("2").with_options(RenameOptions {
            enable_ocr: false,
            ..RenameOptions::default()
        });
        let only = orch.generate_name(&task).await;
        assert_eq!(only.method_used, MethodUsed::VisionOnly);
        assert_eq!(only.confidence, 0.85);
        assert_eq!(transport.calls_for_task(TaskType::Chat), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_vision_degrades_to_ocr_chat() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("a-vision", vec![Err(RateLimit)])
                .script("b-vision", vec![Err(RateLimit)])
                .script("a-chat", vec![Ok("Holiday-Photo")]),
        );
        let orch = orchestrator(client_with(&["a", "b"], Arc::clone(&transport)));

        let outcome = orch.generate_name(&image("a")).await;

        assert!(outcome.success);
        assert_eq!(outcome.method_used, MethodUsed::OcrChatFallback);
        assert_eq!(outcome.confidence, 0.7);
        assert_eq!(outcome.error_class(), Some(RateLimit));
        assert!(!outcome.is_retryable());
        assert_eq!(transport.calls_for_task(TaskType::Vision), 6);
        assert_eq!(transport.calls_for_task(TaskType::Chat), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_everything_down_yields_timestamp_name() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("a-vision", vec![Err(RateLimit)])
                .script("a-chat", vec![Err(RateLimit)]),
        );
        let orch = orchestrator(client_with(&["a"], Arc::clone(&transport)));

        let outcome = orch.generate_name(&image("a")).await;

        assert!(outcome.success);
        assert_eq!(outcome.method_used, MethodUsed::OcrBasicFallback);
        assert_eq!(outcome.confidence, TIMESTAMP_NAME_CONFIDENCE);
        assert!(outcome.suggested_name.starts_with("image-"));
        assert!(outcome.suggested_name.ends_with(".jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heuristic_name_from_ocr_text() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("a-vision", vec![Err(ServerError)])
                .script("a-chat", vec![Err(ServerError)]),
        );
        let orch = orchestrator(client_with(&["a"], Arc::clone(&transport)));
        let task = image("r").with_text("Coffee House receipt 2024-05-01");

        let outcome = orch.generate_name(&task).await;

        assert_eq!(outcome.method_used, MethodUsed::OcrBasicFallback);
        assert_eq!(outcome.confidence, 0.5);
        assert!(outcome.suggested_name.starts_with("Coffee-House-receipt"));
        assert!(outcome.suggested_name.ends_with("-receipt.jpg"));
        assert_eq!(outcome.error_class(), Some(ServerError));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_degrades_without_retry() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("a-vision", vec![Err(ServerError)])
                .script("a-chat", vec![Ok("Scanned-Letter")]),
        );
        let orch = orchestrator(client_with(&["a"], Arc::clone(&transport)));

        let outcome = orch.generate_name(&image("s")).await;

        assert_eq!(outcome.method_used, MethodUsed::OcrChatFallback);
        assert_eq!(transport.calls_for_task(TaskType::Vision), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_rate_limit_does_not_degrade() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("a-vision", vec![Err(RateLimit)])
                .script("a-chat", vec![Ok("unused")]),
        );
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };
        let orch = orchestrator(client_with_policy(&["a"], Arc::clone(&transport), policy));

        let outcome = orch.generate_name(&image("x")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.method_used, MethodUsed::ErrorFallback);
        assert!(outcome.is_retryable());
        assert_eq!(transport.calls_for_task(TaskType::Chat), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_error_goes_to_catch_all() {
        let transport = Arc::new(ScriptedTransport::new().script("a-vision", vec![Err(AuthError)]));
        let orch = orchestrator(client_with(&["a"], Arc::clone(&transport)));

        let outcome = orch.generate_name(&image("x")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.method_used, MethodUsed::ErrorFallback);
        assert_eq!(outcome.confidence, 0.0);
        assert_eq!(outcome.error_class(), Some(AuthError));
        assert!(!outcome.is_retryable());
        let fallback = outcome.fallback_name.unwrap();
        assert!(fallback.starts_with("IMG_0001-"));
        assert!(fallback.ends_with(".jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_vision_with_text_names_from_ocr() {
        for class in [AuthError, BadRequest] {
            let transport = Arc::new(ScriptedTransport::new().script("a-vision", vec![Err(class)]));
            let orch = orchestrator(client_with(&["a"], Arc::clone(&transport)));
            let task = image("v").with_text("Coffee House receipt 2024");

            let outcome = orch.generate_name(&task).await;

            assert!(outcome.success);
            assert_eq!(outcome.method_used, MethodUsed::OcrBasicFallback);
            assert_eq!(outcome.confidence, 0.5);
            assert!(outcome.suggested_name.starts_with("Coffee-House-receipt"));
            assert_eq!(outcome.error_class(), Some(class));
            assert_eq!(transport.calls_for_task(TaskType::Chat), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_document_without_text_fails_over_to_catch_all() {
        let transport = Arc::new(ScriptedTransport::new().script("a-chat", vec![Err(Timeout)]));
        let orch = orchestrator(client_with(&["a"], Arc::clone(&transport)));
        let task = RenameTask::new("d", FileKind::Document, "notes.txt");

        let outcome = orch.generate_name(&task).await;

        assert!(!outcome.success);
        assert_eq!(outcome.method_used, MethodUsed::ErrorFallback);
        assert_eq!(outcome.error_class(), Some(Timeout));
        assert!(outcome.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_vision_and_missing_image_start_at_ocr_chat() {
        let transport = Arc::new(ScriptedTransport::new().script("a-chat", vec![Ok("Receipt")]));
        let orch = orchestrator(client_with(&["a"], Arc::clone(&transport)));

        let skipped = image("1").with_options(RenameOptions {
            skip_vision: true,
            ..RenameOptions::default()
        });
        let no_image = RenameTask::new("2", FileKind::Image, "IMG_0002.png");

        for task in [skipped, no_image] {
            let outcome = orch.generate_name(&task).await;
            assert_eq!(outcome.method_used, MethodUsed::OcrChatFallback);
            assert!(outcome.error.is_none());
        }
        assert_eq!(transport.calls_for_task(TaskType::Vision), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_provider_configured() {
        let transport = Arc::new(ScriptedTransport::new());
        let orch = orchestrator(client_with(&[], Arc::clone(&transport)));

        let outcome = orch.generate_name(&image("n")).await;

        assert!(outcome.success);
        assert_eq!(outcome.method_used, MethodUsed::OcrBasicFallback);
        assert!(outcome.error.as_ref().is_some_and(|e| e.class.is_none()));
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_panic_is_contained() {
        let transport = Arc::new(ScriptedTransport::new());
        let orch = FallbackOrchestrator::new(
            Arc::new(client_with(&["a"], Arc::clone(&transport))),
            Arc::new(PanickingPrompts),
            NamingConfig::default(),
            EscalationPolicy::default(),
        );

        let outcome = orch.generate_name(&image("p")).await;

        assert!(!outcome.success);
        assert_eq!(outcome.method_used, MethodUsed::ErrorFallback);
        let error = outcome.error.unwrap();
        assert!(error.message.contains("template engine blew up"));
        assert!(error.class.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_template_goes_to_catch_all() {
        let transport = Arc::new(ScriptedTransport::new());
        let orch = orchestrator(client_with(&["a"], Arc::clone(&transport)));
        let task = RenameTask::new("t", FileKind::Document, "a.pdf")
            .with_text("text")
            .with_options(RenameOptions {
                template: "sonnet".to_string(),
                ..RenameOptions::default()
            });

        let outcome = orch.generate_name(&task).await;

        assert_eq!(outcome.method_used, MethodUsed::ErrorFallback);
        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confidence_always_in_unit_range() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .script("a-vision", vec![Err(Timeout)])
                .script("a-chat", vec![Ok(""), Err(BadRequest)]),
        );
        let orch = orchestrator(client_with(&["a"], Arc::clone(&transport)));
        let tasks = [
            image("1"),
            image("2").with_text("   "),
            RenameTask::new("3", FileKind::Other, ""),
            RenameTask::new("4", FileKind::Document, "???.pdf").with_text("!!!"),
        ];

        for task in &tasks {
            let outcome = orch.generate_name(task).await;
            assert!((0.0..=1.0).contains(&outcome.confidence));
            assert!(!outcome.suggested_name.is_empty());
            assert_eq!(outcome.file_id, task.file_id);
        }
    }

    #[test]
    fn test_escalation_thresholds() {
        use crate::ai::providers::{AggregateFailure, AttemptRecord, InferenceError};

        let failure = |class: ErrorClass, n: u32| {
            CallError::Exhausted(AggregateFailure {
                task: TaskType::Vision,
                last_error: InferenceError::new(class, "x"),
                attempts: (1..=n)
                    .map(|attempt| AttemptRecord {
                        provider_id: "a".to_string(),
                        model_id: "a-vision".to_string(),
                        attempt,
                        class,
                        message: "x".to_string(),
                    })
                    .collect(),
            })
        };
        let policy = EscalationPolicy::default();

        assert!(!policy.should_degrade(&failure(RateLimit, 1)));
        assert!(policy.should_degrade(&failure(RateLimit, 2)));
        assert!(!policy.should_degrade(&failure(Timeout, 1)));
        assert!(policy.should_degrade(&failure(Timeout, 3)));
        assert!(policy.should_degrade(&failure(ServerError, 1)));
        assert!(!policy.should_degrade(&failure(BadRequest, 3)));
        assert!(policy.should_degrade(&CallError::NoProviderConfigured(TaskType::Vision)));
    }
}
