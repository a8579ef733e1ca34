//! Shared types for the naming pipeline

use crate::ai::providers::ErrorClass;
use serde::{Deserialize, Serialize};

/// Broad kind of the file being named
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Document,
    Other,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Other => "other",
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image)
    }

    /// Guess the kind from a file extension
    pub fn from_extension(ext: Option<&str>) -> Self {
        match ext.map(|e| e.to_lowercase()) {
            Some(e)
                if matches!(
                    e.as_str(),
                    "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "tiff" | "tif" | "heic"
                ) =>
            {
                Self::Image
            }
            Some(e)
                if matches!(
                    e.as_str(),
                    "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "odt" | "ods"
                        | "odp" | "txt" | "md" | "csv" | "rtf" | "html" | "htm"
                ) =>
            {
                Self::Document
            }
            _ => Self::Other,
        }
    }
}

/// Per-file naming options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenameOptions {
    /// Prompt template name handed to the prompt builder
    pub template: String,
    pub custom_instructions: Option<String>,
    /// Fuse extracted OCR text into vision prompts
    pub enable_ocr: bool,
    /// Start image tasks at the chat + OCR step
    pub force_ocr_fallback: bool,
    /// Never send the image itself to a provider
    pub skip_vision: bool,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            template: "general".to_string(),
            custom_instructions: None,
            enable_ocr: true,
            force_ocr_fallback: false,
            skip_vision: false,
        }
    }
}

/// One file awaiting a name. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameTask {
    pub file_id: String,
    pub file_kind: FileKind,
    /// Current file name including extension
    pub original_name: String,
    #[serde(default)]
    pub extracted_text: String,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub options: RenameOptions,
}

impl RenameTask {
    pub fn new(file_id: &str, file_kind: FileKind, original_name: &str) -> Self {
        Self {
            file_id: file_id.to_string(),
            file_kind,
            original_name: original_name.to_string(),
            extracted_text: String::new(),
            image_ref: None,
            size_bytes: 0,
            options: RenameOptions::default(),
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.extracted_text = text.to_string();
        self
    }

    pub fn with_image(mut self, image_ref: &str) -> Self {
        self.image_ref = Some(image_ref.to_string());
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn with_options(mut self, options: RenameOptions) -> Self {
        self.options = options;
        self
    }

    pub fn has_text(&self) -> bool {
        !self.extracted_text.trim().is_empty()
    }
}

/// Which ladder step produced the final name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodUsed {
    /// Document text sent to a chat model
    Chat,
    /// Image plus extracted OCR text sent to a vision model
    VisionOcrHybrid,
    /// Image alone sent to a vision model
    VisionOnly,
    /// Vision unavailable; OCR text sent to a chat model
    OcrChatFallback,
    /// Local heuristic over the OCR text
    OcrBasicFallback,
    /// Catch-all: original name plus timestamp
    ErrorFallback,
}

impl MethodUsed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::VisionOcrHybrid => "vision_ocr_hybrid",
            Self::VisionOnly => "vision_only",
            Self::OcrChatFallback => "ocr_chat_fallback",
            Self::OcrBasicFallback => "ocr_basic_fallback",
            Self::ErrorFallback => "error_fallback",
        }
    }

    /// Confidence attached to a name produced by this step
    pub fn confidence(&self) -> f32 {
        match self {
            Self::VisionOcrHybrid => 0.9,
            Self::VisionOnly => 0.85,
            Self::Chat => 0.8,
            Self::OcrChatFallback => 0.7,
            Self::OcrBasicFallback => 0.5,
            Self::ErrorFallback => 0.0,
        }
    }
}

/// Confidence of a heuristic name when there was no text to derive it from
pub const TIMESTAMP_NAME_CONFIDENCE: f32 = 0.3;

/// Provider error observed while producing an outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeError {
    /// `None` when no provider was reachable at all
    pub class: Option<ErrorClass>,
    pub message: String,
    /// Whether the file is worth another pass through the queue
    pub retryable: bool,
}

/// Terminal result for one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOutcome {
    pub file_id: String,
    pub success: bool,
    pub suggested_name: String,
    pub reasoning: Option<String>,
    pub confidence: f32,
    pub method_used: MethodUsed,
    pub provider_id: Option<String>,
    pub model_id: Option<String>,
    pub fallback_name: Option<String>,
    /// Set on failure, and on successes reached only by degrading past a provider error
    pub error: Option<OutcomeError>,
}

impl RenameOutcome {
    pub fn error_class(&self) -> Option<ErrorClass> {
        self.error.as_ref().and_then(|e| e.class)
    }

    pub fn is_retryable(&self) -> bool {
        !self.success && self.error.as_ref().is_some_and(|e| e.retryable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_serializes_snake_case() {
        let json = serde_json::to_string(&MethodUsed::OcrChatFallback).unwrap();
        assert_eq!(json, "\"ocr_chat_fallback\"");
        assert_eq!(MethodUsed::VisionOcrHybrid.as_str(), "vision_ocr_hybrid");
    }

    #[test]
    fn test_confidence_decreases_down_the_ladder() {
        assert!(MethodUsed::VisionOcrHybrid.confidence() > MethodUsed::VisionOnly.confidence());
        assert!(MethodUsed::VisionOnly.confidence() > MethodUsed::OcrChatFallback.confidence());
        assert!(
            MethodUsed::OcrChatFallback.confidence() > MethodUsed::OcrBasicFallback.confidence()
        );
        assert_eq!(MethodUsed::ErrorFallback.confidence(), 0.0);
    }

    #[test]
    fn test_file_kind_from_extension() {
        assert_eq!(FileKind::from_extension(Some("JPG")), FileKind::Image);
        assert_eq!(FileKind::from_extension(Some("pdf")), FileKind::Document);
        assert_eq!(FileKind::from_extension(Some("exe")), FileKind::Other);
        assert_eq!(FileKind::from_extension(None), FileKind::Other);
    }

    #[test]
    fn test_task_deserializes_with_defaults() {
        let task: RenameTask = serde_json::from_str(
            r#"{"fileId":"1","fileKind":"image","originalName":"IMG_001.jpg"}"#,
        )
        .unwrap();
        assert!(task.options.enable_ocr);
        assert_eq!(task.options.template, "general");
        assert!(!task.has_text());
        assert!(task.image_ref.is_none());
    }
}
