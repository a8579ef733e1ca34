//! Request/response contract shared by every provider

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of inference a model is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Chat,
    Vision,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Vision => "vision",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single inference request, independent of the provider that ends up serving it
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub task_type: TaskType,
    pub prompt_text: String,
    /// Filesystem path, `data:` URL or `http(s)` URL of the image (vision only)
    pub image_ref: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl InferenceRequest {
    /// Text-only request
    pub fn chat(prompt_text: impl Into<String>) -> Self {
        Self {
            task_type: TaskType::Chat,
            prompt_text: prompt_text.into(),
            image_ref: None,
            temperature: 0.3,
            max_tokens: 200,
        }
    }

    /// Request carrying an image alongside the prompt
    pub fn vision(prompt_text: impl Into<String>, image_ref: impl Into<String>) -> Self {
        Self {
            task_type: TaskType::Vision,
            prompt_text: prompt_text.into(),
            image_ref: Some(image_ref.into()),
            temperature: 0.3,
            max_tokens: 200,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Successful completion, tagged with the entry that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    pub raw_content: String,
    pub provider_id: String,
    pub model_id: String,
    pub usage: Option<Usage>,
    pub finish_reason: Option<String>,
}
