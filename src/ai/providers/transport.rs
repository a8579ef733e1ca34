//! Inference transport
//!
//! The seam between the failover client and the network. [`HttpTransport`] speaks the
//! OpenAI chat-completions protocol that every catalog provider exposes; tests and
//! embedding applications can plug in their own [`InferenceTransport`].

use super::error::{ErrorClass, InferenceError};
use super::registry::ProviderConfig;
use super::types::{InferenceRequest, InferenceResult, TaskType, Usage};
use crate::ai::http_client::inference_client;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Performs exactly one attempt against one provider/model. No retries here.
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    async fn send(
        &self,
        provider: &ProviderConfig,
        credential: &str,
        model_id: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, InferenceError>;
}

/// OpenAI-compatible HTTP transport
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Transport on the shared, pooled client
    pub fn new() -> Self {
        Self {
            client: inference_client().clone(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceTransport for HttpTransport {
    async fn send(
        &self,
        provider: &ProviderConfig,
        credential: &str,
        model_id: &str,
        request: &InferenceRequest,
    ) -> Result<InferenceResult, InferenceError> {
        let body = build_request_body(model_id, request).await?;
        let url = format!("{}/chat/completions", provider.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential)
            .json(&body)
            .send()
            .await
            .map_err(|e| InferenceError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(InferenceError::from_status(status.as_u16(), &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::from_reqwest(&e))?;

        into_result(parsed, &provider.provider_id, model_id)
    }
}

// API request/response types

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrlContent },
}

#[derive(Serialize)]
struct ImageUrlContent {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<RawUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct RawUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

async fn build_request_body(
    model_id: &str,
    request: &InferenceRequest,
) -> Result<ChatRequest, InferenceError> {
    let content = match (request.task_type, request.image_ref.as_deref()) {
        (TaskType::Vision, Some(image_ref)) => {
            let url = resolve_image_url(image_ref).await?;
            MessageContent::Parts(vec![
                ContentPart::Text {
                    text: request.prompt_text.clone(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrlContent { url },
                },
            ])
        }
        (TaskType::Vision, None) => {
            return Err(InferenceError::new(
                ErrorClass::BadRequest,
                "vision request without an image",
            ))
        }
        (TaskType::Chat, _) => MessageContent::Text(request.prompt_text.clone()),
    };

    Ok(ChatRequest {
        model: model_id.to_string(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content,
        }],
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    })
}

fn into_result(
    response: ChatResponse,
    provider_id: &str,
    model_id: &str,
) -> Result<InferenceResult, InferenceError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(InferenceError::missing_content)?;

    let content = choice
        .message
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(InferenceError::missing_content)?;

    Ok(InferenceResult {
        raw_content: content,
        provider_id: provider_id.to_string(),
        model_id: model_id.to_string(),
        usage: response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }),
        finish_reason: choice.finish_reason,
    })
}

/// Turn an image reference into something the `image_url` part accepts.
///
/// `data:` and `http(s)` URLs pass through; anything else is read from disk and inlined
/// as base64.
pub async fn resolve_image_url(image_ref: &str) -> Result<String, InferenceError> {
    if image_ref.starts_with("data:")
        || image_ref.starts_with("http://")
        || image_ref.starts_with("https://")
    {
        return Ok(image_ref.to_string());
    }

    let path = Path::new(image_ref);
    let data = tokio::fs::read(path).await.map_err(|e| {
        InferenceError::new(
            ErrorClass::BadRequest,
            format!("Failed to read image {}: {}", path.display(), e),
        )
    })?;

    let mime = image_mime(path, &data);
    let encoded = base64::engine::general_purpose::STANDARD.encode(&data);
    Ok(format!("data:{};base64,{}", mime, encoded))
}

/// MIME type from the file extension, falling back to magic bytes
fn image_mime(path: &Path, data: &[u8]) -> String {
    mime_guess::from_path(path)
        .first()
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| detect_image_mime(data).to_string())
}

/// Detect image MIME type from magic bytes
fn detect_image_mime(data: &[u8]) -> &'static str {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png"
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(&b"WEBP"[..]) {
        "image/webp"
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        "image/gif"
    } else {
        "image/png" // Default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_detect_image_mime() {
        assert_eq!(detect_image_mime(&[0x89, 0x50, 0x4E, 0x47]), "image/png");
        assert_eq!(detect_image_mime(&[0xFF, 0xD8, 0xFF]), "image/jpeg");
        assert_eq!(detect_image_mime(b"GIF89a...."), "image/gif");
    }

    #[test]
    fn test_image_mime_prefers_extension() {
        assert_eq!(image_mime(Path::new("photo.jpg"), &[0x89, 0x50]), "image/jpeg");
        assert_eq!(image_mime(Path::new("scan.webp"), &[]), "image/webp");
        assert_eq!(
            image_mime(Path::new("no_extension"), &[0xFF, 0xD8, 0xFF]),
            "image/jpeg"
        );
    }

    #[tokio::test]
    async fn test_resolve_image_url_passthrough() {
        let url = resolve_image_url("https://example.com/a.png").await.unwrap();
        assert_eq!(url, "https://example.com/a.png");
        let data = resolve_image_url("data:image/png;base64,AAAA").await.unwrap();
        assert_eq!(data, "data:image/png;base64,AAAA");
    }

    #[tokio::test]
    async fn test_resolve_image_url_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]).unwrap();

        let url = resolve_image_url(path.to_str().unwrap()).await.unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_resolve_missing_file_is_bad_request() {
        let err = resolve_image_url("/definitely/not/here.png").await.unwrap_err();
        assert_eq!(err.class, ErrorClass::BadRequest);
    }

    #[tokio::test]
    async fn test_vision_body_has_image_part() {
        let request = InferenceRequest::vision("name this", "data:image/png;base64,AAAA");
        let body = build_request_body("gpt-4o", &request).await.unwrap();
        let json = serde_json::to_value(&body).unwrap();

        let content = &json["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AAAA");
        assert_eq!(json["model"], "gpt-4o");
    }

    #[tokio::test]
    async fn test_chat_body_is_plain_text() {
        let request = InferenceRequest::chat("name this").with_max_tokens(64);
        let body = build_request_body("deepseek-chat", &request).await.unwrap();
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["messages"][0]["content"], "name this");
        assert_eq!(json["max_tokens"], 64);
    }

    #[test]
    fn test_missing_content_is_bad_request() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        let err = into_result(response, "openai", "gpt-4o").unwrap_err();
        assert_eq!(err.class, ErrorClass::BadRequest);

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(into_result(empty, "openai", "gpt-4o").is_err());
    }

    #[test]
    fn test_into_result_captures_usage() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"Budget-Report"},"finish_reason":"stop"}],
                "usage":{"prompt_tokens":10,"completion_tokens":3,"total_tokens":13}}"#,
        )
        .unwrap();
        let result = into_result(response, "qwen", "qwen-plus").unwrap();
        assert_eq!(result.raw_content, "Budget-Report");
        assert_eq!(result.finish_reason.as_deref(), Some("stop"));
        assert_eq!(result.usage.unwrap().total_tokens, 13);
    }
}
