//! Prompt building
//!
//! The orchestrator treats "turn a template plus extracted text into a prompt" as an
//! opaque collaborator ([`PromptBuilder`]). [`DefaultPromptBuilder`] ships the stock
//! templates; embedding applications can substitute their own.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PromptError {
    #[error("unknown prompt template: {0}")]
    UnknownTemplate(String),
    #[error("prompt builder failed: {0}")]
    Failed(String),
}

pub trait PromptBuilder: Send + Sync {
    fn build(
        &self,
        template: &str,
        extracted_text: &str,
        custom_instructions: Option<&str>,
    ) -> Result<String, PromptError>;
}

/// How much extracted text goes into a prompt
pub const MAX_CONTENT_CHARS: usize = 4000;

/// Shared rules appended to every stock template
pub const RENAME_RULES: &str = r#"RULES:
1. Use the language of the content (keep Chinese/Japanese/Korean names as-is)
2. Keep names concise: 3-6 meaningful words, at most 50 characters
3. Include relevant identifiers: dates (yyyy-mm or yyyy), names, document types
4. Use hyphens between words; no spaces, slashes or other special characters
5. Do NOT include a file extension

Respond with ONLY this JSON, no markdown:
{"suggestedName": "...", "reasoning": "one short sentence", "confidence": 0.0-1.0}"#;

const GENERAL_TEMPLATE: &str =
    "Suggest a clean, descriptive file name for the file described below.";
const DOCUMENT_TEMPLATE: &str = "Suggest a descriptive file name for this document. Lead with the issuing organization or main subject, then the document type, then the most relevant date.";
const IMAGE_TEMPLATE: &str = "Suggest a descriptive file name for this image. Describe the main subject; if it is a screenshot or a scanned document, name what it shows.";

/// Stock templates: `general`, `document`, `image`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPromptBuilder;

impl PromptBuilder for DefaultPromptBuilder {
    fn build(
        &self,
        template: &str,
        extracted_text: &str,
        custom_instructions: Option<&str>,
    ) -> Result<String, PromptError> {
        let intro = match template {
            "general" | "" => GENERAL_TEMPLATE,
            "document" => DOCUMENT_TEMPLATE,
            "image" | "photo" => IMAGE_TEMPLATE,
            other => return Err(PromptError::UnknownTemplate(other.to_string())),
        };

        let mut prompt = String::from(intro);

        if let Some(instructions) = custom_instructions.filter(|i| !i.trim().is_empty()) {
            prompt.push_str(&format!("\n\nUSER INSTRUCTIONS:\n{}", instructions.trim()));
        }

        let content = extracted_text.trim();
        if !content.is_empty() {
            prompt.push_str(&format!(
                r#"

CONTENT (first {} characters):
---
{}
---"#,
                MAX_CONTENT_CHARS,
                truncate_chars(content, MAX_CONTENT_CHARS)
            ));
        }

        prompt.push_str("\n\n");
        prompt.push_str(RENAME_RULES);
        Ok(prompt)
    }
}

/// Preamble for a vision request that also carries OCR text
pub fn vision_hybrid_prompt(base: &str, original_name: &str) -> String {
    format!(
        "Look at the attached image. Text recognized in the image (OCR) is included below and may contain errors; use it to read names, dates and numbers.\nCurrent file name: {}\n\n{}",
        original_name, base
    )
}

/// Preamble for a vision request with the image alone
pub fn vision_only_prompt(base: &str, original_name: &str) -> String {
    format!(
        "Look at the attached image.\nCurrent file name: {}\n\n{}",
        original_name, base
    )
}

/// Preamble for naming an image from OCR text alone
pub fn ocr_chat_prompt(base: &str, original_name: &str, has_text: bool) -> String {
    let note = if has_text {
        "The image itself is not available. Below is text recognized in it (OCR), which may contain errors."
    } else {
        "The image itself is not available and no text could be recognized in it. Derive the best name you can from the current file name."
    };
    format!("{}\nCurrent file name: {}\n\n{}", note, original_name, base)
}

/// Preamble for a document chat request
pub fn document_prompt(base: &str, original_name: &str) -> String {
    format!("Current file name: {}\n\n{}", original_name, base)
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
