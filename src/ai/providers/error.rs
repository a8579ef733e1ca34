//! Failure taxonomy for inference calls
//!
//! Every failure that leaves a transport is reduced to an [`ErrorClass`] exactly once,
//! at the point where the most information is available (HTTP status, reqwest error
//! kind). Retry and fallback decisions downstream only ever match on the enum.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed inference attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    RateLimit,
    Timeout,
    ServerError,
    AuthError,
    BadRequest,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Timeout => "timeout",
            Self::ServerError => "server_error",
            Self::AuthError => "auth_error",
            Self::BadRequest => "bad_request",
            Self::Unknown => "unknown",
        }
    }

    /// Map an HTTP status code to a class
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimit,
            408 | 504 => Self::Timeout,
            401 | 403 => Self::AuthError,
            // 404 is what providers return for deprecated or unknown models
            400 | 404 | 409 | 413 | 415 | 422 => Self::BadRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Map a reqwest transport error to a class
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = err.status() {
            return Self::from_status(status.as_u16());
        }
        if err.is_connect() {
            // Unreachable endpoint: structurally failing, move to the next provider
            return Self::ServerError;
        }
        if err.is_decode() || err.is_builder() {
            return Self::BadRequest;
        }
        Self::Unknown
    }

    /// Classify a free-form error message.
    ///
    /// Only used for failures that never had a status code or a reqwest error attached
    /// (e.g. errors surfaced by embedding applications through a custom transport).
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["rate limit", "rate_limit", "too many requests", "429", "quota"]) {
            Self::RateLimit
        } else if has(&["timeout", "timed out", "deadline"]) {
            Self::Timeout
        } else if has(&["unauthorized", "forbidden", "api key", "401", "403"]) {
            Self::AuthError
        } else if has(&["500", "502", "503", "server error", "overloaded", "unavailable"]) {
            Self::ServerError
        } else if has(&["400", "bad request", "invalid"]) {
            Self::BadRequest
        } else {
            Self::Unknown
        }
    }

    /// Whether another attempt against the same provider entry may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout)
    }

    /// Whether the failure is transient enough that the whole file is worth retrying later
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout | Self::ServerError)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed inference attempt
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{class}: {message}")]
pub struct InferenceError {
    pub class: ErrorClass,
    pub status: Option<u16>,
    pub message: String,
}

impl InferenceError {
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            status: None,
            message: message.into(),
        }
    }

    /// Build from a non-success HTTP response
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, truncate(body, 300))
        };
        Self {
            class: ErrorClass::from_status(status),
            status: Some(status),
            message,
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        Self {
            class: ErrorClass::from_reqwest(err),
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }

    /// The provider answered but the completion text was missing
    pub fn missing_content() -> Self {
        Self::new(ErrorClass::BadRequest, "response contained no completion content")
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(ErrorClass::from_status(429), ErrorClass::RateLimit);
        assert_eq!(ErrorClass::from_status(408), ErrorClass::Timeout);
        assert_eq!(ErrorClass::from_status(504), ErrorClass::Timeout);
        assert_eq!(ErrorClass::from_status(401), ErrorClass::AuthError);
        assert_eq!(ErrorClass::from_status(403), ErrorClass::AuthError);
        assert_eq!(ErrorClass::from_status(404), ErrorClass::BadRequest);
        assert_eq!(ErrorClass::from_status(400), ErrorClass::BadRequest);
        assert_eq!(ErrorClass::from_status(500), ErrorClass::ServerError);
        assert_eq!(ErrorClass::from_status(503), ErrorClass::ServerError);
        assert_eq!(ErrorClass::from_status(302), ErrorClass::Unknown);
    }

    #[test]
    fn test_from_message() {
        assert_eq!(
            ErrorClass::from_message("Too Many Requests, slow down"),
            ErrorClass::RateLimit
        );
        assert_eq!(
            ErrorClass::from_message("operation timed out"),
            ErrorClass::Timeout
        );
        assert_eq!(
            ErrorClass::from_message("Invalid API key provided"),
            ErrorClass::AuthError
        );
        assert_eq!(
            ErrorClass::from_message("upstream overloaded"),
            ErrorClass::ServerError
        );
        assert_eq!(ErrorClass::from_message("something odd"), ErrorClass::Unknown);
    }

    #[test]
    fn test_retryable_classes() {
        assert!(ErrorClass::RateLimit.is_retryable());
        assert!(ErrorClass::Timeout.is_retryable());
        assert!(!ErrorClass::ServerError.is_retryable());
        assert!(!ErrorClass::AuthError.is_retryable());
        assert!(!ErrorClass::BadRequest.is_retryable());
        assert!(!ErrorClass::Unknown.is_retryable());
        assert!(ErrorClass::ServerError.is_transient());
    }

    #[test]
    fn test_inference_error_from_status_truncates_body() {
        let body = "x".repeat(1000);
        let err = InferenceError::from_status(500, &body);
        assert_eq!(err.class, ErrorClass::ServerError);
        assert_eq!(err.status, Some(500));
        assert!(err.message.chars().count() < 400);
    }

    #[test]
    fn test_display() {
        let err = InferenceError::new(ErrorClass::RateLimit, "slow down");
        assert_eq!(err.to_string(), "rate_limit: slow down");
    }
}
