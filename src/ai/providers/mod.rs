//! Inference providers
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  ProviderRegistry   providers, models, credentials         │
//! │  PriorityTable      ranked (provider, model) per task type │
//! └──────────────────────────┬─────────────────────────────────┘
//!                            │ read-mostly, shared by workers
//!                            ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │  MultiProviderClient   failover + bounded retry/backoff    │
//! └──────────────────────────┬─────────────────────────────────┘
//!                            │ one attempt at a time
//!                            ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │  InferenceTransport (HttpTransport: OpenAI-compatible)     │
//! └────────────────────────────────────────────────────────────┘
//! ```

mod client;
mod error;
mod priority;
mod registry;
mod transport;
mod types;

pub use client::{AggregateFailure, AttemptRecord, CallError, MultiProviderClient, RetryPolicy};
pub use error::{ErrorClass, InferenceError};
pub use priority::{PriorityEntry, PriorityError, PriorityTable};
pub use registry::{builtin_providers, ModelInfo, ProviderConfig, ProviderRegistry};
pub use transport::{resolve_image_url, HttpTransport, InferenceTransport};
pub use types::{InferenceRequest, InferenceResult, TaskType, Usage};

#[cfg(test)]
pub(crate) use client::testing;
