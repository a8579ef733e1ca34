//! File naming: prompt building, the degradation ladder and response normalization

mod heuristic;
mod normalizer;
mod orchestrator;
mod prompts;
mod types;

pub use heuristic::{category_suffix, heuristic_name};
pub use normalizer::{NamingConfig, NormalizedResponse, ResponseNormalizer};
pub use orchestrator::{EscalationPolicy, FallbackOrchestrator};
pub use prompts::{DefaultPromptBuilder, PromptBuilder, PromptError, MAX_CONTENT_CHARS};
pub use types::{
    FileKind, MethodUsed, OutcomeError, RenameOptions, RenameOutcome, RenameTask,
    TIMESTAMP_NAME_CONFIDENCE,
};
