//! AI file naming with multi-provider failover, a degradation ladder and adaptive
//! batch pacing.
//!
//! ```text
//! BatchProcessor ──► AdaptiveQueueManager (ordering, pause, strategy)
//!        │
//!        ▼
//! FallbackOrchestrator (vision → chat+OCR → heuristic → timestamp)
//!        │
//!        ▼
//! MultiProviderClient (priority table, retry/backoff, failover) ──► InferenceTransport
//! ```

pub mod ai;
pub mod batch;
pub mod config;
pub mod pipeline;
pub mod queue;

pub use ai::naming::{
    FallbackOrchestrator, FileKind, MethodUsed, RenameOptions, RenameOutcome, RenameTask,
};
pub use ai::providers::{ErrorClass, MultiProviderClient, PriorityTable, ProviderRegistry, TaskType};
pub use batch::{BatchFile, BatchOptions, BatchProcessor, BatchProgress};
pub use config::{ConfigError, NamerConfig};
pub use pipeline::NamingPipeline;
pub use queue::{AdaptiveQueueManager, ErrorStats, ProcessingStrategy};

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "warn,sentinel_namer=info";

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter; use
/// `RUST_LOG=sentinel_namer=debug` for per-attempt logs. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
