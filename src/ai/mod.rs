pub mod http_client;
pub mod naming;
pub mod providers;

pub use naming::{FallbackOrchestrator, RenameOutcome, RenameTask};
pub use providers::{MultiProviderClient, ProviderRegistry};
