pub mod completion;
pub mod config;
pub mod orchestrator;
pub mod prompt;
pub mod providers;

pub use completion::{CompletionClient, CompletionService};
pub use config::{Credentials, SettingsSnapshot};
pub use orchestrator::Orchestrator;
pub use prompt::{ChatTurn, Role};
pub use providers::{resolve, Provider, ProviderConfig};
