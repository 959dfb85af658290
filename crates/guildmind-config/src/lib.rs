pub mod loader;
pub mod model;

pub use model::{AppConfig, ChatConfig, DiscordConfig, LlmConfig, ProviderKind};
