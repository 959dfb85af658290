pub mod context;
pub mod conversation;
pub mod executor;
pub mod images;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod registry;
pub mod render;
pub mod tools;

pub use context::TurnContext;
pub use conversation::{ConversationBuilder, HistorySource, HistoryTurn, ImageAttachment};
pub use executor::{ToolExecutor, ToolOutcome};
pub use images::{ImageGenerator, ImageSize, OpenAiImageClient};
pub use orchestrator::{Orchestrator, TurnConfig};
pub use providers::{
    AnthropicProvider, ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, LlmStream,
    MessagePart, OpenAiProvider, StreamEvent, ToolDefinition,
};
pub use registry::ToolRegistry;
pub use render::{IncrementalRenderer, ReplySurface, MESSAGE_CHAR_LIMIT};
pub use tools::{Tool, ToolOutput};
