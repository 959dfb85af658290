use async_trait::async_trait;
use futures::stream::BoxStream;
use guildmind_common::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

pub type LlmStream = BoxStream<'static, Result<StreamEvent>>;

/// Trait for LLM provider integrations (Anthropic, OpenAI).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g. "anthropic", "openai").
    fn provider_id(&self) -> &str;

    /// Send a streaming completion request and return the decoded event
    /// stream.
    async fn stream(&self, request: &LlmRequest) -> Result<LlmStream>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub tools: Vec<ToolDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: MessagePart,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: MessagePart::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: MessagePart::Text(text.into()),
        }
    }
}

/// Conversation roles. The system prompt travels out-of-band in
/// [`LlmRequest::system`], which is the shape both providers want.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePart {
    Text(String),
    Parts(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image")]
    Image { url: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// One incremental event from a provider stream, decoded at the provider
/// boundary into a closed set so the orchestration loop can match
/// exhaustively.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A fragment of assistant free text.
    TextDelta(String),

    /// A fragment of a tool call, keyed by the stream's positional index.
    /// `id` and `name` arrive on some fragments only; `arguments` is a raw
    /// JSON text fragment to be concatenated, not yet parsed.
    ToolCallDelta {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },

    /// The content block at `index` is complete.
    ContentBlockStop { index: u32 },

    /// The provider signalled the end of the response.
    Finish { stop_reason: Option<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    /// OpenAI function-calling declaration shape.
    pub fn to_openai(&self) -> serde_json::Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema,
            }
        })
    }

    /// Anthropic tool declaration shape.
    pub fn to_anthropic(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.input_schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "send_message".into(),
            description: "Send a message to a channel".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "channel_id": {"type": "string", "description": "Discord channel id"},
                    "content": {"type": "string", "description": "Message body"}
                },
                "required": ["channel_id", "content"]
            }),
        }
    }

    #[test]
    fn openai_format_is_lossless() {
        let def = definition();
        let v = def.to_openai();

        assert_eq!(v["type"], "function");
        assert_eq!(v["function"]["name"], def.name.as_str());
        assert_eq!(v["function"]["description"], def.description.as_str());
        assert_eq!(v["function"]["parameters"], def.input_schema);
    }

    #[test]
    fn anthropic_format_is_lossless() {
        let def = definition();
        let v = def.to_anthropic();

        assert_eq!(v["name"], def.name.as_str());
        assert_eq!(v["description"], def.description.as_str());
        assert_eq!(v["input_schema"], def.input_schema);
    }
}
