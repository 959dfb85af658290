use async_trait::async_trait;
use guildmind_common::Result;

use crate::context::TurnContext;

/// A named, schema-described operation the model may request.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema for the tool's arguments. The `required` list must be a
    /// subset of `properties`.
    fn input_schema(&self) -> serde_json::Value;

    async fn execute(&self, ctx: &TurnContext, args: serde_json::Value) -> Result<ToolOutput>;
}

/// Normalized tool output: the text folded back into the conversation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}
