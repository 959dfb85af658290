use async_trait::async_trait;
use guildmind_agents::{Tool, ToolOutput, TurnContext};
use guildmind_common::Result;
use serde_json::{Value, json};

/// Schema-only declaration: the executor short-circuits `generate_image`
/// into the orchestrator's generation + message-edit flow, so this handler
/// never runs for a well-formed call.
pub struct GenerateImage;

#[async_trait]
impl Tool for GenerateImage {
    fn name(&self) -> &'static str {
        "generate_image"
    }

    fn description(&self) -> &'static str {
        "Generate an image with DALL-E"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string", "description": "Image prompt, in English"},
                "size": {"type": "integer", "description": "Image shape (0: square, 1: landscape, 2: portrait)", "enum": [0, 1, 2]}
            },
            "required": ["prompt", "size"]
        })
    }

    async fn execute(&self, _ctx: &TurnContext, args: Value) -> Result<ToolOutput> {
        let prompt = args.get("prompt").and_then(Value::as_str).unwrap_or("");
        Ok(ToolOutput::text(format!("Image generation requested: {prompt}")))
    }
}
