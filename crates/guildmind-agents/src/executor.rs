use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::TurnContext;
use crate::images::ImageSize;
use crate::registry::ToolRegistry;

/// Ambient id parameters the executor fills in from the turn context when
/// the model omits them.
const AMBIENT_KEYS: [&str; 3] = ["message_id", "channel_id", "server_id"];

/// Normalized result of one tool dispatch.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    /// Success; the text is folded back into the conversation verbatim.
    Text(String),

    /// Image generation is not executed through the generic handler path;
    /// the orchestrator drives a separate generation + message-edit flow.
    Image { prompt: String, size: ImageSize },

    /// Argument validation or handler failure. Reported back to the model as
    /// a tool-result message; the loop continues and the model may retry.
    Error(String),
}

/// Validates arguments and dispatches tool calls against the registry.
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub async fn execute(&self, name: &str, arguments: Value, ctx: &TurnContext) -> ToolOutcome {
        let mut args = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        // Image generation short-circuits before the generic path.
        if name == "generate_image" {
            if let Some(prompt) = args.get("prompt").and_then(Value::as_str) {
                let size = ImageSize::from_index(args.get("size").and_then(Value::as_u64).unwrap_or(0));
                return ToolOutcome::Image {
                    prompt: prompt.to_string(),
                    size,
                };
            }
        }

        let Some(tool) = self.registry.get(name) else {
            return ToolOutcome::Error(format!("unknown tool: {name}"));
        };

        let schema = tool.input_schema();
        fill_ambient_arguments(&mut args, &schema, ctx);

        if let Some(missing) = missing_required(&args, &schema) {
            warn!(tool = name, "missing required parameters: {}", missing.join(", "));
            return ToolOutcome::Error(format!(
                "missing required parameters: {}",
                missing.join(", ")
            ));
        }

        debug!(tool = name, "executing tool");
        match tool.execute(ctx, Value::Object(args)).await {
            Ok(output) if output.content.trim().is_empty() => {
                ToolOutcome::Text(format!("{name} completed with no output"))
            }
            Ok(output) => ToolOutcome::Text(output.content),
            Err(e) => {
                warn!(tool = name, "tool execution failed: {e}");
                ToolOutcome::Error(e.to_string())
            }
        }
    }
}

/// Inject ambient ids from the turn context for parameters the tool declares
/// but the caller left out. Runs before required-field validation and never
/// overwrites an explicitly supplied value.
fn fill_ambient_arguments(args: &mut Map<String, Value>, schema: &Value, ctx: &TurnContext) {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return;
    };

    for key in AMBIENT_KEYS {
        if !properties.contains_key(key) {
            continue;
        }
        let absent = match args.get(key) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if absent {
            if let Some(value) = ctx.ambient_value(key) {
                debug!("auto-filled {key}={value} from turn context");
                args.insert(key.to_string(), Value::String(value));
            }
        }
    }
}

/// Names of required parameters absent from the arguments, or `None` when
/// everything is present.
fn missing_required(args: &Map<String, Value>, schema: &Value) -> Option<Vec<String>> {
    let required = schema.get("required")?.as_array()?;
    let missing: Vec<String> = required
        .iter()
        .filter_map(Value::as_str)
        .filter(|key| !args.contains_key(*key))
        .map(str::to_string)
        .collect();

    if missing.is_empty() { None } else { Some(missing) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_context;
    use crate::tools::{Tool, ToolOutput};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records the arguments it was invoked with and echoes a fixed reply.
    struct RecordingTool {
        reply: &'static str,
        calls: Mutex<Vec<Value>>,
    }

    impl RecordingTool {
        fn new(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &'static str {
            "send_message"
        }

        fn description(&self) -> &'static str {
            "Send a message to a channel"
        }

        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "channel_id": {"type": "string", "description": "Discord channel id"},
                    "content": {"type": "string", "description": "Message body"}
                },
                "required": ["channel_id", "content"]
            })
        }

        async fn execute(&self, _ctx: &TurnContext, args: Value) -> guildmind_common::Result<ToolOutput> {
            self.calls.lock().unwrap().push(args);
            Ok(ToolOutput::text(self.reply))
        }
    }

    fn executor_with(tool: Arc<RecordingTool>) -> ToolExecutor {
        let registry = ToolRegistry::from_tools([tool as Arc<dyn Tool>]).unwrap();
        ToolExecutor::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn missing_required_fields_are_named_and_handler_not_invoked() {
        let tool = RecordingTool::new("sent");
        let executor = executor_with(tool.clone());

        // channel_id auto-fills from context, content cannot
        let outcome = executor
            .execute("send_message", json!({}), &test_context())
            .await;

        match outcome {
            ToolOutcome::Error(msg) => {
                assert!(msg.contains("content"), "{msg}");
                assert!(!msg.contains("channel_id"), "{msg}");
            }
            other => panic!("expected error outcome, got {other:?}"),
        }
        assert!(tool.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ambient_ids_fill_but_never_overwrite() {
        let tool = RecordingTool::new("sent");
        let executor = executor_with(tool.clone());
        let ctx = test_context();

        let outcome = executor
            .execute("send_message", json!({"content": "hi"}), &ctx)
            .await;
        assert!(matches!(outcome, ToolOutcome::Text(ref t) if t == "sent"));

        let outcome = executor
            .execute(
                "send_message",
                json!({"content": "hi", "channel_id": "42"}),
                &ctx,
            )
            .await;
        assert!(matches!(outcome, ToolOutcome::Text(_)));

        let calls = tool.calls.lock().unwrap();
        assert_eq!(calls[0]["channel_id"], ctx.channel_id.to_string());
        assert_eq!(calls[1]["channel_id"], "42");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_outcome() {
        let executor = executor_with(RecordingTool::new("sent"));
        let outcome = executor.execute("no_such_tool", json!({}), &test_context()).await;
        assert!(matches!(outcome, ToolOutcome::Error(ref m) if m.contains("unknown tool")));
    }

    #[tokio::test]
    async fn blank_output_becomes_placeholder() {
        let tool = RecordingTool::new("   ");
        let executor = executor_with(tool);
        let outcome = executor
            .execute("send_message", json!({"content": "hi"}), &test_context())
            .await;
        assert!(
            matches!(outcome, ToolOutcome::Text(ref t) if t == "send_message completed with no output")
        );
    }

    #[tokio::test]
    async fn generate_image_short_circuits() {
        let executor = executor_with(RecordingTool::new("sent"));
        let outcome = executor
            .execute(
                "generate_image",
                json!({"prompt": "a red fox", "size": 1}),
                &test_context(),
            )
            .await;

        match outcome {
            ToolOutcome::Image { prompt, size } => {
                assert_eq!(prompt, "a red fox");
                assert_eq!(size, ImageSize::Landscape);
            }
            other => panic!("expected image outcome, got {other:?}"),
        }
    }
}
