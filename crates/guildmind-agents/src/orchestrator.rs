use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use guildmind_common::Result;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::context::TurnContext;
use crate::executor::{ToolExecutor, ToolOutcome};
use crate::images::{ImageGenerator, ImageSize};
use crate::providers::{
    ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, MessagePart, StreamEvent,
};
use crate::registry::ToolRegistry;
use crate::render::IncrementalRenderer;

/// Per-turn tuning for the orchestration loop.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    /// Upper bound on LLM round-trips within one turn.
    pub max_tool_rounds: usize,
}

/// A finalized tool call, reassembled from stream fragments.
#[derive(Debug, Clone)]
struct ToolCallRequest {
    id: String,
    name: String,
    arguments: Value,
}

/// Per-index accumulator for a tool call arriving as fragments.
#[derive(Debug, Default)]
struct ToolCallBuffer {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl ToolCallBuffer {
    fn merge(&mut self, id: Option<String>, name: Option<String>, arguments: &str) {
        // id: first non-null wins; name: first write wins; arguments concatenate
        if self.id.is_none() {
            self.id = id;
        }
        if self.name.is_empty() {
            if let Some(name) = name {
                self.name = name;
            }
        }
        self.arguments.push_str(arguments);
    }

    fn finalize(self, index: u32, round_text: &str) -> ToolCallRequest {
        ToolCallRequest {
            id: self.id.unwrap_or_else(|| format!("call_{index}")),
            arguments: parse_tool_arguments(&self.arguments, round_text, &self.name),
            name: self.name,
        }
    }
}

/// Drives the multi-round conversation: stream the model, reassemble tool
/// calls, execute them in emission order, fold results back, repeat until a
/// round produces no calls or the round cap is hit.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    executor: ToolExecutor,
    image_generator: Option<Arc<dyn ImageGenerator>>,
    config: TurnConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        image_generator: Option<Arc<dyn ImageGenerator>>,
        config: TurnConfig,
    ) -> Self {
        Self {
            provider,
            executor: ToolExecutor::new(registry.clone()),
            registry,
            image_generator,
            config,
        }
    }

    /// Run one full conversation turn. Render failures are absorbed by the
    /// renderer; a provider failure aborts the turn and the caller is
    /// responsible for showing the user something.
    #[instrument(skip_all, fields(channel_id = ctx.channel_id, message_id = ctx.message_id))]
    pub async fn run_turn(
        &self,
        ctx: &TurnContext,
        system: String,
        mut messages: Vec<ChatMessage>,
        renderer: &mut IncrementalRenderer,
    ) -> Result<()> {
        let tool_defs = self.registry.definitions();
        let mut display_text = String::new();

        for round in 1..=self.config.max_tool_rounds {
            let request = LlmRequest {
                model: self.config.model.clone(),
                system: Some(system.clone()),
                messages: messages.clone(),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                tools: tool_defs.clone(),
            };

            debug!(round, provider = self.provider.provider_id(), "requesting completion");
            let mut stream = self.provider.stream(&request).await?;

            let mut round_text = String::new();
            let mut pending: BTreeMap<u32, ToolCallBuffer> = BTreeMap::new();
            let mut calls: Vec<ToolCallRequest> = Vec::new();

            while let Some(event) = stream.next().await {
                match event? {
                    StreamEvent::TextDelta(text) => {
                        round_text.push_str(&text);
                        display_text.push_str(&text);
                        renderer.update(&display_text, false).await;
                    }
                    StreamEvent::ToolCallDelta {
                        index,
                        id,
                        name,
                        arguments,
                    } => {
                        pending
                            .entry(index)
                            .or_default()
                            .merge(id, name, &arguments);
                    }
                    StreamEvent::ContentBlockStop { index } => {
                        if let Some(buffer) = pending.remove(&index) {
                            if !buffer.name.is_empty() {
                                calls.push(buffer.finalize(index, &round_text));
                            }
                        }
                    }
                    StreamEvent::Finish { stop_reason } => {
                        if let Some(reason) = stop_reason {
                            debug!(round, stop_reason = %reason, "stream finished");
                        }
                    }
                }
            }

            // Providers without per-block stop events finalize at stream end.
            for (index, buffer) in std::mem::take(&mut pending) {
                if !buffer.name.is_empty() {
                    calls.push(buffer.finalize(index, &round_text));
                }
            }

            if calls.is_empty() {
                if !round_text.is_empty() {
                    messages.push(ChatMessage::assistant(round_text));
                }
                info!(round, "no tool calls, turn complete");
                renderer.finish(&display_text).await;
                return Ok(());
            }

            // Echo the model's request back into the conversation before any
            // result message; providers reject tool results that do not
            // follow the assistant turn that asked for them.
            let mut blocks: Vec<ContentBlock> = Vec::new();
            if !round_text.is_empty() {
                blocks.push(ContentBlock::Text {
                    text: round_text.clone(),
                });
            }
            for call in &calls {
                blocks.push(ContentBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: call.arguments.clone(),
                });
            }
            messages.push(ChatMessage {
                role: ChatRole::Assistant,
                content: MessagePart::Parts(blocks),
            });

            info!(round, count = calls.len(), "executing tool calls");
            let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
            renderer
                .update(&with_notice(&display_text, &format!("🛠️ running `{}`...", names.join(", "))), true)
                .await;

            let mut results: Vec<ContentBlock> = Vec::new();
            let mut image_generated = false;
            for call in &calls {
                let outcome = self
                    .executor
                    .execute(&call.name, call.arguments.clone(), ctx)
                    .await;

                let content = match outcome {
                    ToolOutcome::Text(content) => content,
                    ToolOutcome::Error(message) => {
                        renderer
                            .update(
                                &with_notice(
                                    &display_text,
                                    &format!("tool `{}` failed: {message}", call.name),
                                ),
                                true,
                            )
                            .await;
                        format!("tool execution failed: {message}")
                    }
                    ToolOutcome::Image { prompt, size } => {
                        let ack = self.run_image_flow(&display_text, &prompt, size, renderer).await;
                        image_generated = true;
                        ack
                    }
                };
                results.push(ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content,
                });

                if image_generated {
                    break;
                }
            }

            messages.push(ChatMessage {
                role: ChatRole::Tool,
                content: MessagePart::Parts(results),
            });

            // Image generation ends the turn; the reply now shows the image.
            if image_generated {
                info!(round, "image generated, turn complete");
                return Ok(());
            }

            renderer.update(&display_text, true).await;

            if round == self.config.max_tool_rounds {
                warn!("maximum tool rounds reached");
                display_text.push_str(&format!(
                    "\n\n[maximum tool rounds reached ({})]",
                    self.config.max_tool_rounds
                ));
                renderer.finish(&display_text).await;
                return Ok(());
            }
        }

        Ok(())
    }

    /// Separate flow for image generation: progress notice, generate, show
    /// the result, and return the tool-result acknowledgment text.
    async fn run_image_flow(
        &self,
        display_text: &str,
        prompt: &str,
        size: ImageSize,
        renderer: &mut IncrementalRenderer,
    ) -> String {
        let Some(generator) = &self.image_generator else {
            warn!("image generation requested but no generator configured");
            let notice = "image generation is not configured";
            renderer.update(&with_notice(display_text, notice), true).await;
            return notice.to_string();
        };

        renderer
            .update(&with_notice(display_text, "🎨 generating image..."), true)
            .await;

        match generator.generate(prompt, size).await {
            Ok(url) => {
                renderer
                    .update(
                        &with_notice(display_text, &format!("Generated image: {prompt}\n{url}")),
                        true,
                    )
                    .await;
                format!("Image generated for prompt '{prompt}'")
            }
            Err(e) => {
                warn!("image generation failed: {e}");
                renderer
                    .update(
                        &with_notice(display_text, &format!("image generation failed: {e}")),
                        true,
                    )
                    .await;
                format!("image generation failed: {e}")
            }
        }
    }
}

/// Append a transient notice below the accumulated text; the notice stands
/// alone when the model has produced no text yet.
fn with_notice(display_text: &str, notice: &str) -> String {
    if display_text.is_empty() {
        notice.to_string()
    } else {
        format!("{display_text}\n\n{notice}")
    }
}

/// Parse a reassembled tool-call argument string. Malformed JSON falls back
/// to a fenced block in the round's free text, then to a quoted-prompt
/// extraction for `generate_image`. Everything failing yields an empty
/// object so the call dies at required-field validation instead of silently.
fn parse_tool_arguments(raw: &str, round_text: &str, tool_name: &str) -> Value {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
            return value;
        }
        warn!(tool = tool_name, "tool arguments are not valid JSON: {trimmed}");
    }

    if let Some(value) = extract_fenced_json(round_text) {
        info!(tool = tool_name, "recovered arguments from fenced block");
        return value;
    }

    if tool_name == "generate_image" {
        if let Some(prompt) = extract_quoted_prompt(round_text) {
            info!("recovered image prompt from free text");
            return json!({"prompt": prompt, "size": 0});
        }
    }

    json!({})
}

fn extract_fenced_json(text: &str) -> Option<Value> {
    let re = regex::Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").ok()?;
    let captured = re.captures(text)?.get(1)?.as_str();
    match serde_json::from_str::<Value>(captured) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn extract_quoted_prompt(text: &str) -> Option<String> {
    let re = regex::Regex::new(r#"(?i)image[^"'\n]*["']([^"']+)["']"#).ok()?;
    Some(re.captures(text)?.get(1)?.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_json_arguments_parse_directly() {
        let args = parse_tool_arguments(r#"{"channel_id": "1"}"#, "", "send_message");
        assert_eq!(args["channel_id"], "1");
    }

    #[test]
    fn fenced_block_is_the_first_fallback() {
        let text = "Let me send that.\n```json\n{\"content\": \"hi\"}\n```";
        let args = parse_tool_arguments("not json", text, "send_message");
        assert_eq!(args["content"], "hi");
    }

    #[test]
    fn image_prompt_is_extracted_from_free_text() {
        let text = "I'll generate an image of 'a calm sea at dusk' for you.";
        let args = parse_tool_arguments("", text, "generate_image");
        assert_eq!(args["prompt"], "a calm sea at dusk");
        assert_eq!(args["size"], 0);
    }

    #[test]
    fn everything_failing_yields_empty_object() {
        let args = parse_tool_arguments("garbage", "no json here", "send_message");
        assert_eq!(args, json!({}));
    }

    #[test]
    fn buffer_merge_policies() {
        let mut buffer = ToolCallBuffer::default();
        buffer.merge(None, Some("send_message".into()), "{\"a\":");
        buffer.merge(Some("call_1".into()), Some("other".into()), "1}");
        buffer.merge(Some("call_2".into()), None, "");

        assert_eq!(buffer.id.as_deref(), Some("call_1"));
        assert_eq!(buffer.name, "send_message");
        assert_eq!(buffer.arguments, "{\"a\":1}");
    }
}
