use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use guildmind_common::{Error, Result};
use reqwest::Client;
use serde_json::json;

use super::{
    ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, LlmStream, MessagePart,
    StreamEvent,
};
use async_trait::async_trait;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    api_key: String,
    client: Client,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
            base_url: ANTHROPIC_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn process_messages(&self, messages: &[ChatMessage]) -> Result<Vec<serde_json::Value>> {
        let mut processed = Vec::new();

        for msg in messages {
            let content = match &msg.content {
                MessagePart::Text(text) => json!(text),
                MessagePart::Parts(parts) => {
                    let mut blocks = Vec::new();
                    for part in parts {
                        match part {
                            ContentBlock::Text { text } => {
                                blocks.push(json!({"type": "text", "text": text}));
                            }
                            ContentBlock::Image { url } => {
                                let (media_type, data) = self.fetch_image(url).await?;
                                blocks.push(json!({
                                    "type": "image",
                                    "source": {
                                        "type": "base64",
                                        "media_type": media_type,
                                        "data": data,
                                    }
                                }));
                            }
                            ContentBlock::ToolUse { id, name, input } => {
                                blocks.push(json!({
                                    "type": "tool_use",
                                    "id": id,
                                    "name": name,
                                    "input": input,
                                }));
                            }
                            ContentBlock::ToolResult {
                                tool_use_id,
                                content,
                            } => {
                                blocks.push(json!({
                                    "type": "tool_result",
                                    "tool_use_id": tool_use_id,
                                    "content": content,
                                }));
                            }
                        }
                    }
                    json!(blocks)
                }
            };

            processed.push(json!({
                "role": match msg.role {
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                    // Anthropic expects tool_result blocks under the user role
                    ChatRole::Tool => "user",
                },
                "content": content,
            }));
        }

        Ok(processed)
    }

    /// Resolve an image reference into `(media_type, base64 data)`. Data URLs
    /// are decoded in place; http(s) URLs are fetched.
    async fn fetch_image(&self, url: &str) -> Result<(String, String)> {
        if let Some(rest) = url.strip_prefix("data:") {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| Error::Provider("invalid data URL".into()))?;
            let media_type = meta.split(';').next().unwrap_or("image/jpeg");
            return Ok((media_type.to_string(), data.to_string()));
        }

        if url.starts_with("http") {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| Error::Provider(format!("image fetch failed: {e}")))?;
            let media_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("image/jpeg")
                .to_string();
            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::Provider(format!("image fetch failed: {e}")))?;
            return Ok((media_type, BASE64.encode(bytes)));
        }

        Err(Error::Provider("unsupported image URL scheme".into()))
    }

    async fn create_request_body(&self, request: &LlmRequest) -> Result<serde_json::Value> {
        let messages = self.process_messages(&request.messages).await?;

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "stream": true,
        });

        if let Some(system) = &request.system {
            body["system"] = json!(system);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        if !request.tools.is_empty() {
            body["tools"] = json!(
                request
                    .tools
                    .iter()
                    .map(super::ToolDefinition::to_anthropic)
                    .collect::<Vec<_>>()
            );
        }

        Ok(body)
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_id(&self) -> &str {
        "anthropic"
    }

    async fn stream(&self, request: &LlmRequest) -> Result<LlmStream> {
        let body = self.create_request_body(request).await?;

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("anthropic API error: {error_text}")));
        }

        let bytes = response.bytes_stream().boxed();
        let buffer = Vec::new();

        let events = stream::try_unfold(
            (bytes, buffer),
            |(mut bytes, mut buffer): (BoxStream<'static, reqwest::Result<Bytes>>, Vec<u8>)| async move {
                loop {
                    if let Some(i) = buffer.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = buffer.drain(0..=i).collect();
                        let line = String::from_utf8_lossy(&line_bytes).trim().to_string();

                        if let Some(data) = line.strip_prefix("data: ") {
                            if let Ok(value) = serde_json::from_str::<serde_json::Value>(data) {
                                if let Some(event) = decode_event(&value) {
                                    return Ok(Some((event, (bytes, buffer))));
                                }
                            }
                        }
                        continue;
                    }

                    match bytes.next().await {
                        Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                        Some(Err(e)) => {
                            return Err(Error::Provider(format!("anthropic stream error: {e}")));
                        }
                        None => return Ok(None),
                    }
                }
            },
        );

        Ok(Box::pin(events))
    }
}

/// Decode one raw Anthropic SSE payload into a [`StreamEvent`]. Returns
/// `None` for events the loop does not consume (ping, message_start,
/// message_stop).
fn decode_event(value: &serde_json::Value) -> Option<StreamEvent> {
    match value["type"].as_str().unwrap_or_default() {
        "content_block_start" => {
            let index = value["index"].as_u64().unwrap_or(0) as u32;
            let block = &value["content_block"];
            if block["type"].as_str() == Some("tool_use") {
                Some(StreamEvent::ToolCallDelta {
                    index,
                    id: block["id"].as_str().map(str::to_string),
                    name: block["name"].as_str().map(str::to_string),
                    arguments: String::new(),
                })
            } else {
                None
            }
        }
        "content_block_delta" => {
            let index = value["index"].as_u64().unwrap_or(0) as u32;
            let delta = &value["delta"];
            match delta["type"].as_str().unwrap_or_default() {
                "text_delta" => Some(StreamEvent::TextDelta(
                    delta["text"].as_str().unwrap_or_default().to_string(),
                )),
                "input_json_delta" => Some(StreamEvent::ToolCallDelta {
                    index,
                    id: None,
                    name: None,
                    arguments: delta["partial_json"].as_str().unwrap_or_default().to_string(),
                }),
                _ => None,
            }
        }
        "content_block_stop" => Some(StreamEvent::ContentBlockStop {
            index: value["index"].as_u64().unwrap_or(0) as u32,
        }),
        "message_delta" => Some(StreamEvent::Finish {
            stop_reason: value["delta"]["stop_reason"].as_str().map(str::to_string),
        }),
        _ => None,
    }
}
