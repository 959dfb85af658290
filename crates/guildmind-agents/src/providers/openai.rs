use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use guildmind_common::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, LlmStream, MessagePart,
    StreamEvent,
};

#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        }
    }

    fn convert_request(&self, request: &LlmRequest) -> Result<OpenAiRequest> {
        let mut messages = Vec::new();

        if let Some(system) = &request.system {
            messages.push(OpenAiMessage::System {
                content: system.clone(),
            });
        }

        for msg in &request.messages {
            self.convert_message(msg, &mut messages)?;
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(super::ToolDefinition::to_openai).collect())
        };

        Ok(OpenAiRequest {
            model: request.model.clone(),
            messages,
            max_completion_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            tools,
            stream: true,
        })
    }

    fn convert_message(&self, msg: &ChatMessage, out: &mut Vec<OpenAiMessage>) -> Result<()> {
        match msg.role {
            ChatRole::User => {
                let content = match &msg.content {
                    MessagePart::Text(t) => OpenAiUserContent::Text(t.clone()),
                    MessagePart::Parts(parts) => {
                        let mut converted = Vec::new();
                        for part in parts {
                            match part {
                                ContentBlock::Text { text } => {
                                    converted.push(OpenAiContentPart::Text { text: text.clone() });
                                }
                                ContentBlock::Image { url } => {
                                    converted.push(OpenAiContentPart::ImageUrl {
                                        image_url: OpenAiImageUrl {
                                            url: url.clone(),
                                            detail: Some("high".to_string()),
                                        },
                                    });
                                }
                                _ => {}
                            }
                        }
                        OpenAiUserContent::Parts(converted)
                    }
                };
                out.push(OpenAiMessage::User { content });
            }
            ChatRole::Assistant => {
                let mut content = None;
                let mut tool_calls = Vec::new();

                match &msg.content {
                    MessagePart::Text(t) => content = Some(t.clone()),
                    MessagePart::Parts(parts) => {
                        let mut text_parts = Vec::new();
                        for part in parts {
                            match part {
                                ContentBlock::Text { text } => text_parts.push(text.clone()),
                                ContentBlock::ToolUse { id, name, input } => {
                                    tool_calls.push(OpenAiToolCall {
                                        id: id.clone(),
                                        kind: "function".to_string(),
                                        function: OpenAiFunctionCall {
                                            name: name.clone(),
                                            arguments: serde_json::to_string(input)
                                                .unwrap_or_default(),
                                        },
                                    });
                                }
                                _ => {}
                            }
                        }
                        if !text_parts.is_empty() {
                            content = Some(text_parts.join("\n"));
                        }
                    }
                }

                out.push(OpenAiMessage::Assistant {
                    content,
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                });
            }
            ChatRole::Tool => {
                // One OpenAI tool message per result block.
                let MessagePart::Parts(parts) = &msg.content else {
                    return Err(Error::Provider(
                        "tool message must carry tool_result blocks".into(),
                    ));
                };
                for part in parts {
                    if let ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                    } = part
                    {
                        out.push(OpenAiMessage::Tool {
                            tool_call_id: tool_use_id.clone(),
                            content: content.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        "openai"
    }

    async fn stream(&self, request: &LlmRequest) -> Result<LlmStream> {
        let url = format!("{}/chat/completions", self.base_url);
        let openai_request = self.convert_request(request)?;

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&openai_request)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("openai request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!("openai API error: {error_text}")));
        }

        Ok(Box::pin(SseParser::new(response.bytes_stream())))
    }
}

// Request types

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    stream: bool,
}

#[derive(Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum OpenAiMessage {
    System {
        content: String,
    },
    User {
        content: OpenAiUserContent,
    },
    Assistant {
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<OpenAiToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Serialize)]
#[serde(untagged)]
enum OpenAiUserContent {
    Text(String),
    Parts(Vec<OpenAiContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAiContentPart {
    Text { text: String },
    ImageUrl { image_url: OpenAiImageUrl },
}

#[derive(Serialize)]
struct OpenAiImageUrl {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Serialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: OpenAiFunctionCall,
}

#[derive(Serialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

// Stream chunk types

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiStreamToolCall {
    index: u32,
    id: Option<String>,
    function: Option<OpenAiStreamFunctionCall>,
}

#[derive(Deserialize)]
struct OpenAiStreamFunctionCall {
    name: Option<String>,
    arguments: Option<String>,
}

/// Incremental SSE parser turning the chat-completions byte stream into
/// [`StreamEvent`]s.
struct SseParser {
    stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: Vec<u8>,
    queue: std::collections::VecDeque<Result<StreamEvent>>,
}

impl SseParser {
    fn new(stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static) -> Self {
        Self {
            stream: Box::pin(stream),
            buffer: Vec::new(),
            queue: std::collections::VecDeque::new(),
        }
    }

    fn decode_chunk(&mut self, data: &str) {
        match serde_json::from_str::<OpenAiStreamChunk>(data) {
            Ok(chunk) => {
                for choice in chunk.choices {
                    if let Some(content) = choice.delta.content {
                        if !content.is_empty() {
                            self.queue.push_back(Ok(StreamEvent::TextDelta(content)));
                        }
                    }

                    if let Some(tool_calls) = choice.delta.tool_calls {
                        for tc in tool_calls {
                            self.queue.push_back(Ok(StreamEvent::ToolCallDelta {
                                index: tc.index,
                                id: tc.id,
                                name: tc.function.as_ref().and_then(|f| f.name.clone()),
                                arguments: tc
                                    .function
                                    .as_ref()
                                    .and_then(|f| f.arguments.clone())
                                    .unwrap_or_default(),
                            }));
                        }
                    }

                    if let Some(reason) = choice.finish_reason {
                        self.queue.push_back(Ok(StreamEvent::Finish {
                            stop_reason: Some(reason),
                        }));
                    }
                }
            }
            Err(e) => {
                self.queue
                    .push_back(Err(Error::Provider(format!("openai chunk parse error: {e}"))));
            }
        }
    }

    /// Drain complete SSE messages (terminated by a blank line) out of the
    /// byte buffer into the event queue.
    fn drain_buffer(&mut self) {
        loop {
            let (pos, len) = if let Some(p) = self.buffer.windows(2).position(|w| w == b"\n\n") {
                (p, 2)
            } else if let Some(p) = self.buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                (p, 4)
            } else {
                return;
            };

            let msg_bytes: Vec<u8> = self.buffer.drain(..pos).collect();
            self.buffer.drain(..len);

            let Ok(msg) = String::from_utf8(msg_bytes) else {
                continue;
            };
            for line in msg.lines() {
                if let Some(data) = line.strip_prefix("data: ") {
                    if data.trim() == "[DONE]" {
                        continue;
                    }
                    self.decode_chunk(data);
                }
            }
        }
    }
}

impl Stream for SseParser {
    type Item = Result<StreamEvent>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.queue.pop_front() {
                return std::task::Poll::Ready(Some(item));
            }

            match self.stream.as_mut().poll_next(cx) {
                std::task::Poll::Ready(Some(Ok(chunk))) => {
                    self.buffer.extend_from_slice(&chunk);
                    self.drain_buffer();
                }
                std::task::Poll::Ready(Some(Err(e))) => {
                    return std::task::Poll::Ready(Some(Err(Error::Provider(format!(
                        "openai stream error: {e}"
                    )))));
                }
                std::task::Poll::Ready(None) => return std::task::Poll::Ready(None),
                std::task::Poll::Pending => return std::task::Poll::Pending,
            }
        }
    }
}
