use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Sse};
use axum::routing::post;
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use guildmind_agents::providers::{
    ChatMessage, ChatRole, ContentBlock, LlmProvider, LlmRequest, MessagePart, OpenAiProvider,
    StreamEvent, ToolDefinition,
};
use guildmind_common::Result;
use serde_json::json;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type CapturedRequests = Arc<Mutex<Vec<serde_json::Value>>>;

async fn start_mock_server() -> (SocketAddr, CapturedRequests, oneshot::Sender<()>) {
    let (tx, rx) = oneshot::channel::<()>();
    let captured: CapturedRequests = Arc::new(Mutex::new(Vec::new()));
    let captured_clone = captured.clone();

    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |Json(payload): Json<serde_json::Value>| {
            let captured = captured_clone.clone();
            async move {
                captured.lock().unwrap().push(payload);
                mock_completion().await
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                rx.await.ok();
            })
            .await
            .unwrap();
    });

    (addr, captured, tx)
}

fn chunk(delta: serde_json::Value, finish_reason: Option<&str>) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "model": "gpt-4o",
        "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}]
    })
}

async fn mock_completion() -> impl IntoResponse {
    let chunks = vec![
        chunk(json!({"role": "assistant", "content": "Let me "}), None),
        chunk(json!({"content": "check."}), None),
        // tool call split across three fragments on index 0
        chunk(
            json!({"tool_calls": [{
                "index": 0,
                "id": "call_abc",
                "type": "function",
                "function": {"name": "read_messages", "arguments": ""}
            }]}),
            None,
        ),
        chunk(
            json!({"tool_calls": [{
                "index": 0,
                "function": {"arguments": "{\"channel_id\""}
            }]}),
            None,
        ),
        chunk(
            json!({"tool_calls": [{
                "index": 0,
                "function": {"arguments": ": \"555\"}"}
            }]}),
            None,
        ),
        chunk(json!({}), Some("tool_calls")),
    ];

    let mut events: Vec<std::result::Result<Event, io::Error>> = chunks
        .into_iter()
        .map(|c| Ok(Event::default().data(c.to_string())))
        .collect();
    events.push(Ok(Event::default().data("[DONE]")));

    Sse::new(stream::iter(events))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn request() -> LlmRequest {
    LlmRequest {
        model: "gpt-4o".to_string(),
        system: Some("You are a test assistant.".to_string()),
        messages: vec![ChatMessage::user("alice: hello")],
        max_tokens: 100,
        temperature: None,
        tools: vec![ToolDefinition {
            name: "read_messages".into(),
            description: "Read recent channel messages".into(),
            input_schema: json!({
                "type": "object",
                "properties": {"channel_id": {"type": "string"}},
                "required": ["channel_id"]
            }),
        }],
    }
}

#[tokio::test]
async fn stream_decodes_indexed_tool_call_fragments() -> Result<()> {
    let (addr, _captured, _shutdown_tx) = start_mock_server().await;
    let provider =
        OpenAiProvider::new("test-key".to_string(), Some(format!("http://{addr}/v1")));

    let mut stream = provider.stream(&request()).await?;
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event?);
    }

    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Let me check.");

    let arguments: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolCallDelta { index: 0, arguments, .. } => Some(arguments.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(arguments, "{\"channel_id\": \"555\"}");

    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::ToolCallDelta { id: Some(id), name: Some(name), .. }
            if id == "call_abc" && name == "read_messages"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::Finish { stop_reason: Some(reason) } if reason == "tool_calls"
    )));

    Ok(())
}

#[tokio::test]
async fn request_wire_shape_matches_openai() -> Result<()> {
    let (addr, captured, _shutdown_tx) = start_mock_server().await;
    let provider =
        OpenAiProvider::new("test-key".to_string(), Some(format!("http://{addr}/v1")));

    let mut req = request();
    // a full round: assistant tool call echo plus its result
    req.messages.push(ChatMessage {
        role: ChatRole::Assistant,
        content: MessagePart::Parts(vec![ContentBlock::ToolUse {
            id: "call_abc".into(),
            name: "read_messages".into(),
            input: json!({"channel_id": "555"}),
        }]),
    });
    req.messages.push(ChatMessage {
        role: ChatRole::Tool,
        content: MessagePart::Parts(vec![ContentBlock::ToolResult {
            tool_use_id: "call_abc".into(),
            content: "3 messages".into(),
        }]),
    });

    let mut stream = provider.stream(&req).await?;
    while let Some(event) = stream.next().await {
        event?;
    }

    let payloads = captured.lock().unwrap();
    let payload = &payloads[0];

    assert_eq!(payload["stream"], true);
    assert_eq!(payload["messages"][0]["role"], "system");
    assert_eq!(payload["messages"][1]["role"], "user");

    let assistant = &payload["messages"][2];
    assert_eq!(assistant["role"], "assistant");
    assert_eq!(assistant["tool_calls"][0]["id"], "call_abc");
    assert_eq!(
        assistant["tool_calls"][0]["function"]["name"],
        "read_messages"
    );

    let tool = &payload["messages"][3];
    assert_eq!(tool["role"], "tool");
    assert_eq!(tool["tool_call_id"], "call_abc");
    assert_eq!(tool["content"], "3 messages");

    let tool_decl = &payload["tools"][0];
    assert_eq!(tool_decl["type"], "function");
    assert_eq!(tool_decl["function"]["name"], "read_messages");
    assert_eq!(
        tool_decl["function"]["parameters"]["required"][0],
        "channel_id"
    );

    Ok(())
}
