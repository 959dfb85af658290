use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Sse};
use axum::routing::post;
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use guildmind_agents::providers::{
    AnthropicProvider, ChatMessage, LlmProvider, LlmRequest, StreamEvent, ToolDefinition,
};
use guildmind_common::Result;
use serde_json::json;
use std::io;
use std::net::SocketAddr;
use tokio::sync::oneshot;

async fn start_mock_server() -> (SocketAddr, oneshot::Sender<()>) {
    let (tx, rx) = oneshot::channel::<()>();

    let app = Router::new().route("/v1/messages", post(mock_messages));

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

    (addr, tx)
}

async fn mock_messages(Json(_payload): Json<serde_json::Value>) -> impl IntoResponse {
    let events = vec![
        json!({
            "type": "message_start",
            "message": {
                "id": "msg_123",
                "type": "message",
                "role": "assistant",
                "content": [],
                "model": "claude-sonnet-4-20250514",
                "stop_reason": null,
                "usage": {"input_tokens": 10, "output_tokens": 1}
            }
        }),
        json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": {"type": "text", "text": ""}
        }),
        json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": "Checking"}
        }),
        json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": " that now."}
        }),
        json!({"type": "content_block_stop", "index": 0}),
        json!({
            "type": "content_block_start",
            "index": 1,
            "content_block": {"type": "tool_use", "id": "toolu_01", "name": "get_server_info", "input": {}}
        }),
        json!({
            "type": "content_block_delta",
            "index": 1,
            "delta": {"type": "input_json_delta", "partial_json": "{\"server_id\":"}
        }),
        json!({
            "type": "content_block_delta",
            "index": 1,
            "delta": {"type": "input_json_delta", "partial_json": " \"123\"}"}
        }),
        json!({"type": "content_block_stop", "index": 1}),
        json!({
            "type": "message_delta",
            "delta": {"stop_reason": "tool_use", "stop_sequence": null},
            "usage": {"output_tokens": 20}
        }),
        json!({"type": "message_stop"}),
    ];

    let stream = stream::iter(
        events
            .into_iter()
            .map(|e| Ok::<_, io::Error>(Event::default().data(e.to_string()))),
    );

    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

fn request() -> LlmRequest {
    LlmRequest {
        model: "claude-sonnet-4-20250514".to_string(),
        system: Some("You are a test assistant.".to_string()),
        messages: vec![ChatMessage::user("alice: hello")],
        max_tokens: 100,
        temperature: Some(0.7),
        tools: vec![ToolDefinition {
            name: "get_server_info".into(),
            description: "Look up server information".into(),
            input_schema: json!({
                "type": "object",
                "properties": {"server_id": {"type": "string"}},
                "required": ["server_id"]
            }),
        }],
    }
}

#[tokio::test]
async fn stream_decodes_text_and_tool_fragments() -> Result<()> {
    let (addr, _shutdown_tx) = start_mock_server().await;
    let provider = AnthropicProvider::new("test-key".to_string())
        .with_base_url(format!("http://{addr}/v1/messages"));

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
    assert_eq!(text, "Checking that now.");

    // tool_use start carries id + name; the json deltas carry only fragments
    let starts: Vec<_> = events
        .iter()
        .filter(|e| {
            matches!(
                e,
                StreamEvent::ToolCallDelta { id: Some(id), name: Some(name), .. }
                    if id == "toolu_01" && name == "get_server_info"
            )
        })
        .collect();
    assert_eq!(starts.len(), 1);

    let arguments: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ToolCallDelta { index: 1, arguments, .. } => Some(arguments.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(arguments, "{\"server_id\": \"123\"}");

    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::ContentBlockStop { index: 1 }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::Finish { stop_reason: Some(reason) } if reason == "tool_use"
    )));

    Ok(())
}

#[tokio::test]
async fn api_error_surfaces_as_provider_error() {
    let app = Router::new().route(
        "/v1/messages",
        post(|| async {
            (
                axum::http::StatusCode::UNAUTHORIZED,
                "{\"error\": \"invalid api key\"}",
            )
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let provider = AnthropicProvider::new("bad-key".to_string())
        .with_base_url(format!("http://{addr}/v1/messages"));

    let result = provider.stream(&request()).await;
    match result {
        Err(guildmind_common::Error::Provider(msg)) => {
            assert!(msg.contains("invalid api key"), "{msg}");
        }
        other => panic!("expected provider error, got {:?}", other.map(|_| ())),
    }
}
