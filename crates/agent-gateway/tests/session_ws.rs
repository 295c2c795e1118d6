//! Drives the gateway over a real WebSocket connection, the way a browser
//! client or `agent-client-sdk` would.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use agent_core::{Event, ScriptedProvider, ToolRegistry};
use agent_gateway::config::GatewayConfig;
use agent_gateway::state::AppState;
use agent_gateway::storage::MemoryStorage;
use agent_protocol::WsMessage;

async fn spawn_gateway(provider: ScriptedProvider) -> String {
    let config = GatewayConfig {
        bind: "127.0.0.1:0".into(),
        system_prompt: None,
        default_tool_timeout_ms: agent_protocol::DEFAULT_TOOL_TIMEOUT_MS,
        token: None,
        openai_base_url: String::new(),
        openai_api_key: None,
        openai_model: String::new(),
    };
    let state = AppState::new(
        config,
        ToolRegistry::with_builtins(),
        Arc::new(provider),
        Arc::new(MemoryStorage::new()),
    );
    let app = agent_gateway::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/v1/sessions/ws?session_id=test-session")
}

#[tokio::test]
async fn user_message_round_trips_to_an_agent_response() {
    let provider = ScriptedProvider::new(vec![vec![Event::text("hello back")]]);
    let url = spawn_gateway(provider).await;

    let (ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let (mut write, mut read) = ws.split();

    write
        .send(Message::Text(
            serde_json::to_string(&WsMessage::UserMessage {
                content: "hi".into(),
            })
            .unwrap(),
        ))
        .await
        .unwrap();

    let response = loop {
        let Some(Ok(Message::Text(text))) = read.next().await else {
            panic!("connection closed before a response arrived");
        };
        if let Ok(WsMessage::AgentResponse { content, done, .. }) =
            serde_json::from_str::<WsMessage>(&text)
        {
            break (content, done);
        }
    };

    assert_eq!(response.0, "hello back");
    assert!(response.1);
}

#[tokio::test]
async fn context_update_is_acknowledged_with_a_context_sync() {
    let provider = ScriptedProvider::new(vec![]);
    let url = spawn_gateway(provider).await;

    let (ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    let (mut write, mut read) = ws.split();

    write
        .send(Message::Text(
            serde_json::to_string(&WsMessage::ContextUpdate {
                context: agent_protocol::ClientContext {
                    page_id: Some("settings".into()),
                    ..Default::default()
                },
            })
            .unwrap(),
        ))
        .await
        .unwrap();

    let Some(Ok(Message::Text(text))) = read.next().await else {
        panic!("connection closed before context_sync arrived");
    };
    match serde_json::from_str::<WsMessage>(&text).unwrap() {
        WsMessage::ContextSync { context, available_tools } => {
            assert_eq!(context.page_id.as_deref(), Some("settings"));
            assert!(available_tools.contains(&"get_current_context".to_string()));
        }
        other => panic!("expected context_sync, got {other:?}"),
    }
}
