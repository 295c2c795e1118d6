//! Exercises the client-tool protocol end to end against an in-memory
//! transport: the orchestrator emits `agent:tool_invocation`, the test
//! harness plays the role of the client and feeds back `agent:tool_result`
//! / `agent:tool_error`, and a timeout is driven with `tokio`'s paused
//! clock rather than a real sleep.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use agent_core::{
    Event, Orchestrator, OutboundSink, ScriptedProvider, SessionState, SessionStorage,
    ToolCallRecord, ToolDefinition, ToolRegistry,
};
use agent_protocol::WsMessage;

struct RecordingSink {
    frames: Mutex<Vec<WsMessage>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
        }
    }

    fn last_invocation_call_id(&self) -> String {
        for frame in self.frames.lock().unwrap().iter().rev() {
            if let WsMessage::ToolInvocation { call_id, .. } = frame {
                return call_id.clone();
            }
        }
        panic!("no tool_invocation frame recorded");
    }

    fn last_response(&self) -> (String, bool) {
        for frame in self.frames.lock().unwrap().iter().rev() {
            if let WsMessage::AgentResponse { content, done, .. } = frame {
                return (content.clone(), *done);
            }
        }
        panic!("no agent_response frame recorded");
    }
}

#[async_trait]
impl OutboundSink for RecordingSink {
    async fn send(&self, msg: WsMessage) -> agent_core::Result<()> {
        self.frames.lock().unwrap().push(msg);
        Ok(())
    }
}

struct NullStorage;

#[async_trait]
impl SessionStorage for NullStorage {
    async fn load(&self, _session_id: &str) -> agent_core::Result<Option<SessionState>> {
        Ok(None)
    }
    async fn save(&self, _session_id: &str, _state: &SessionState) -> agent_core::Result<()> {
        Ok(())
    }
}

fn weather_tool() -> ToolDefinition {
    ToolDefinition::client(
        "get_weather",
        "Reads the weather widget currently on screen.",
        serde_json::json!({ "type": "object" }),
        Some(serde_json::json!({
            "type": "object",
            "required": ["tempC"],
            "properties": { "tempC": { "type": "number" } }
        })),
    )
}

#[tokio::test]
async fn client_tool_result_feeds_back_into_the_next_turn() {
    let call = ToolCallRecord {
        call_id: "will-be-overwritten".into(),
        tool_name: "get_weather".into(),
        args: serde_json::json!({}),
    };
    let provider = Arc::new(ScriptedProvider::new(vec![
        vec![Event::ToolCall(call)],
        vec![Event::text("it's 21 degrees")],
    ]));
    let mut registry = ToolRegistry::new();
    registry.register(weather_tool());
    let sink = Arc::new(RecordingSink::new());
    let orch = Arc::new(Orchestrator::new(
        "session-1",
        Arc::new(registry),
        provider,
        Arc::new(NullStorage),
        sink.clone(),
        SessionState::default(),
    ));

    let orch_for_client = orch.clone();
    let sink_for_client = sink.clone();
    let client = tokio::spawn(async move {
        // Give the orchestrator a moment to emit the invocation, then play
        // the client role.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        let call_id = sink_for_client.last_invocation_call_id();
        orch_for_client.handle_tool_result(&call_id, serde_json::json!({ "tempC": 21 }));
    });

    orch.handle_user_message("what's the weather".into())
        .await
        .unwrap();
    client.await.unwrap();

    let (content, done) = sink.last_response();
    assert_eq!(content, "it's 21 degrees");
    assert!(done);
}

#[tokio::test(start_paused = true)]
async fn client_tool_timeout_is_reported_back_to_the_provider() {
    let call = ToolCallRecord {
        call_id: "c1".into(),
        tool_name: "get_weather".into(),
        args: serde_json::json!({}),
    };
    let provider = Arc::new(ScriptedProvider::new(vec![
        vec![Event::ToolCall(call)],
        vec![Event::text("the tool timed out")],
    ]));
    let mut registry = ToolRegistry::new();
    registry.register(weather_tool().with_timeout_ms(50));
    let sink = Arc::new(RecordingSink::new());
    let orch = Orchestrator::new(
        "session-1",
        Arc::new(registry),
        provider,
        Arc::new(NullStorage),
        sink.clone(),
        SessionState::default(),
    );

    // No client ever resolves the call; the orchestrator's own timeout
    // fires against the paused clock.
    orch.handle_user_message("what's the weather".into())
        .await
        .unwrap();

    let (content, done) = sink.last_response();
    assert_eq!(content, "the tool timed out");
    assert!(done);
}

#[tokio::test]
async fn malformed_client_result_fails_schema_validation() {
    let call = ToolCallRecord {
        call_id: "c1".into(),
        tool_name: "get_weather".into(),
        args: serde_json::json!({}),
    };
    let provider = Arc::new(ScriptedProvider::new(vec![
        vec![Event::ToolCall(call)],
        vec![Event::text("got a validation error")],
    ]));
    let mut registry = ToolRegistry::new();
    registry.register(weather_tool());
    let sink = Arc::new(RecordingSink::new());
    let orch = Arc::new(Orchestrator::new(
        "session-1",
        Arc::new(registry),
        provider,
        Arc::new(NullStorage),
        sink.clone(),
        SessionState::default(),
    ));

    let orch_for_client = orch.clone();
    let sink_for_client = sink.clone();
    let client = tokio::spawn(async move {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        let call_id = sink_for_client.last_invocation_call_id();
        // Missing the required `tempC` field.
        orch_for_client.handle_tool_result(&call_id, serde_json::json!({ "humidity": 80 }));
    });

    orch.handle_user_message("what's the weather".into())
        .await
        .unwrap();
    client.await.unwrap();

    let (content, done) = sink.last_response();
    assert_eq!(content, "got a validation error");
    assert!(done);
}
