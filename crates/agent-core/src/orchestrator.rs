//! The per-session agent loop.
//!
//! One [`Orchestrator`] owns one session: its message history, its current
//! client context, and the in-flight client-tool round trips. It is
//! transport-agnostic — frames destined for the client go through an
//! [`OutboundSink`] the façade supplies, so the same loop drives both the
//! production WebSocket façade and an in-process test harness.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::sync::{oneshot, Mutex};

use agent_protocol::{ClientContext, WsMessage, DEFAULT_TOOL_TIMEOUT_MS, MAX_TURNS};

use crate::error::Result;
use crate::message::{ChatMessage, ToolCallRecord};
use crate::provider::{Event, Provider};
use crate::storage::{SessionState, SessionStorage};
use crate::tool::{ToolRegistry, ToolSide};

/// Where a session's server -> client frames go. Implemented by the gateway
/// over the live WebSocket; a test harness can implement it over an
/// in-memory channel instead.
#[async_trait]
pub trait OutboundSink: Send + Sync {
    async fn send(&self, msg: WsMessage) -> Result<()>;
}

enum ClientToolOutcome {
    Ok(serde_json::Value),
    Err(String),
}

pub struct Orchestrator {
    registry: Arc<ToolRegistry>,
    provider: Arc<dyn Provider>,
    storage: Arc<dyn SessionStorage>,
    outbound: Arc<dyn OutboundSink>,
    session_id: String,
    default_tool_timeout_ms: u64,
    state: Mutex<SessionState>,
    /// Guards against a second `agent:user_message` arriving while a turn
    /// loop is already running for this session. A session handles one user
    /// message at a time; a concurrent arrival is rejected outright rather
    /// than queued, so the client always knows which message a response
    /// belongs to.
    busy: AtomicBool,
    pending: parking_lot::Mutex<HashMap<String, oneshot::Sender<ClientToolOutcome>>>,
}

impl Orchestrator {
    pub fn new(
        session_id: impl Into<String>,
        registry: Arc<ToolRegistry>,
        provider: Arc<dyn Provider>,
        storage: Arc<dyn SessionStorage>,
        outbound: Arc<dyn OutboundSink>,
        initial_state: SessionState,
    ) -> Self {
        Self {
            registry,
            provider,
            storage,
            outbound,
            session_id: session_id.into(),
            default_tool_timeout_ms: DEFAULT_TOOL_TIMEOUT_MS,
            state: Mutex::new(initial_state),
            busy: AtomicBool::new(false),
            pending: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_tool_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_tool_timeout_ms = timeout_ms;
        self
    }

    /// Applies a client-reported context (already merged client-side) and
    /// acknowledges with the tool list visible under it.
    pub async fn handle_context_update(&self, context: ClientContext) -> Result<()> {
        let available = {
            let mut state = self.state.lock().await;
            state.context = context.clone();
            self.registry
                .tools_for_context(&state.context)
                .iter()
                .map(|t| t.name.clone())
                .collect::<Vec<_>>()
        };
        self.persist_best_effort().await;
        self.outbound
            .send(WsMessage::ContextSync {
                context,
                available_tools: available,
            })
            .await
    }

    /// Resolves a pending client-tool call with a successful result.
    pub fn handle_tool_result(&self, call_id: &str, result: serde_json::Value) {
        if let Some(tx) = self.pending.lock().remove(call_id) {
            let _ = tx.send(ClientToolOutcome::Ok(result));
        }
    }

    /// Resolves a pending client-tool call with a failure.
    pub fn handle_tool_error(&self, call_id: &str, message: String) {
        if let Some(tx) = self.pending.lock().remove(call_id) {
            let _ = tx.send(ClientToolOutcome::Err(message));
        }
    }

    /// Runs the bounded reasoning loop for one user turn.
    pub async fn handle_user_message(&self, content: String) -> Result<()> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.outbound
                .send(WsMessage::AgentResponse {
                    content: "Error: a message is already being processed for this session".into(),
                    done: true,
                    suggested_actions: None,
                })
                .await?;
            return Ok(());
        }

        let result = self.run_turns(content).await;
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    async fn run_turns(&self, content: String) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.messages.push(ChatMessage::user(content));
        }
        self.persist_best_effort().await;

        for _ in 0..MAX_TURNS {
            let (events, context) = {
                let state = self.state.lock().await;
                let tools = self.registry.tools_for_context(&state.context);
                let events = self.provider.run(&state.messages, &tools).await?;
                (events, state.context.clone())
            };

            // The provider hands back a whole turn's events in one batch, so
            // whether this turn will dispatch tool calls is already known
            // before any text is streamed — that decides whether a text
            // event goes out now as an intermediate frame or waits to be
            // folded into the turn's one terminal frame.
            let has_tool_calls = events.iter().any(|e| matches!(e, Event::ToolCall(_)));

            let mut text = String::new();
            let mut tool_calls = Vec::new();
            let mut suggested_actions = None;
            for event in &events {
                match event {
                    Event::Text {
                        content,
                        suggested_actions: actions,
                        ..
                    } => {
                        if !text.is_empty() {
                            text.push('\n');
                        }
                        text.push_str(content);
                        if actions.is_some() {
                            suggested_actions = actions.clone();
                        }
                        if has_tool_calls {
                            self.outbound
                                .send(WsMessage::AgentResponse {
                                    content: content.clone(),
                                    done: false,
                                    suggested_actions: actions.clone(),
                                })
                                .await?;
                        }
                    }
                    Event::ToolCall(call) => tool_calls.push(call.clone()),
                    Event::Error(message) => {
                        self.outbound
                            .send(WsMessage::AgentResponse {
                                content: message.clone(),
                                done: true,
                                suggested_actions: None,
                            })
                            .await?;
                        return Ok(());
                    }
                }
            }

            if tool_calls.is_empty() {
                {
                    let mut state = self.state.lock().await;
                    state
                        .messages
                        .push(ChatMessage::assistant(Some(text.clone()), vec![]));
                }
                self.persist_best_effort().await;
                self.outbound
                    .send(WsMessage::AgentResponse {
                        content: text,
                        done: true,
                        suggested_actions,
                    })
                    .await?;
                return Ok(());
            }

            {
                let mut state = self.state.lock().await;
                state.messages.push(ChatMessage::assistant(
                    if text.is_empty() { None } else { Some(text) },
                    tool_calls.clone(),
                ));
            }

            // Dispatched sequentially, in the order the provider emitted
            // them — never concurrently. A provider that issues a
            // read-then-write pair of calls relies on that ordering.
            for call in &tool_calls {
                let outcome = self.dispatch_one(call, &context).await;
                let mut state = self.state.lock().await;
                state.messages.push(ChatMessage::tool_result(
                    call.call_id.clone(),
                    outcome,
                ));
            }
            self.persist_best_effort().await;
        }

        self.outbound
            .send(WsMessage::AgentResponse {
                content: "Turn limit reached".into(),
                done: true,
                suggested_actions: None,
            })
            .await?;
        Ok(())
    }

    /// Dispatches one tool call and returns the JSON-encoded string to
    /// record as the tool-result message content. Never returns an `Err` —
    /// failures are encoded into the content so the provider can see and
    /// react to them on the next turn.
    async fn dispatch_one(&self, call: &ToolCallRecord, context: &ClientContext) -> String {
        // Re-checked here, not when the provider was given the tool list:
        // the client's context may have moved on in the time it took the
        // provider to respond. A tool whose filter no longer matches is
        // refused rather than silently executed against a stale context.
        if !self.registry.is_available(&call.tool_name, context) {
            return "Error: User is no longer on the valid page. The tool cannot be executed in the current context.".to_string();
        }

        let Some(tool) = self.registry.by_name(&call.tool_name) else {
            return encode_error(&format!("unknown tool: {}", call.tool_name));
        };

        match &tool.side {
            ToolSide::Server { handler } => {
                let call_result =
                    AssertUnwindSafe(handler(call.args.clone(), context.clone()))
                        .catch_unwind()
                        .await;
                match call_result {
                    Ok(Ok(value)) => encode_ok(&value),
                    Ok(Err(message)) => encode_error(&message),
                    Err(_panic) => {
                        tracing::error!(tool = %call.tool_name, "server tool handler panicked");
                        encode_error(&format!(
                            "tool '{}' handler panicked",
                            call.tool_name
                        ))
                    }
                }
            }
            ToolSide::Client { .. } => {
                let timeout_ms = tool.timeout_ms.unwrap_or(self.default_tool_timeout_ms);
                match self.dispatch_to_client(call, timeout_ms).await {
                    Ok(value) => match self.registry.validate_result(&call.tool_name, &value) {
                        Ok(()) => encode_ok(&value),
                        Err(e) => encode_error(&e.to_string()),
                    },
                    Err(message) => encode_error(&message),
                }
            }
        }
    }

    async fn dispatch_to_client(
        &self,
        call: &ToolCallRecord,
        timeout_ms: u64,
    ) -> std::result::Result<serde_json::Value, String> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(call.call_id.clone(), tx);

        if let Err(e) = self
            .outbound
            .send(WsMessage::ToolInvocation {
                tool_id: call.tool_name.clone(),
                call_id: call.call_id.clone(),
                params: call.args.clone(),
            })
            .await
        {
            self.pending.lock().remove(&call.call_id);
            return Err(format!("failed to dispatch tool invocation: {e}"));
        }

        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(ClientToolOutcome::Ok(value))) => Ok(value),
            Ok(Ok(ClientToolOutcome::Err(message))) => Err(message),
            Ok(Err(_)) => Err("tool invocation channel dropped".into()),
            Err(_) => {
                self.pending.lock().remove(&call.call_id);
                Err(format!(
                    "tool '{}' timed out after {timeout_ms}ms",
                    call.tool_name
                ))
            }
        }
    }

    async fn persist(&self) -> Result<()> {
        let state = self.state.lock().await;
        self.storage.save(&self.session_id, &state).await
    }

    /// Persists the session, logging and swallowing any storage failure.
    /// The in-memory state is authoritative for the running session — a
    /// storage outage must never abort a turn in progress, only degrade
    /// what survives a restart.
    async fn persist_best_effort(&self) {
        if let Err(e) = self.persist().await {
            tracing::error!(
                session_id = %self.session_id,
                error = %e,
                "failed to persist session state; continuing with in-memory state"
            );
        }
    }
}

fn encode_ok(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".into())
}

fn encode_error(message: &str) -> String {
    serde_json::to_string(&serde_json::json!({ "error": message }))
        .unwrap_or_else(|_| format!("{{\"error\":{message:?}}}"))
}
