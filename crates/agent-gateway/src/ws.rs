//! WebSocket endpoint hosting one session's duplex channel.
//!
//! Flow:
//! 1. Client connects to `/v1/sessions/ws?session_id=<id>&token=<token>`.
//! 2. The gateway loads (or creates) that session's persisted state and
//!    spins up an [`Orchestrator`] for it.
//! 3. Bidirectional message loop: the client sends `agent:user_message`,
//!    `agent:context_update`, `agent:tool_result` / `agent:tool_error`; the
//!    gateway sends `agent:agent_response`, `agent:context_sync`,
//!    `agent:tool_invocation`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::mpsc;

use agent_core::{ChatMessage, Orchestrator, OutboundSink, Result as CoreResult, SessionState};
use agent_protocol::WsMessage;

use crate::state::AppState;

fn token_eq(provided: &str, expected_hash: &[u8]) -> bool {
    let provided_hash = Sha256::digest(provided.as_bytes());
    provided_hash.as_slice().ct_eq(expected_hash).into()
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub session_id: Option<String>,
    pub token: Option<String>,
}

/// GET /v1/sessions/ws — upgrade to WebSocket.
///
/// Authentication is enforced only when `GATEWAY_TOKEN` was set at startup;
/// otherwise the endpoint is open (dev mode), matching the teacher's
/// node-token fallback.
pub async fn sessions_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    if let Some(expected_hash) = &state.token_hash {
        let provided = query.token.as_deref().unwrap_or("");
        if !token_eq(provided, expected_hash) {
            return (axum::http::StatusCode::UNAUTHORIZED, "invalid or missing token")
                .into_response();
        }
    }

    let session_id = query
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
        .into_response()
}

struct WsOutboundSink {
    tx: mpsc::Sender<WsMessage>,
}

#[async_trait]
impl OutboundSink for WsOutboundSink {
    async fn send(&self, msg: WsMessage) -> CoreResult<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|e| agent_core::Error::Protocol(format!("outbound channel closed: {e}")))
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String) {
    let (mut ws_sink, mut ws_stream) = socket.split();

    let initial_state = match state.storage.load(&session_id).await.unwrap_or(None) {
        Some(existing) => existing,
        None => new_session_state(&state),
    };

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<WsMessage>(64);

    let orchestrator = Arc::new(
        Orchestrator::new(
            session_id.clone(),
            state.registry.clone(),
            state.provider.clone(),
            state.storage.clone(),
            Arc::new(WsOutboundSink { tx: outbound_tx }),
            initial_state,
        )
        .with_default_tool_timeout_ms(state.config.default_tool_timeout_ms),
    );

    state
        .sessions
        .write()
        .insert(session_id.clone(), orchestrator.clone());

    tracing::info!(session_id = %session_id, "session connected");

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize outbound frame");
                    continue;
                }
            };
            if ws_sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<WsMessage>(&text) {
                Ok(parsed) => dispatch_inbound(&orchestrator, parsed).await,
                Err(e) => tracing::debug!(session_id = %session_id, error = %e, "dropping unparseable frame"),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    state.sessions.write().remove(&session_id);
    tracing::info!(session_id = %session_id, "session disconnected");
}

fn new_session_state(state: &AppState) -> SessionState {
    let mut session_state = SessionState::default();
    if let Some(prompt) = &state.config.system_prompt {
        session_state.messages.push(ChatMessage::system(prompt.clone()));
    }
    session_state
}

async fn dispatch_inbound(orchestrator: &Arc<Orchestrator>, msg: WsMessage) {
    match msg {
        WsMessage::UserMessage { content } => {
            let orch = orchestrator.clone();
            tokio::spawn(async move {
                if let Err(e) = orch.handle_user_message(content).await {
                    tracing::warn!(error = %e, "user message turn failed");
                }
            });
        }
        WsMessage::ContextUpdate { context } => {
            if let Err(e) = orchestrator.handle_context_update(context).await {
                tracing::warn!(error = %e, "failed to apply context update");
            }
        }
        WsMessage::ToolResult {
            call_id, result, ..
        } => orchestrator.handle_tool_result(&call_id, result),
        WsMessage::ToolError {
            call_id, message, ..
        } => orchestrator.handle_tool_error(&call_id, message),
        other => {
            tracing::debug!(?other, "ignoring unexpected frame from client");
        }
    }
}
