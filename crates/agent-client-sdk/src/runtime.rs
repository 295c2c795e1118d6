//! Client runtime: owns the WebSocket connection to the gateway, merges and
//! publishes context updates, and dispatches `agent:tool_invocation` frames
//! to the local [`ExecutorRegistry`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::{FutureExt, SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use agent_protocol::{ClientContext, WsMessage};

use crate::context::merge_context;
use crate::reconnect::ReconnectSchedule;
use crate::registry::ExecutorRegistry;
use crate::types::{ClientSdkError, ExecutorContext, ExecutorError};

/// Server-originated frames the embedding application cares about.
/// `agent:tool_invocation` is handled internally by the runtime and never
/// surfaces here.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    AgentResponse {
        content: String,
        done: bool,
        suggested_actions: Option<Vec<String>>,
    },
    ContextSync {
        context: ClientContext,
        available_tools: Vec<String>,
    },
}

/// A fully-configured client runtime, ready to connect.
pub struct ClientRuntime {
    gateway_ws_url: String,
    token: Option<String>,
    session_id: String,
    reconnect_schedule: ReconnectSchedule,
    max_concurrent_tools: usize,
    max_response_bytes: usize,
}

/// A live handle for driving a running [`ClientRuntime`]: send user turns,
/// push context updates, receive server-originated events.
pub struct ClientHandle {
    outbound: mpsc::Sender<WsMessage>,
    context: Arc<Mutex<ClientContext>>,
}

impl ClientHandle {
    pub async fn send_user_message(&self, content: impl Into<String>) -> Result<(), ClientSdkError> {
        self.outbound
            .send(WsMessage::UserMessage {
                content: content.into(),
            })
            .await
            .map_err(|e| ClientSdkError::Connection(anyhow::anyhow!("{e}")))
    }

    /// Merges `update` into the locally-tracked context and publishes the
    /// merged result to the gateway.
    pub async fn update_context(&self, update: ClientContext) -> Result<(), ClientSdkError> {
        let merged = {
            let mut ctx = self.context.lock();
            merge_context(&mut ctx, update);
            ctx.clone()
        };
        self.outbound
            .send(WsMessage::ContextUpdate { context: merged })
            .await
            .map_err(|e| ClientSdkError::Connection(anyhow::anyhow!("{e}")))
    }

    pub fn current_context(&self) -> ClientContext {
        self.context.lock().clone()
    }
}

impl ClientRuntime {
    pub fn new(gateway_ws_url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            gateway_ws_url: gateway_ws_url.into(),
            token: None,
            session_id: session_id.into(),
            reconnect_schedule: ReconnectSchedule::default(),
            max_concurrent_tools: 16,
            max_response_bytes: 1024 * 1024,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_reconnect_schedule(mut self, schedule: ReconnectSchedule) -> Self {
        self.reconnect_schedule = schedule;
        self
    }

    pub fn with_max_concurrent_tools(mut self, n: usize) -> Self {
        self.max_concurrent_tools = n;
        self
    }

    /// Connects, reconnecting with backoff on drop, until `shutdown` is
    /// cancelled or the backoff policy gives up. Returns a handle for
    /// driving the session and a receiver for server-originated events.
    pub fn run(
        self,
        registry: ExecutorRegistry,
        shutdown: CancellationToken,
    ) -> (
        ClientHandle,
        mpsc::Receiver<ClientEvent>,
        tokio::task::JoinHandle<Result<(), ClientSdkError>>,
    ) {
        let registry = Arc::new(registry);
        let (outbound_tx, outbound_rx) = mpsc::channel::<WsMessage>(64);
        let (events_tx, events_rx) = mpsc::channel::<ClientEvent>(64);
        let context = Arc::new(Mutex::new(ClientContext::default()));

        let handle = ClientHandle {
            outbound: outbound_tx.clone(),
            context: context.clone(),
        };

        let task = tokio::spawn(self.drive(registry, context, outbound_tx, outbound_rx, events_tx, shutdown));

        (handle, events_rx, task)
    }

    async fn drive(
        self,
        registry: Arc<ExecutorRegistry>,
        context: Arc<Mutex<ClientContext>>,
        outbound_tx: mpsc::Sender<WsMessage>,
        mut outbound_rx: mpsc::Receiver<WsMessage>,
        events_tx: mpsc::Sender<ClientEvent>,
        shutdown: CancellationToken,
    ) -> Result<(), ClientSdkError> {
        let mut schedule = self.reconnect_schedule.clone();

        loop {
            if shutdown.is_cancelled() {
                return Err(ClientSdkError::Shutdown);
            }

            let result = tokio::select! {
                r = self.connect_and_run(&registry, &context, &mut outbound_rx, &outbound_tx, &events_tx) => r,
                _ = shutdown.cancelled() => {
                    tracing::info!(session_id = %self.session_id, "shutdown requested");
                    return Err(ClientSdkError::Shutdown);
                }
            };

            match result {
                Ok(()) => {
                    tracing::info!(session_id = %self.session_id, "connection closed gracefully");
                    schedule.reset();
                }
                Err(e) => {
                    tracing::warn!(session_id = %self.session_id, attempt = schedule.attempts_made(), error = %e, "connection lost");
                }
            }

            if schedule.exhausted() {
                return Err(ClientSdkError::ReconnectExhausted(schedule.attempts_made()));
            }

            let delay = schedule.next_delay();
            tracing::info!(session_id = %self.session_id, delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => return Err(ClientSdkError::Shutdown),
            }
        }
    }

    fn build_url(&self) -> String {
        let base = &self.gateway_ws_url;
        let sep = if base.contains('?') { "&" } else { "?" };
        match &self.token {
            Some(token) => format!("{base}{sep}session_id={}&token={token}", self.session_id),
            None => format!("{base}{sep}session_id={}", self.session_id),
        }
    }

    async fn connect_and_run(
        &self,
        registry: &Arc<ExecutorRegistry>,
        context: &Arc<Mutex<ClientContext>>,
        outbound_rx: &mut mpsc::Receiver<WsMessage>,
        outbound_tx: &mpsc::Sender<WsMessage>,
        events_tx: &mpsc::Sender<ClientEvent>,
    ) -> Result<(), anyhow::Error> {
        let url = self.build_url();
        tracing::info!(url = %url, "connecting to gateway");
        let (ws, _response) = tokio_tungstenite::connect_async(&url).await?;
        let (mut sink, mut stream) = ws.split();

        // The server has no memory of this client across a reconnect; the
        // merged context must go out before any user turn does, so tool
        // availability is never evaluated against a stale view.
        let current_context = context.lock().clone();
        let resend = serde_json::to_string(&WsMessage::ContextUpdate {
            context: current_context,
        })?;
        sink.send(Message::Text(resend)).await?;

        let tool_semaphore = Arc::new(tokio::sync::Semaphore::new(self.max_concurrent_tools));
        let inflight_cancel = CancellationToken::new();
        let max_resp = self.max_response_bytes;

        loop {
            tokio::select! {
                outgoing = outbound_rx.recv() => {
                    let Some(msg) = outgoing else { break };
                    let json = serde_json::to_string(&msg)?;
                    sink.send(Message::Text(json)).await?;
                }
                incoming = stream.next() => {
                    let Some(incoming) = incoming else { break };
                    match incoming? {
                        Message::Text(text) => {
                            self.handle_inbound(
                                &text,
                                registry,
                                &tool_semaphore,
                                &inflight_cancel,
                                outbound_tx,
                                events_tx,
                                max_resp,
                            );
                        }
                        Message::Close(_) => {
                            tracing::info!("gateway closed connection");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }

        inflight_cancel.cancel();
        Ok(())
    }

    fn handle_inbound(
        &self,
        text: &str,
        registry: &Arc<ExecutorRegistry>,
        semaphore: &Arc<tokio::sync::Semaphore>,
        inflight_cancel: &CancellationToken,
        outbound_tx: &mpsc::Sender<WsMessage>,
        events_tx: &mpsc::Sender<ClientEvent>,
        max_response_bytes: usize,
    ) {
        let parsed = match serde_json::from_str::<WsMessage>(text) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "failed to parse inbound message");
                return;
            }
        };

        match parsed {
            WsMessage::ToolInvocation {
                tool_id,
                call_id,
                params,
            } => {
                let reg = registry.clone();
                let tx = outbound_tx.clone();
                let sem = semaphore.clone();
                let cancel = inflight_cancel.child_token();
                tokio::spawn(async move {
                    let _permit = sem.acquire().await;
                    let response =
                        dispatch(&reg, tool_id.clone(), call_id.clone(), params, cancel, max_response_bytes)
                            .await;
                    let _ = tx.send(response).await;
                });
            }
            WsMessage::AgentResponse {
                content,
                done,
                suggested_actions,
            } => {
                let _ = events_tx.try_send(ClientEvent::AgentResponse {
                    content,
                    done,
                    suggested_actions,
                });
            }
            WsMessage::ContextSync {
                context,
                available_tools,
            } => {
                let _ = events_tx.try_send(ClientEvent::ContextSync {
                    context,
                    available_tools,
                });
            }
            other => {
                tracing::debug!(?other, "ignoring unexpected frame from gateway");
            }
        }
    }
}

/// Executes one tool invocation and builds the reply frame. Never panics
/// the caller: a panicking executor still produces a `tool_error`.
async fn dispatch(
    registry: &ExecutorRegistry,
    tool_id: String,
    call_id: String,
    params: serde_json::Value,
    cancel: CancellationToken,
    max_response_bytes: usize,
) -> WsMessage {
    let Some(executor) = registry.get(&tool_id) else {
        tracing::warn!(tool_id = %tool_id, "no executor registered for tool");
        let message = format!("Tool '{tool_id}' is not available in the current client version");
        return WsMessage::ToolError {
            tool_id,
            call_id,
            message,
        };
    };

    let ctx = ExecutorContext {
        call_id: call_id.clone(),
        tool_id: tool_id.clone(),
        cancel,
    };

    let call_result = AssertUnwindSafe(executor.call(ctx, params)).catch_unwind().await;

    match call_result {
        Ok(Ok(value)) => {
            let serialized = serde_json::to_string(&value).unwrap_or_default();
            if serialized.len() > max_response_bytes {
                WsMessage::ToolError {
                    tool_id,
                    call_id,
                    message: format!(
                        "result exceeded {max_response_bytes} bytes ({} bytes)",
                        serialized.len()
                    ),
                }
            } else {
                WsMessage::ToolResult {
                    tool_id,
                    call_id,
                    result: value,
                }
            }
        }
        Ok(Err(e)) => WsMessage::ToolError {
            tool_id,
            call_id,
            message: executor_error_message(&e),
        },
        Err(_panic) => {
            tracing::error!(tool_id = %tool_id, call_id = %call_id, "executor panicked");
            WsMessage::ToolError {
                tool_id,
                call_id,
                message: "executor panicked".into(),
            }
        }
    }
}

fn executor_error_message(err: &ExecutorError) -> String {
    match err {
        ExecutorError::InvalidArgs(m) | ExecutorError::Failed(m) | ExecutorError::Cancelled(m) => {
            m.clone()
        }
    }
}
