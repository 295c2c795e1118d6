//! Wire vocabulary for the agent session protocol.
//!
//! A session is a single persistent, duplex channel between the gateway and
//! one connected client. Every frame exchanged over that channel is a
//! [`WsMessage`], tagged by its `type` field with one of the event names
//! below. These strings are part of the wire contract and MUST NOT change
//! without a protocol version bump.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Event name constants
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub const EVENT_CONTEXT_UPDATE: &str = "agent:context_update";
pub const EVENT_CONTEXT_SYNC: &str = "agent:context_sync";
pub const EVENT_USER_MESSAGE: &str = "agent:user_message";
pub const EVENT_AGENT_RESPONSE: &str = "agent:agent_response";
pub const EVENT_TOOL_INVOCATION: &str = "agent:tool_invocation";
pub const EVENT_TOOL_RESULT: &str = "agent:tool_result";
pub const EVENT_TOOL_ERROR: &str = "agent:tool_error";

/// Default timeout for a client-tool round trip when the tool definition
/// and the session both leave it unset.
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;

/// Hard cap on provider turns per user message (the bounded-runaway guard).
pub const MAX_TURNS: usize = 5;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The full set of frames exchanged on a session's duplex channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    /// Client -> Server: the client's merged context changed.
    #[serde(rename = "agent:context_update")]
    ContextUpdate { context: ClientContext },

    /// Server -> Client: acknowledges a context update (advisory only).
    #[serde(rename = "agent:context_sync")]
    ContextSync {
        context: ClientContext,
        available_tools: Vec<String>,
    },

    /// Client -> Server: a new user turn.
    #[serde(rename = "agent:user_message")]
    UserMessage { content: String },

    /// Server -> Client: assistant output, possibly streamed in frames.
    #[serde(rename = "agent:agent_response")]
    AgentResponse {
        content: String,
        done: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggested_actions: Option<Vec<String>>,
    },

    /// Server -> Client: execute a tool locally and reply.
    #[serde(rename = "agent:tool_invocation")]
    ToolInvocation {
        tool_id: String,
        call_id: String,
        params: serde_json::Value,
    },

    /// Client -> Server: a successful tool execution.
    #[serde(rename = "agent:tool_result")]
    ToolResult {
        tool_id: String,
        call_id: String,
        result: serde_json::Value,
    },

    /// Client -> Server: a failed tool execution.
    #[serde(rename = "agent:tool_error")]
    ToolError {
        tool_id: String,
        call_id: String,
        message: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The client's current UI-facing situation: what page it's on, what's
/// active, and what it's capable of. All fields are optional; extensibility
/// beyond the recognized fields lives in `metadata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_tab: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl ClientContext {
    pub fn is_empty(&self) -> bool {
        self.page_id.is_none()
            && self.active_tab.is_none()
            && self.capabilities.is_none()
            && self.metadata.is_none()
    }
}
