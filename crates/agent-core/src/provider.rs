//! The model-provider seam.
//!
//! Unlike a streaming chat API, a turn here is synchronous from the
//! orchestrator's point of view: hand over the message history and the
//! tools visible under the current context, get back everything the
//! provider produced for this turn in one batch. Streaming to the end user
//! is a transport-layer concern (the gateway may still emit partial
//! `agent:agent_response` frames as it works through the batch); it is not
//! part of this trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{ChatMessage, ToolCallRecord};
use crate::tool::ToolDefinition;

/// One unit of provider output for a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Assistant text to surface to the user. `done` is the provider's own
    /// notion of whether this chunk completes its thought; `suggested_actions`
    /// carries UI hints the orchestrator forwards on the turn's terminal
    /// frame if no later text event overrides them.
    Text {
        content: String,
        done: bool,
        suggested_actions: Option<Vec<String>>,
    },
    /// A request to invoke a tool by name with the given arguments.
    ToolCall(ToolCallRecord),
    /// The provider call itself failed (not a tool failure).
    Error(String),
}

impl Event {
    /// A complete text event with no suggested actions — the common case for
    /// a provider that doesn't stream or offer UI hints.
    pub fn text(content: impl Into<String>) -> Self {
        Event::Text {
            content: content.into(),
            done: true,
            suggested_actions: None,
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn run(
        &self,
        messages: &[ChatMessage],
        tools: &[&ToolDefinition],
    ) -> Result<Vec<Event>>;
}

/// A scripted provider for tests: returns one fixed batch of events per
/// call, advancing through a list. Panics if called more times than it has
/// scripted responses for, so a test's turn budget is explicit.
pub struct ScriptedProvider {
    responses: parking_lot::Mutex<std::collections::VecDeque<Vec<Event>>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Vec<Event>>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn run(
        &self,
        _messages: &[ChatMessage],
        _tools: &[&ToolDefinition],
    ) -> Result<Vec<Event>> {
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| crate::error::Error::Provider("ScriptedProvider exhausted".into()))
    }
}
