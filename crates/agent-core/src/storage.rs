//! Session persistence interface.
//!
//! A session's durable state is exactly `{context, messages}` — everything
//! else (pending tool waiters, the turn counter) is in-process and does not
//! survive a restart. The façade owns which [`SessionStorage`] implementation
//! is wired in; `agent-core` only depends on the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agent_protocol::ClientContext;

use crate::error::Result;
use crate::message::ChatMessage;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionState {
    pub context: ClientContext,
    pub messages: Vec<ChatMessage>,
}

#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionState>>;
    async fn save(&self, session_id: &str, state: &SessionState) -> Result<()>;
}
