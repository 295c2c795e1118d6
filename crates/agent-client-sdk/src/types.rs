//! Shared types for client-executed tools.

use tokio_util::sync::CancellationToken;

/// Per-call context handed to a [`crate::registry::ClientExecutor`].
#[derive(Clone)]
pub struct ExecutorContext {
    pub call_id: String,
    pub tool_id: String,
    pub cancel: CancellationToken,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("execution failed: {0}")]
    Failed(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
}

pub type ExecutorResult = std::result::Result<serde_json::Value, ExecutorError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientSdkError {
    #[error("connection error: {0}")]
    Connection(#[from] anyhow::Error),
    #[error("reconnect attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),
    #[error("shutdown requested")]
    Shutdown,
}
