//! Shared error type for the orchestrator and everything it calls into.

/// Errors surfaced by the agent core.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("tool dispatch failed: {0}")]
    ToolDispatch(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
