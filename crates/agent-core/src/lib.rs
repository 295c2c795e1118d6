//! The agent reasoning loop: tool registry, provider seam, session
//! orchestrator, and the persistence interface it depends on.
//!
//! ```text
//!                 ┌─────────────┐
//!   user_message  │              │  agent_response
//!  ───────────────▶ Orchestrator ├──────────────────▶
//!                 │              │
//!                 └──────┬───────┘
//!                        │ tools_for_context / validate_result
//!                 ┌──────▼───────┐        ┌──────────┐
//!                 │ ToolRegistry │        │ Provider │
//!                 └──────────────┘        └──────────┘
//! ```
//!
//! This crate has no network code. `agent-gateway` wires an [`OutboundSink`]
//! over a live WebSocket and a concrete [`SessionStorage`]; `agent-core`
//! only knows the traits.

pub mod error;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod storage;
pub mod tool;

pub use error::{Error, Result};
pub use message::{ChatMessage, Role, ToolCallRecord};
pub use orchestrator::{Orchestrator, OutboundSink};
pub use provider::{Event, Provider, ScriptedProvider};
pub use storage::{SessionState, SessionStorage};
pub use tool::{ContextFilter, Router, ServerHandler, ToolDefinition, ToolRegistry, ToolSide};
