//! Client-side runtime for the agent session protocol.
//!
//! ```text
//!                 ┌────────────────┐   agent:tool_invocation   ┌──────────────────┐
//!  gateway  ◀──────┤  ClientRuntime  ├──────────────────────────▶ ExecutorRegistry │
//!  (WebSocket)     │                 │   agent:tool_result/err  └──────────────────┘
//!                 └───────┬─────────┘
//!                         │ merge_context()
//!                  ┌──────▼───────┐
//!                  │ ClientContext │  (owned locally, published on update)
//!                  └──────────────┘
//! ```
//!
//! The embedding application registers [`ClientExecutor`]s for whatever it
//! can do locally (read the DOM, call a native API, touch local storage),
//! then calls [`ClientRuntime::run`] to connect. The returned [`ClientHandle`]
//! is how the application sends user turns and pushes context updates; the
//! returned receiver is how it observes assistant output.

pub mod context;
pub mod reconnect;
pub mod registry;
pub mod runtime;
pub mod types;

pub use context::merge_context;
pub use reconnect::ReconnectSchedule;
pub use registry::{ClientExecutor, ExecutorRegistry};
pub use runtime::{ClientEvent, ClientHandle, ClientRuntime};
pub use types::{ClientSdkError, ExecutorContext, ExecutorError, ExecutorResult};
