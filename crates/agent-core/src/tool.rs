//! Tool registry: server-owned definitions, context filtering, and
//! client-result validation.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use agent_protocol::ClientContext;

use crate::error::{Error, Result};

/// A server-side handler: given the call arguments and the session's current
/// context, produce a JSON result or a human-readable failure message.
///
/// `Arc` so the handler can be shared across registry lookups and concurrent
/// sessions without cloning its captured state. `Pin<Box<dyn Future>>` erases
/// the concrete future type each async closure would otherwise produce, at
/// the cost of one allocation per call — negligible next to the network
/// round trip a server tool typically makes. `Send` lets the future move
/// across the `tokio` worker that drives it; the handler itself is `Send +
/// Sync` because the registry hands out shared references to it from
/// multiple session tasks at once.
pub type ServerHandler = Arc<
    dyn Fn(
            serde_json::Value,
            ClientContext,
        ) -> Pin<Box<dyn Future<Output = std::result::Result<serde_json::Value, String>> + Send>>
        + Send
        + Sync,
>;

/// A context filter: `true` means the tool is available under this context.
/// Absence of a filter means "always available".
pub type ContextFilter = Arc<dyn Fn(&ClientContext) -> bool + Send + Sync>;

/// Which side of the connection executes the tool.
#[derive(Clone)]
pub enum ToolSide {
    /// Executed inside the gateway process.
    Server { handler: ServerHandler },
    /// Dispatched to the connected client and awaited over the wire. An
    /// optional JSON Schema constrains the shape of the value the client
    /// reports back.
    Client {
        result_schema: Option<serde_json::Value>,
    },
}

/// A server-owned tool definition, as described to the provider and
/// enforced at dispatch time.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON-Schema-shaped description of the call arguments, passed to the
    /// provider verbatim. Not validated locally — the provider is trusted to
    /// honor it, the same way function-calling APIs work today.
    pub parameters: serde_json::Value,
    pub side: ToolSide,
    pub context_filter: Option<ContextFilter>,
    /// Overrides `Session::default_tool_timeout_ms` for this tool only.
    /// Only meaningful for `ToolSide::Client`.
    pub timeout_ms: Option<u64>,
    validator: Option<Arc<jsonschema::Validator>>,
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    pub fn server(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        handler: ServerHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            side: ToolSide::Server { handler },
            context_filter: None,
            timeout_ms: None,
            validator: None,
        }
    }

    /// Builds a client tool. If `result_schema` is present but fails to
    /// compile as a JSON Schema, registration does not fail — the schema is
    /// dropped and a warning is emitted at [`ToolRegistry::register`] time.
    /// Validation only ever fails *closed* at dispatch time, never silently
    /// at registration time.
    pub fn client(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        result_schema: Option<serde_json::Value>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            side: ToolSide::Client { result_schema },
            context_filter: None,
            timeout_ms: None,
            validator: None,
        }
    }

    pub fn with_context_filter(mut self, filter: ContextFilter) -> Self {
        self.context_filter = Some(filter);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    fn compile_validator(&mut self) {
        if let ToolSide::Client {
            result_schema: Some(schema),
        } = &self.side
        {
            match jsonschema::Validator::new(schema) {
                Ok(v) => self.validator = Some(Arc::new(v)),
                Err(e) => {
                    tracing::warn!(tool = %self.name, error = %e, "resultSchema failed to compile; skipping result validation");
                }
            }
        }
    }

    fn matches(&self, context: &ClientContext) -> bool {
        match &self.context_filter {
            Some(f) => f(context),
            None => true,
        }
    }
}

/// A trivial carrier for a batch of tool definitions. It has no behavior
/// beyond being importable and passed to [`ToolRegistry::use_router`] as a
/// unit — the same shape a feature module would use to group its tools.
#[derive(Default, Clone)]
pub struct Router {
    tools: Vec<ToolDefinition>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }
}

/// The server-owned registry of tool definitions.
///
/// Insertion order is preserved and surfaced by [`ToolRegistry::tools_for_context`]
/// because provider-facing tool lists should be stable across turns; a
/// provider that orders based on list position would otherwise see spurious
/// differences from one call to the next.
pub struct ToolRegistry {
    by_name: HashMap<String, usize>,
    order: Vec<ToolDefinition>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// A registry pre-seeded with the built-in `get_current_context` tool.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(builtin_get_current_context());
        registry
    }

    /// Inserts a tool, replacing any prior definition with the same name.
    /// Re-registration is allowed (tools are commonly redefined during
    /// iterative development) but always logged, since it silently changes
    /// behavior for any in-flight session referencing the old definition by
    /// name.
    pub fn register(&mut self, mut tool: ToolDefinition) {
        tool.compile_validator();
        if let Some(&idx) = self.by_name.get(&tool.name) {
            tracing::warn!(tool = %tool.name, "tool re-registered, replacing prior definition");
            self.order[idx] = tool;
        } else {
            self.by_name.insert(tool.name.clone(), self.order.len());
            self.order.push(tool);
        }
    }

    pub fn register_all(&mut self, tools: impl IntoIterator<Item = ToolDefinition>) {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn use_router(&mut self, router: Router) {
        self.register_all(router.tools);
    }

    /// Tools visible under `context`, in registration order.
    pub fn tools_for_context(&self, context: &ClientContext) -> Vec<&ToolDefinition> {
        self.order.iter().filter(|t| t.matches(context)).collect()
    }

    pub fn by_name(&self, name: &str) -> Option<&ToolDefinition> {
        self.by_name.get(name).map(|&idx| &self.order[idx])
    }

    /// Re-checked at dispatch time, not at turn-start time — the basis for
    /// rejecting calls whose tool has fallen out of context since the
    /// provider was given the tool list ("anti-ghost execution").
    pub fn is_available(&self, name: &str, context: &ClientContext) -> bool {
        self.by_name(name).is_some_and(|t| t.matches(context))
    }

    /// Validates a client-reported result against the tool's `resultSchema`,
    /// if any. Unknown tool names are an error; tools without a compiled
    /// validator pass through unchanged.
    pub fn validate_result(
        &self,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<()> {
        let tool = self
            .by_name(name)
            .ok_or_else(|| Error::ToolDispatch(format!("unknown tool: {name}")))?;
        match &tool.validator {
            Some(v) => {
                let errors: Vec<String> = v.iter_errors(value).map(|e| e.to_string()).collect();
                if errors.is_empty() {
                    Ok(())
                } else {
                    Err(Error::ToolDispatch(format!(
                        "result for '{name}' failed schema validation: {}",
                        errors.join("; ")
                    )))
                }
            }
            None => Ok(()),
        }
    }
}

fn builtin_get_current_context() -> ToolDefinition {
    ToolDefinition::server(
        "get_current_context",
        "Returns the session's current client context verbatim.",
        serde_json::json!({ "type": "object", "properties": {} }),
        Arc::new(|_args, context| {
            Box::pin(async move {
                serde_json::to_value(&context).map_err(|e| e.to_string())
            })
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_tab(tab: &str) -> ClientContext {
        ClientContext {
            active_tab: Some(tab.into()),
            ..Default::default()
        }
    }

    #[test]
    fn tools_for_context_preserves_registration_order() {
        let mut reg = ToolRegistry::new();
        reg.register(ToolDefinition::client("b", "b", serde_json::json!({}), None));
        reg.register(ToolDefinition::client("a", "a", serde_json::json!({}), None));
        let names: Vec<_> = reg
            .tools_for_context(&ClientContext::default())
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn context_filter_hides_tool_outside_its_context() {
        let mut reg = ToolRegistry::new();
        reg.register(
            ToolDefinition::client("camera", "camera", serde_json::json!({}), None)
                .with_context_filter(Arc::new(|ctx: &ClientContext| {
                    ctx.active_tab.as_deref() == Some("camera")
                })),
        );
        assert!(reg.is_available("camera", &ctx_with_tab("camera")));
        assert!(!reg.is_available("camera", &ctx_with_tab("settings")));
        assert!(!reg.is_available("camera", &ClientContext::default()));
    }

    #[test]
    fn re_registering_a_tool_replaces_it_in_place() {
        let mut reg = ToolRegistry::new();
        reg.register(ToolDefinition::client("x", "first", serde_json::json!({}), None));
        reg.register(ToolDefinition::client("x", "second", serde_json::json!({}), None));
        assert_eq!(reg.by_name("x").unwrap().description, "second");
        assert_eq!(reg.tools_for_context(&ClientContext::default()).len(), 1);
    }

    #[test]
    fn validate_result_rejects_unknown_tool() {
        let reg = ToolRegistry::new();
        let err = reg.validate_result("ghost", &serde_json::json!(null)).unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[test]
    fn validate_result_passes_through_without_a_schema() {
        let mut reg = ToolRegistry::new();
        reg.register(ToolDefinition::client("x", "x", serde_json::json!({}), None));
        assert!(reg.validate_result("x", &serde_json::json!({"anything": true})).is_ok());
    }

    #[test]
    fn validate_result_enforces_a_compiled_schema() {
        let mut reg = ToolRegistry::new();
        let schema = serde_json::json!({
            "type": "object",
            "required": ["status"],
            "properties": { "status": { "type": "string" } }
        });
        reg.register(ToolDefinition::client("x", "x", serde_json::json!({}), Some(schema)));
        assert!(reg
            .validate_result("x", &serde_json::json!({"status": "ok"}))
            .is_ok());
        assert!(reg.validate_result("x", &serde_json::json!({})).is_err());
    }

    #[test]
    fn builtin_context_tool_is_registered_by_default() {
        let reg = ToolRegistry::with_builtins();
        assert!(reg.by_name("get_current_context").is_some());
    }

    #[tokio::test]
    async fn server_handler_returns_its_value() {
        let tool = ToolDefinition::server(
            "echo",
            "echo",
            serde_json::json!({}),
            Arc::new(|args, _ctx| Box::pin(async move { Ok(args) })),
        );
        let ToolSide::Server { handler } = &tool.side else {
            panic!("expected server side");
        };
        let out = handler(serde_json::json!({"a": 1}), ClientContext::default())
            .await
            .unwrap();
        assert_eq!(out, serde_json::json!({"a": 1}));
    }
}
