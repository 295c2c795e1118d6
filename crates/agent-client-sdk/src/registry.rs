//! Registry of client-side tool executors, keyed by tool name.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{ExecutorContext, ExecutorResult};

/// Implement this to handle `agent:tool_invocation` frames for one tool
/// name. Executors run on the client's Tokio runtime and may perform async
/// I/O (DOM reads, native APIs, local storage).
#[async_trait::async_trait]
pub trait ClientExecutor: Send + Sync + 'static {
    async fn call(&self, ctx: ExecutorContext, args: serde_json::Value) -> ExecutorResult;
}

/// Maps tool names to their [`ClientExecutor`].
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn ClientExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool_id: impl Into<String>, executor: impl ClientExecutor) {
        self.executors.insert(tool_id.into(), Arc::new(executor));
    }

    pub fn tool_ids(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.keys().cloned().collect();
        names.sort();
        names
    }

    /// Removes a previously registered executor. Returns `true` if one was
    /// present. Distinct from calling `register` again under the same
    /// name, which replaces the entry rather than removing it.
    pub fn unregister(&mut self, tool_id: &str) -> bool {
        self.executors.remove(tool_id).is_some()
    }

    pub(crate) fn get(&self, tool_id: &str) -> Option<Arc<dyn ClientExecutor>> {
        self.executors.get(tool_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExecutorError;

    struct Echo;
    #[async_trait::async_trait]
    impl ClientExecutor for Echo {
        async fn call(&self, _ctx: ExecutorContext, args: serde_json::Value) -> ExecutorResult {
            Ok(args)
        }
    }

    struct Fail;
    #[async_trait::async_trait]
    impl ClientExecutor for Fail {
        async fn call(&self, _ctx: ExecutorContext, _args: serde_json::Value) -> ExecutorResult {
            Err(ExecutorError::Failed("intentional".into()))
        }
    }

    fn test_ctx(tool_id: &str) -> ExecutorContext {
        ExecutorContext {
            call_id: "call-1".into(),
            tool_id: tool_id.into(),
            cancel: tokio_util::sync::CancellationToken::new(),
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = ExecutorRegistry::new();
        reg.register("dom.read", Echo);
        assert!(reg.get("dom.read").is_some());
        assert!(reg.get("dom.missing").is_none());
    }

    #[test]
    fn unregister_removes_a_previously_registered_executor() {
        let mut reg = ExecutorRegistry::new();
        reg.register("dom.read", Echo);
        assert!(reg.unregister("dom.read"));
        assert!(reg.get("dom.read").is_none());
        assert!(!reg.unregister("dom.read"));
    }

    #[test]
    fn tool_ids_are_sorted() {
        let mut reg = ExecutorRegistry::new();
        reg.register("z.tool", Echo);
        reg.register("a.tool", Echo);
        assert_eq!(reg.tool_ids(), vec!["a.tool", "z.tool"]);
    }

    #[tokio::test]
    async fn echo_executor_returns_its_args() {
        let mut reg = ExecutorRegistry::new();
        reg.register("dom.read", Echo);
        let handler = reg.get("dom.read").unwrap();
        let result = handler
            .call(test_ctx("dom.read"), serde_json::json!({"x": 1}))
            .await;
        assert_eq!(result.unwrap(), serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn failing_executor_surfaces_its_message() {
        let mut reg = ExecutorRegistry::new();
        reg.register("dom.fail", Fail);
        let handler = reg.get("dom.fail").unwrap();
        let result = handler.call(test_ctx("dom.fail"), serde_json::json!({})).await;
        assert!(result.unwrap_err().to_string().contains("intentional"));
    }
}
