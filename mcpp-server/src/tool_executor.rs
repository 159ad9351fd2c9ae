use async_trait::async_trait;
use mcpp_protocol::cache_entry::TableData;
use mcpp_protocol::tool::Tool;
use serde_json::Value;

/// The raw shape a tool call produced, before the dispatcher decides
/// whether it needs caching and summarizing. Running the actual tool
/// (HTTP calls to a third-party CRM, a database query, ...) is out of
/// scope here; this crate only owns the caching and policy boundary in
/// front of that execution.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Table(TableData),
    Text(String),
    Json(Value),
}

/// Runs a tool's business logic given its declaration and call arguments.
/// Swappable so the dispatcher can be exercised in tests without a real
/// backend, and so a host can plug in its own tool implementations without
/// touching the dispatch logic itself.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool: &Tool, arguments: Value) -> ToolOutcome;
}

/// Reference executor used when no backend is configured: echoes the call
/// arguments back as a JSON payload. Useful for smoke-testing the
/// dispatch/cache/policy plumbing independent of any real tool.
#[derive(Debug, Default)]
pub struct EchoToolExecutor;

#[async_trait]
impl ToolExecutor for EchoToolExecutor {
    async fn execute(&self, _tool: &Tool, arguments: Value) -> ToolOutcome {
        ToolOutcome::Json(arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_executor_returns_arguments_verbatim() {
        let tool = Tool::new("echo", false);
        let outcome = EchoToolExecutor.execute(&tool, serde_json::json!({"a": 1})).await;
        assert!(matches!(outcome, ToolOutcome::Json(v) if v == serde_json::json!({"a": 1})));
    }
}
