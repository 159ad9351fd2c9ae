//! HTTP method dispatcher in front of the MCPP engine: a single JSON-RPC
//! 2.0 endpoint that routes `tools/list`, `tools/call`, and the four
//! `mcpp/*` methods to `mcpp-core`.

mod dispatcher;
mod http;
mod tool_executor;

pub use dispatcher::AppState;
pub use dispatcher::dispatch;
pub use http::router;
pub use tool_executor::EchoToolExecutor;
pub use tool_executor::ToolExecutor;
pub use tool_executor::ToolOutcome;
