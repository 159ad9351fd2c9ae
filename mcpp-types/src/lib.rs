//! Wire types for the Model Context Privacy Protocol (MCPP).
//!
//! This crate defines only the JSON-RPC 2.0 envelope and the stable error
//! code table from the protocol's external interface. Domain types (tools,
//! targets, usage contexts, cached entries, ...) live in `mcpp-protocol`.

mod error_code;
mod jsonrpc;

pub use error_code::ErrorCode;
pub use jsonrpc::JSONRPC_VERSION;
pub use jsonrpc::JsonRpcError;
pub use jsonrpc::JsonRpcMessage;
pub use jsonrpc::JsonRpcNotification;
pub use jsonrpc::JsonRpcRequest;
pub use jsonrpc::JsonRpcResponse;
pub use jsonrpc::RequestId;
