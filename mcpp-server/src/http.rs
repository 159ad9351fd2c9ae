#![allow(clippy::expect_used)]

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use mcpp_types::JsonRpcRequest;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::dispatcher::AppState;
use crate::dispatcher::dispatch;

/// The single JSON-RPC 2.0 POST endpoint every `tools/*` and `mcpp/*`
/// method is dispatched through.
const RPC_PATH: &str = "/rpc";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(RPC_PATH, post(handle_rpc))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_rpc(State(state): State<Arc<AppState>>, Json(request): Json<JsonRpcRequest>) -> Json<serde_json::Value> {
    debug!(method = %request.method, "dispatching request");
    let response = dispatch(&state, request).await;
    Json(serde_json::to_value(response).expect("jsonrpc message always serializes"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::tool_executor::EchoToolExecutor;
    use axum::body::Body;
    use axum::http::Request;
    use axum::http::StatusCode;
    use mcpp_protocol::ServerConfig;
    use mcpp_protocol::tool::Tool;
    use tower::ServiceExt;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(ServerConfig::default(), vec![Tool::new("echo", false)], Arc::new(EchoToolExecutor)))
    }

    #[tokio::test]
    async fn tools_list_round_trips_through_http() {
        let app = router(state());
        let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(RPC_PATH)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["result"]["tools"][0]["name"], "echo");
    }

    #[tokio::test]
    async fn unknown_method_returns_method_not_found() {
        let app = router(state());
        let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "nope"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(RPC_PATH)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["error"]["code"], -32601);
    }
}
