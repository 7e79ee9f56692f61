//! JSON-RPC 2.0 method dispatch: `initialize`, `initialized`
//! (notification, no reply), `tools/list`, `tools/call`, `shutdown`.
//! This transport exposes exactly the tool surface, nothing else.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::protocol::types::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolDescription, PROTOCOL_VERSION,
};
use crate::tools::{self, SharedMind};

/// One server per accepted connection. `initialized` tracks whether
/// this connection completed the `initialize`/`initialized` handshake;
/// every other method is rejected until it has.
pub struct Server {
    mind: SharedMind,
    initialized: AtomicBool,
}

impl Server {
    pub fn new(mind: SharedMind) -> Self {
        Self {
            mind,
            initialized: AtomicBool::new(false),
        }
    }

    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!(method = %request.method, "handling request");

        if request.method == "notifications/initialized" || request.method == "initialized" {
            return None;
        }

        if request.method != "initialize" && !self.initialized.load(Ordering::SeqCst) {
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request("server not yet initialized"),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params.as_ref()),
            "shutdown" => Ok(json!({"ok": true})),
            method => {
                warn!(method, "unknown method");
                Err(JsonRpcError::method_not_found(method))
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    fn handle_initialize(&self) -> Result<Value, JsonRpcError> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"listChanged": true}},
            "serverInfo": {
                "name": "mneme",
                "version": env!("CARGO_PKG_VERSION"),
            },
        }))
    }

    fn handle_tools_list(&self) -> Result<Value, JsonRpcError> {
        let descriptions: Vec<ToolDescription> = tools::descriptions();
        Ok(json!({"tools": descriptions}))
    }

    fn handle_tools_call(&self, params: Option<&Value>) -> Result<Value, JsonRpcError> {
        let params = params.ok_or_else(|| JsonRpcError::invalid_params("missing params"))?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("missing `name`"))?;
        let empty = json!({});
        let arguments = params.get("arguments").unwrap_or(&empty);

        let now_ms = chrono::Utc::now().timestamp_millis();
        let result = tools::dispatch(&self.mind, name, arguments, now_ms)?;
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mneme_core::embeddings::{Embedder, NullEmbedder};
    use mneme_core::{Config, Mind, Storage};
    use std::sync::Arc;

    fn server() -> Server {
        let storage = Storage::open_in_memory(100).unwrap();
        let embedder: Box<dyn Embedder> = Box::new(NullEmbedder::new(8));
        let mind: SharedMind = Arc::new(Mind::new(storage, embedder, Config::default(), 0));
        Server::new(mind)
    }

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn rejects_calls_before_initialize() {
        let server = server();
        let resp = server
            .handle(request("tools/list", None))
            .await
            .unwrap();
        assert!(resp.error.is_some());
    }

    #[tokio::test]
    async fn initialize_then_tools_list_succeeds() {
        let server = server();
        server.handle(request("initialize", None)).await;
        let resp = server.handle(request("tools/list", None)).await.unwrap();
        let tools = resp.result.unwrap()["tools"].as_array().unwrap().len();
        assert!(tools > 10);
    }

    #[tokio::test]
    async fn initialized_notification_returns_none() {
        let server = server();
        let resp = server
            .handle(request("notifications/initialized", None))
            .await;
        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn tools_call_unknown_tool_is_tool_not_found() {
        let server = server();
        server.handle(request("initialize", None)).await;
        let resp = server
            .handle(request(
                "tools/call",
                Some(json!({"name": "nonexistent", "arguments": {}})),
            ))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32001);
    }

    #[tokio::test]
    async fn tools_call_grow_then_recall_round_trips() {
        let server = server();
        server.handle(request("initialize", None)).await;
        let grow = server
            .handle(request(
                "tools/call",
                Some(json!({
                    "name": "grow",
                    "arguments": {"node_type": "wisdom", "text": "prefer explicit ownership"},
                })),
            ))
            .await
            .unwrap();
        assert!(grow.result.is_some());
    }
}
