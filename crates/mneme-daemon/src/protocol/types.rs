//! JSON-RPC 2.0 request/response envelopes and error codes. The custom
//! tool-not-found/tool-execution-error codes get their own enum rather
//! than an MCP-specific one, since the numeric ranges overlap but the
//! semantics don't.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version this daemon negotiates in `initialize`. Not tied to
/// the crate's own `CARGO_PKG_VERSION` — this is the wire contract
/// version, which can stay stable across several crate releases.
pub const PROTOCOL_VERSION: &str = "2026-01-01";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Error codes per spec.md §6: the standard JSON-RPC 2.0 block plus two
/// tool-dispatch codes of the daemon's own. These are deliberately a
/// different enum from what an MCP-flavored server would define at
/// `-32000..-32003` — this transport isn't MCP, so nothing here should
/// be read as implementing the MCP spec's reserved range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ToolNotFound,
    ToolExecutionError,
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::ToolNotFound => -32001,
            ErrorCode::ToolExecutionError => -32002,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

impl JsonRpcError {
    pub fn parse_error() -> Self {
        Self {
            code: ErrorCode::ParseError.into(),
            message: "Parse error".to_string(),
            data: None,
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidRequest.into(),
            message: msg.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: ErrorCode::MethodNotFound.into(),
            message: format!("method not found: {method}"),
            data: None,
        }
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidParams.into(),
            message: msg.into(),
            data: None,
        }
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError.into(),
            message: msg.into(),
            data: None,
        }
    }

    pub fn tool_not_found(name: &str) -> Self {
        Self {
            code: ErrorCode::ToolNotFound.into(),
            message: format!("tool not found: {name}"),
            data: None,
        }
    }

    pub fn tool_execution_error(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ToolExecutionError.into(),
            message: msg.into(),
            data: None,
        }
    }
}

/// One entry of `tools/list`'s result array.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The `{content:[{type:"text", text:…}], isError, structured?}` shape
/// every tool call returns, per spec.md §6.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError")]
    pub is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl ToolResult {
    pub fn ok(text: impl Into<String>, structured: Option<Value>) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text",
                text: text.into(),
            }],
            is_error: false,
            structured,
        }
    }

    pub fn err(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text",
                text: text.into(),
            }],
            is_error: true,
            structured: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let req = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(Value::from(1)),
            method: "tools/call".to_string(),
            params: Some(serde_json::json!({"name": "recall"})),
        };
        let s = serde_json::to_string(&req).unwrap();
        let back: JsonRpcRequest = serde_json::from_str(&s).unwrap();
        assert_eq!(back.method, "tools/call");
    }

    #[test]
    fn notification_has_no_id() {
        let req = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: None,
        };
        let s = serde_json::to_string(&req).unwrap();
        assert!(!s.contains("\"id\""));
    }

    #[test]
    fn error_codes_match_spec() {
        assert_eq!(i32::from(ErrorCode::ParseError), -32700);
        assert_eq!(i32::from(ErrorCode::InvalidRequest), -32600);
        assert_eq!(i32::from(ErrorCode::MethodNotFound), -32601);
        assert_eq!(i32::from(ErrorCode::InvalidParams), -32602);
        assert_eq!(i32::from(ErrorCode::InternalError), -32603);
        assert_eq!(i32::from(ErrorCode::ToolNotFound), -32001);
        assert_eq!(i32::from(ErrorCode::ToolExecutionError), -32002);
    }

    #[test]
    fn response_serializes_without_error_field_on_success() {
        let resp = JsonRpcResponse::success(Some(Value::from(1)), serde_json::json!({}));
        let s = serde_json::to_string(&resp).unwrap();
        assert!(!s.contains("\"error\""));
    }
}
