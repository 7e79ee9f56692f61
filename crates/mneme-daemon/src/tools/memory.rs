//! `grow`, `observe`, `update`, `forget` — the write side of spec.md
//! §4.H's Writes surface.

use serde_json::{json, Value};

use crate::protocol::types::{JsonRpcError, ToolDescription, ToolResult};
use crate::tools::{
    optional_bool, optional_str, require_node_id, require_node_type, require_str, simple_schema,
    tags_arg, SharedMind,
};

pub fn descriptions() -> Vec<ToolDescription> {
    vec![
        ToolDescription {
            name: "grow".to_string(),
            description: "Create a new memory node of the given type.".to_string(),
            input_schema: simple_schema(
                json!({
                    "node_type": {"type": "string"},
                    "text": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                }),
                &["node_type", "text"],
            ),
        },
        ToolDescription {
            name: "observe".to_string(),
            description: "Mark a node as observed by the caller, rate-limited per caller."
                .to_string(),
            input_schema: simple_schema(
                json!({"id": {"type": "string"}, "caller": {"type": "string"}}),
                &["id", "caller"],
            ),
        },
        ToolDescription {
            name: "update".to_string(),
            description: "Patch a node's text and/or tags in place.".to_string(),
            input_schema: simple_schema(
                json!({
                    "id": {"type": "string"},
                    "text": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                }),
                &["id"],
            ),
        },
        ToolDescription {
            name: "forget".to_string(),
            description: "Remove a node, optionally cascading to orphaned neighbors and rewiring around it.".to_string(),
            input_schema: simple_schema(
                json!({
                    "id": {"type": "string"},
                    "cascade": {"type": "boolean"},
                    "rewire": {"type": "boolean"},
                }),
                &["id"],
            ),
        },
    ]
}

pub fn grow(mind: &SharedMind, args: &Value, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let node_type = require_node_type(args, "node_type")?;
    let text = require_str(args, "text")?;
    let tags = tags_arg(args, "tags");
    let id = mind
        .remember(node_type, text, None, tags, now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok(
        format!("created {id}"),
        Some(json!({"id": id.to_string()})),
    ))
}

pub fn observe(mind: &SharedMind, args: &Value, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let id = require_node_id(args, "id")?;
    let caller = require_str(args, "caller")?;
    match mind.observe(caller, id, now_ms) {
        Ok(()) => Ok(ToolResult::ok("observed", None)),
        Err(mneme_core::MnemeError::RateLimited { retry_after_ms }) => Ok(ToolResult::ok(
            format!("rate limited, retry after {retry_after_ms}ms"),
            Some(json!({"retry_after_ms": retry_after_ms})),
        )),
        Err(e) => Err(JsonRpcError::tool_execution_error(e.to_string())),
    }
}

pub fn update(mind: &SharedMind, args: &Value, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let id = require_node_id(args, "id")?;
    let text = optional_str(args, "text");
    let tags = args.get("tags").and_then(Value::as_array).map(|a| {
        a.iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect::<Vec<_>>()
    });
    mind.update(id, text, tags, now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok("updated", None))
}

pub fn forget(mind: &SharedMind, args: &Value, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let id = require_node_id(args, "id")?;
    let cascade = optional_bool(args, "cascade", false);
    let rewire = optional_bool(args, "rewire", false);
    let removed = mind
        .forget(id, cascade, rewire, now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok(
        if removed { "forgotten" } else { "nothing to forget" },
        Some(json!({"removed": removed})),
    ))
}
