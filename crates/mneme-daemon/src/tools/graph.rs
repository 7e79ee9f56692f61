//! `connect`, `tag`, `propagate` — direct graph mutation tools.

use serde_json::{json, Value};

use crate::protocol::types::{JsonRpcError, ToolDescription, ToolResult};
use crate::tools::{
    optional_f64, optional_str, optional_u64, require_edge_type, require_node_id, require_str,
    simple_schema, SharedMind,
};

pub fn descriptions() -> Vec<ToolDescription> {
    vec![
        ToolDescription {
            name: "connect".to_string(),
            description: "Link two nodes with a typed, weighted edge.".to_string(),
            input_schema: simple_schema(
                json!({
                    "from": {"type": "string"},
                    "to": {"type": "string"},
                    "edge_type": {"type": "string"},
                    "weight": {"type": "number"},
                }),
                &["from", "to", "edge_type"],
            ),
        },
        ToolDescription {
            name: "tag".to_string(),
            description: "Add or remove a tag on a node. `action` defaults to \"add\".".to_string(),
            input_schema: simple_schema(
                json!({
                    "id": {"type": "string"},
                    "tag": {"type": "string"},
                    "action": {"type": "string", "enum": ["add", "remove"]},
                }),
                &["id", "tag"],
            ),
        },
        ToolDescription {
            name: "propagate".to_string(),
            description: "Propagate a confidence delta outward from a node across its edges, decaying per hop.".to_string(),
            input_schema: simple_schema(
                json!({
                    "id": {"type": "string"},
                    "delta": {"type": "number"},
                    "decay": {"type": "number"},
                    "depth": {"type": "integer"},
                }),
                &["id", "delta"],
            ),
        },
    ]
}

pub fn connect(mind: &SharedMind, args: &Value) -> Result<ToolResult, JsonRpcError> {
    let from = require_node_id(args, "from")?;
    let to = require_node_id(args, "to")?;
    let edge_type = require_edge_type(args, "edge_type")?;
    let weight = optional_f64(args, "weight", 1.0) as f32;
    mind.connect(from, to, edge_type, weight)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok("connected", None))
}

pub fn tag(mind: &SharedMind, args: &Value) -> Result<ToolResult, JsonRpcError> {
    let id = require_node_id(args, "id")?;
    let tag = require_str(args, "tag")?;
    let result = match optional_str(args, "action") {
        Some("remove") => mind.untag(id, tag),
        _ => mind.tag(id, tag.to_string()),
    };
    result.map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok("tagged", None))
}

pub fn propagate(mind: &SharedMind, args: &Value) -> Result<ToolResult, JsonRpcError> {
    let id = require_node_id(args, "id")?;
    let delta = optional_f64(args, "delta", 0.0);
    let decay = optional_f64(args, "decay", 0.5);
    let depth = optional_u64(args, "depth", 2) as u32;
    let touched = mind
        .propagate_confidence(id, delta, decay, depth)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok(
        format!("{touched} nodes touched"),
        Some(json!({"touched": touched})),
    ))
}
