//! `cross_project` — transferable-pattern lookup gated on an explicit
//! `project:<tag>` rather than a text-similarity heuristic.

use serde_json::{json, Value};

use crate::protocol::types::{JsonRpcError, ToolDescription, ToolResult};
use crate::tools::{optional_f64, require_str, simple_schema, SharedMind};

pub fn descriptions() -> Vec<ToolDescription> {
    vec![ToolDescription {
        name: "cross_project".to_string(),
        description: "Nodes explicitly tagged `project:<tag>` above a confidence floor, for reuse across projects."
            .to_string(),
        input_schema: simple_schema(
            json!({
                "project": {"type": "string"},
                "min_confidence": {"type": "number"},
            }),
            &["project"],
        ),
    }]
}

pub fn cross_project(mind: &SharedMind, args: &Value) -> Result<ToolResult, JsonRpcError> {
    let project = require_str(args, "project")?;
    let min_confidence = optional_f64(args, "min_confidence", 0.0);
    let nodes = mind
        .cross_project(project, min_confidence)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    let structured: Vec<Value> = nodes
        .iter()
        .map(|n| {
            json!({
                "id": n.id.to_string(),
                "node_type": n.node_type.as_str(),
                "text": n.text(),
                "effective_confidence": n.kappa.effective(),
                "tags": n.tags,
            })
        })
        .collect();
    Ok(ToolResult::ok(
        format!("{} transferable nodes", nodes.len()),
        Some(json!({"nodes": structured})),
    ))
}
