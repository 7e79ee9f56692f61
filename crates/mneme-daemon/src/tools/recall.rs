//! `recall`, `recall_by_tag`, `resonate`, `full_resonate`, `lens` —
//! spec.md §4.H's Reads surface (minus the plain `get`/`text`/
//! `query_by_type` getters, which no tool exposes individually since
//! `recall`/`lens` already cover lookup-by-id-or-query).

use serde_json::{json, Value};

use mneme_core::node::NodeId;
use mneme_core::retrieval::{RecallFlags, RecallHit};

use crate::protocol::types::{JsonRpcError, ToolDescription, ToolResult};
use crate::tools::{
    filters_arg, mode_arg, optional_bool, optional_f64, optional_u64, require_node_id,
    require_str, simple_schema, zoom_arg, SharedMind,
};

pub fn descriptions() -> Vec<ToolDescription> {
    vec![
        ToolDescription {
            name: "recall".to_string(),
            description: "Hybrid dense+sparse recall with fusion, rerank, priming, and inhibition.".to_string(),
            input_schema: simple_schema(
                json!({
                    "query": {"type": "string"},
                    "k": {"type": "integer"},
                    "threshold": {"type": "number"},
                    "mode": {"type": "string", "enum": ["dense", "sparse", "hybrid"]},
                    "zoom": {"type": "string", "enum": ["title", "truncated", "full"]},
                    "prime": {"type": "boolean"},
                    "inhibit": {"type": "boolean"},
                    "node_types": {"type": "array", "items": {"type": "string"}},
                    "tags": {"type": "array", "items": {"type": "string"}},
                }),
                &["query"],
            ),
        },
        ToolDescription {
            name: "recall_by_tag".to_string(),
            description: "List nodes carrying an exact tag.".to_string(),
            input_schema: simple_schema(
                json!({
                    "tag": {"type": "string"},
                    "k": {"type": "integer"},
                    "zoom": {"type": "string", "enum": ["title", "truncated", "full"]},
                }),
                &["tag"],
            ),
        },
        ToolDescription {
            name: "resonate".to_string(),
            description: "Spreading activation seeded from recall's top candidates, no learning.".to_string(),
            input_schema: simple_schema(
                json!({"query": {"type": "string"}, "k": {"type": "integer"}}),
                &["query"],
            ),
        },
        ToolDescription {
            name: "full_resonate".to_string(),
            description: "Every retrieval stage active, optionally strengthening the Hebbian edges among the top results.".to_string(),
            input_schema: simple_schema(
                json!({
                    "query": {"type": "string"},
                    "k": {"type": "integer"},
                    "learn": {"type": "boolean"},
                }),
                &["query"],
            ),
        },
        ToolDescription {
            name: "lens".to_string(),
            description: "Project a single node at a given zoom level.".to_string(),
            input_schema: simple_schema(
                json!({
                    "id": {"type": "string"},
                    "zoom": {"type": "string", "enum": ["title", "truncated", "full"]},
                }),
                &["id"],
            ),
        },
    ]
}

fn hit_json(hit: &RecallHit) -> Value {
    json!({
        "id": hit.id.to_string(),
        "relevance": hit.relevance,
        "node_type": hit.node_type.as_str(),
        "title": hit.title,
        "text": hit.text,
        "tau_created": hit.tau_created,
        "tau_accessed": hit.tau_accessed,
    })
}

pub fn recall(mind: &SharedMind, args: &Value, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let query = require_str(args, "query")?;
    let k = optional_u64(args, "k", 10) as usize;
    let threshold = optional_f64(args, "threshold", 0.0);
    let flags = RecallFlags {
        mode: mode_arg(args, "mode"),
        zoom: zoom_arg(args, "zoom"),
        prime: optional_bool(args, "prime", true),
        inhibit: optional_bool(args, "inhibit", true),
        filters: filters_arg(args),
    };
    let hits = mind
        .recall(Some(query), None, k, threshold, flags, now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    let structured: Vec<Value> = hits.iter().map(hit_json).collect();
    Ok(ToolResult::ok(
        format!("{} hits", hits.len()),
        Some(json!({"hits": structured})),
    ))
}

pub fn recall_by_tag(mind: &SharedMind, args: &Value) -> Result<ToolResult, JsonRpcError> {
    let tag = require_str(args, "tag")?;
    let k = optional_u64(args, "k", 10) as usize;
    let zoom = zoom_arg(args, "zoom");
    let hits = mind
        .recall_by_tag(tag, zoom, k)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    let structured: Vec<Value> = hits.iter().map(hit_json).collect();
    Ok(ToolResult::ok(
        format!("{} hits", hits.len()),
        Some(json!({"hits": structured})),
    ))
}

fn activations_json(activations: &[(NodeId, f64)]) -> Value {
    json!(activations
        .iter()
        .map(|(id, score)| json!({"id": id.to_string(), "score": score}))
        .collect::<Vec<_>>())
}

pub fn resonate(mind: &SharedMind, args: &Value, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let query = require_str(args, "query")?;
    let k = optional_u64(args, "k", 10) as usize;
    let activations = mind
        .resonate(query, k, now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok(
        format!("{} activated", activations.len()),
        Some(json!({"activations": activations_json(&activations)})),
    ))
}

pub fn full_resonate(
    mind: &SharedMind,
    args: &Value,
    now_ms: i64,
) -> Result<ToolResult, JsonRpcError> {
    let query = require_str(args, "query")?;
    let k = optional_u64(args, "k", 10) as usize;
    let learn = optional_bool(args, "learn", false);
    let activations = mind
        .full_resonate(query, k, learn, now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok(
        format!("{} activated", activations.len()),
        Some(json!({"activations": activations_json(&activations)})),
    ))
}

pub fn lens(mind: &SharedMind, args: &Value) -> Result<ToolResult, JsonRpcError> {
    let id = require_node_id(args, "id")?;
    let zoom = zoom_arg(args, "zoom");
    let hit = mind
        .lens(id, zoom)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    match hit {
        Some(h) => Ok(ToolResult::ok(h.title.clone(), Some(hit_json(&h)))),
        None => Ok(ToolResult::err(format!("no such node: {id}"))),
    }
}
