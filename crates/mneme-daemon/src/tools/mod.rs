//! The 26-tool surface, grouped by concern, one file per concern
//! rather than one per tool. Every handler takes the raw `arguments`
//! value and the façade, and returns the `{content, isError,
//! structured}` shape — never a bare `MnemeError`, so a tool failure
//! never collapses into a JSON-RPC protocol error: "not found" is a
//! typed result with `isError=true`, not a protocol error.

mod cross_project;
mod dynamics;
mod graph;
mod ledger;
mod memory;
mod narrative;
mod recall;
mod introspection;

use std::sync::Arc;

use serde_json::Value;

use mneme_core::embeddings::Embedder;
use mneme_core::node::{EdgeType, NodeId, NodeType};
use mneme_core::retrieval::{Filters, RecallMode, ZoomLevel};
use mneme_core::Mind;

use crate::protocol::types::{JsonRpcError, ToolDescription, ToolResult};

pub type SharedMind = Arc<Mind<Box<dyn Embedder>>>;

pub fn descriptions() -> Vec<ToolDescription> {
    let mut all = Vec::new();
    all.extend(memory::descriptions());
    all.extend(recall::descriptions());
    all.extend(graph::descriptions());
    all.extend(dynamics::descriptions());
    all.extend(introspection::descriptions());
    all.extend(narrative::descriptions());
    all.extend(ledger::descriptions());
    all.extend(cross_project::descriptions());
    all
}

/// Dispatches one `tools/call` by name. `now_ms` is threaded in from
/// the caller (the server resolves it once per request) rather than
/// read from the system clock inside a tool, keeping every handler a
/// pure function of its arguments plus the current façade state.
pub fn dispatch(
    mind: &SharedMind,
    name: &str,
    arguments: &Value,
    now_ms: i64,
) -> Result<ToolResult, JsonRpcError> {
    match name {
        "grow" => memory::grow(mind, arguments, now_ms),
        "observe" => memory::observe(mind, arguments, now_ms),
        "update" => memory::update(mind, arguments, now_ms),
        "forget" => memory::forget(mind, arguments, now_ms),

        "recall" => recall::recall(mind, arguments, now_ms),
        "recall_by_tag" => recall::recall_by_tag(mind, arguments),
        "resonate" => recall::resonate(mind, arguments, now_ms),
        "full_resonate" => recall::full_resonate(mind, arguments, now_ms),
        "lens" => recall::lens(mind, arguments),

        "connect" => graph::connect(mind, arguments),
        "tag" => graph::tag(mind, arguments),
        "propagate" => graph::propagate(mind, arguments),

        "cycle" => dynamics::cycle(mind, now_ms),
        "attractors" => dynamics::attractors(mind, now_ms),
        "feedback" => dynamics::feedback(mind, arguments, now_ms),

        "soul_context" => introspection::soul_context(mind, arguments),
        "lens_harmony" => introspection::lens_harmony(mind, now_ms),
        "epistemic_state" => introspection::epistemic_state(mind, now_ms),
        "bias_scan" => introspection::bias_scan(mind),
        "competence" => introspection::competence(mind, now_ms),

        "intend" => narrative::intend(mind, arguments),
        "wonder" => narrative::wonder(mind, arguments, now_ms),
        "answer" => narrative::answer(mind, arguments, now_ms),
        "narrate" => narrative::narrate(mind, arguments, now_ms),

        "ledger" => ledger::ledger(mind, arguments, now_ms),

        "cross_project" => cross_project::cross_project(mind, arguments),

        _ => Err(JsonRpcError::tool_not_found(name)),
    }
}

// ---- shared argument extraction -----------------------------------

pub(crate) fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, JsonRpcError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("missing string argument `{key}`")))
}

pub(crate) fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

pub(crate) fn optional_f64(args: &Value, key: &str, default: f64) -> f64 {
    args.get(key).and_then(Value::as_f64).unwrap_or(default)
}

pub(crate) fn optional_u64(args: &Value, key: &str, default: u64) -> u64 {
    args.get(key).and_then(Value::as_u64).unwrap_or(default)
}

pub(crate) fn optional_bool(args: &Value, key: &str, default: bool) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(default)
}

pub(crate) fn tags_arg(args: &Value, key: &str) -> Vec<String> {
    args.get(key)
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn require_node_id(args: &Value, key: &str) -> Result<NodeId, JsonRpcError> {
    let raw = require_str(args, key)?;
    raw.parse()
        .map_err(|_| JsonRpcError::invalid_params(format!("`{key}` is not a valid node id: {raw}")))
}

pub(crate) fn require_node_type(args: &Value, key: &str) -> Result<NodeType, JsonRpcError> {
    let raw = require_str(args, key)?;
    NodeType::parse_name(raw)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("unknown node_type `{raw}`")))
}

pub(crate) fn require_edge_type(args: &Value, key: &str) -> Result<EdgeType, JsonRpcError> {
    let raw = require_str(args, key)?;
    edge_type_from_str(raw)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("unknown edge_type `{raw}`")))
}

fn edge_type_from_str(s: &str) -> Option<EdgeType> {
    [
        EdgeType::Similar,
        EdgeType::Supports,
        EdgeType::Contradicts,
        EdgeType::RelatesTo,
        EdgeType::PartOf,
        EdgeType::IsA,
        EdgeType::Mentions,
        EdgeType::AppliedIn,
        EdgeType::EvolvedFrom,
    ]
    .into_iter()
    .find(|e| e.as_str() == s)
}

pub(crate) fn zoom_arg(args: &Value, key: &str) -> ZoomLevel {
    match optional_str(args, key) {
        Some("title") => ZoomLevel::Title,
        Some("full") => ZoomLevel::Full,
        _ => ZoomLevel::Truncated,
    }
}

pub(crate) fn mode_arg(args: &Value, key: &str) -> RecallMode {
    match optional_str(args, key) {
        Some("dense") => RecallMode::Dense,
        Some("sparse") => RecallMode::Sparse,
        _ => RecallMode::Hybrid,
    }
}

pub(crate) fn node_types_filter(args: &Value, key: &str) -> Option<Vec<NodeType>> {
    let arr = args.get(key)?.as_array()?;
    let types: Vec<NodeType> = arr
        .iter()
        .filter_map(Value::as_str)
        .filter_map(NodeType::parse_name)
        .collect();
    if types.is_empty() {
        None
    } else {
        Some(types)
    }
}

pub(crate) fn filters_arg(args: &Value) -> Filters {
    Filters {
        node_types: node_types_filter(args, "node_types"),
        tags: args.get("tags").and_then(Value::as_array).map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        }),
    }
}

pub(crate) fn simple_schema(properties: Value, required: &[&str]) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}
