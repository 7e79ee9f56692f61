//! `cycle`, `attractors`, `feedback` — the background-maintenance
//! tools a host can trigger on demand instead of waiting for the
//! daemon's scheduled tick (spec.md §4.G/§9).

use serde_json::{json, Value};

use mneme_core::dynamics::FeedbackKind;

use crate::protocol::types::{JsonRpcError, ToolDescription, ToolResult};
use crate::tools::{optional_bool, optional_f64, optional_str, require_node_id, simple_schema, SharedMind};

pub fn descriptions() -> Vec<ToolDescription> {
    vec![
        ToolDescription {
            name: "cycle".to_string(),
            description: "Run one dynamics tick: decay, coherence, triggers, feedback, dangling-edge GC, tier management, and attractor settling.".to_string(),
            input_schema: simple_schema(json!({}), &[]),
        },
        ToolDescription {
            name: "attractors".to_string(),
            description: "List current attractor nodes (confident, well-connected, aged) and their basins.".to_string(),
            input_schema: simple_schema(json!({}), &[]),
        },
        ToolDescription {
            name: "feedback".to_string(),
            description: "Queue a feedback event for a node; kinds are used, helpful, misleading, confirmed, challenged.".to_string(),
            input_schema: simple_schema(
                json!({
                    "id": {"type": "string"},
                    "kind": {"type": "string", "enum": ["used", "helpful", "misleading", "confirmed", "challenged"]},
                    "magnitude": {"type": "number"},
                    "context": {"type": "string"},
                    "flush": {"type": "boolean"},
                }),
                &["id", "kind"],
            ),
        },
    ]
}

pub fn cycle(mind: &SharedMind, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let report = mind
        .tick(now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok(
        format!(
            "pruned {}, dangling {}, feedback applied {}",
            report.pruned, report.dangling_collected, report.feedback_applied
        ),
        Some(json!({
            "decayed": report.decayed,
            "triggers_fired": report.triggers_fired,
            "pruned": report.pruned,
            "dangling_collected": report.dangling_collected,
            "feedback_applied": report.feedback_applied,
            "synthesized_wisdom": report.synthesized_wisdom.map(|id| id.to_string()),
        })),
    ))
}

pub fn attractors(mind: &SharedMind, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let attractors = mind
        .find_attractors(now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    let structured: Vec<Value> = attractors
        .iter()
        .map(|a| {
            json!({
                "id": a.id.to_string(),
                "score": a.score,
                "degree": a.degree,
                "basin": a.basin.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
            })
        })
        .collect();
    Ok(ToolResult::ok(
        format!("{} attractors", attractors.len()),
        Some(json!({"attractors": structured})),
    ))
}

fn feedback_kind(raw: &str) -> Option<FeedbackKind> {
    match raw {
        "used" => Some(FeedbackKind::Used),
        "helpful" => Some(FeedbackKind::Helpful),
        "misleading" => Some(FeedbackKind::Misleading),
        "confirmed" => Some(FeedbackKind::Confirmed),
        "challenged" => Some(FeedbackKind::Challenged),
        _ => None,
    }
}

pub fn feedback(mind: &SharedMind, args: &Value, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let id = require_node_id(args, "id")?;
    let kind_raw = optional_str(args, "kind").unwrap_or("used");
    let kind = feedback_kind(kind_raw)
        .ok_or_else(|| JsonRpcError::invalid_params(format!("unknown feedback kind `{kind_raw}`")))?;
    let magnitude = optional_f64(args, "magnitude", 1.0);
    let context = optional_str(args, "context").map(str::to_string);
    mind.queue_feedback(id, kind, magnitude, now_ms, context);

    if optional_bool(args, "flush", false) {
        let applied = mind
            .flush_feedback(now_ms)
            .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
        return Ok(ToolResult::ok(
            format!("queued and flushed ({applied} applied)"),
            Some(json!({"applied": applied})),
        ));
    }
    Ok(ToolResult::ok("queued", None))
}
