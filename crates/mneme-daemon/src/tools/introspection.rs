//! `soul_context`, `lens_harmony`, `epistemic_state`, `bias_scan`,
//! `competence` — read-only rollups over the graph's current standing.

use serde_json::{json, Value};

use mneme_core::graph::VitalityStatus;

use crate::protocol::types::{JsonRpcError, ToolDescription, ToolResult};
use crate::tools::{optional_str, simple_schema, SharedMind};

pub fn descriptions() -> Vec<ToolDescription> {
    vec![
        ToolDescription {
            name: "soul_context".to_string(),
            description: "The session's recent-observation and active-intention windows.".to_string(),
            input_schema: simple_schema(json!({"id": {"type": "string"}}), &[]),
        },
        ToolDescription {
            name: "lens_harmony".to_string(),
            description: "The graph's current coherence score.".to_string(),
            input_schema: simple_schema(json!({}), &[]),
        },
        ToolDescription {
            name: "epistemic_state".to_string(),
            description: "Coherence, vitality, node-type census, and the lowest-confidence beliefs.".to_string(),
            input_schema: simple_schema(json!({}), &[]),
        },
        ToolDescription {
            name: "bias_scan".to_string(),
            description: "Cosine-similar belief/wisdom pairs with no reconciling or contradicting edge between them.".to_string(),
            input_schema: simple_schema(json!({}), &[]),
        },
        ToolDescription {
            name: "competence".to_string(),
            description: "The graph's current vitality (structural, semantic, temporal, capacity).".to_string(),
            input_schema: simple_schema(json!({}), &[]),
        },
    ]
}

pub fn soul_context(mind: &SharedMind, args: &Value) -> Result<ToolResult, JsonRpcError> {
    let (recent, intentions) = mind.soul_context();
    let recent_ids: Vec<String> = recent.iter().map(|id| id.to_string()).collect();
    let intention_ids: Vec<String> = intentions.iter().map(|id| id.to_string()).collect();
    let mut structured = json!({
        "recent_observations": recent_ids,
        "active_intentions": intention_ids,
    });
    if let Some(raw) = optional_str(args, "id") {
        if let Ok(id) = raw.parse() {
            structured["is_recent"] = json!(mind.session_context_is_recent(id));
        }
    }
    Ok(ToolResult::ok(
        format!("{} recent, {} intentions", recent.len(), intentions.len()),
        Some(structured),
    ))
}

pub fn lens_harmony(mind: &SharedMind, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let coherence = mind
        .coherence(now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok(
        format!("coherence {:.3}", coherence.tau_k()),
        Some(json!({
            "local": coherence.local,
            "global": coherence.global,
            "temporal": coherence.temporal,
            "structural": coherence.structural,
            "tau_k": coherence.tau_k(),
        })),
    ))
}

fn vitality_status_str(status: VitalityStatus) -> &'static str {
    match status {
        VitalityStatus::Critical => "critical",
        VitalityStatus::Weak => "weak",
        VitalityStatus::Healthy => "healthy",
        VitalityStatus::Vibrant => "vibrant",
    }
}

pub fn epistemic_state(mind: &SharedMind, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let state = mind
        .epistemic_state(now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    let weakest: Vec<Value> = state
        .weakest_beliefs
        .iter()
        .map(|b| json!({"id": b.id.to_string(), "effective_confidence": b.effective_confidence}))
        .collect();
    Ok(ToolResult::ok(
        format!(
            "coherence {:.3}, vitality {}",
            state.coherence.tau_k(),
            vitality_status_str(state.vitality.status)
        ),
        Some(json!({
            "coherence": {
                "local": state.coherence.local,
                "global": state.coherence.global,
                "temporal": state.coherence.temporal,
                "structural": state.coherence.structural,
            },
            "vitality": {
                "structural": state.vitality.structural,
                "semantic": state.vitality.semantic,
                "temporal": state.vitality.temporal,
                "capacity": state.vitality.capacity,
                "status": vitality_status_str(state.vitality.status),
            },
            "type_counts": state.type_counts,
            "weakest_beliefs": weakest,
        })),
    ))
}

pub fn bias_scan(mind: &SharedMind) -> Result<ToolResult, JsonRpcError> {
    let pairs = mind
        .bias_scan()
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    let structured: Vec<Value> = pairs
        .iter()
        .map(|p| json!({"a": p.a.to_string(), "b": p.b.to_string(), "cosine": p.cosine}))
        .collect();
    Ok(ToolResult::ok(
        format!("{} unreconciled pairs", pairs.len()),
        Some(json!({"pairs": structured})),
    ))
}

pub fn competence(mind: &SharedMind, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let vitality = mind
        .health(now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok(
        format!("{}", vitality_status_str(vitality.status)),
        Some(json!({
            "structural": vitality.structural,
            "semantic": vitality.semantic,
            "temporal": vitality.temporal,
            "capacity": vitality.capacity,
            "status": vitality_status_str(vitality.status),
        })),
    ))
}
