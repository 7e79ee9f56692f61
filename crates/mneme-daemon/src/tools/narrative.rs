//! `intend`, `wonder`, `answer`, `narrate` — the narrative-shaped
//! tools. `intend` marks an existing node as an active session
//! intention directly through `Mind::intend`; `wonder`/`answer`/
//! `narrate` are composites over `remember`/`connect`/`strengthen`
//! rather than new façade operations.

use serde_json::{json, Value};

use mneme_core::node::{EdgeType, NodeType};

use crate::protocol::types::{JsonRpcError, ToolDescription, ToolResult};
use crate::tools::{require_node_id, require_str, simple_schema, tags_arg, SharedMind};

pub fn descriptions() -> Vec<ToolDescription> {
    vec![
        ToolDescription {
            name: "intend".to_string(),
            description: "Mark an existing node as an active intention for the current session."
                .to_string(),
            input_schema: simple_schema(json!({"id": {"type": "string"}}), &["id"]),
        },
        ToolDescription {
            name: "wonder".to_string(),
            description: "Record an open question.".to_string(),
            input_schema: simple_schema(
                json!({
                    "text": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                }),
                &["text"],
            ),
        },
        ToolDescription {
            name: "answer".to_string(),
            description: "Record a belief that answers a question, linking and strengthening it."
                .to_string(),
            input_schema: simple_schema(
                json!({
                    "question": {"type": "string"},
                    "text": {"type": "string"},
                    "wisdom": {"type": "boolean"},
                }),
                &["question", "text"],
            ),
        },
        ToolDescription {
            name: "narrate".to_string(),
            description: "Record a story thread, optionally linking it to related nodes.".to_string(),
            input_schema: simple_schema(
                json!({
                    "text": {"type": "string"},
                    "related": {"type": "array", "items": {"type": "string"}},
                }),
                &["text"],
            ),
        },
    ]
}

pub fn intend(mind: &SharedMind, args: &Value) -> Result<ToolResult, JsonRpcError> {
    let id = require_node_id(args, "id")?;
    let node = mind
        .get(id)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    let Some(node) = node else {
        return Ok(ToolResult::err(format!("no such node: {id}")));
    };
    mind.intend(id, node.nu.as_ref());
    Ok(ToolResult::ok(format!("intending {id}"), None))
}

pub fn wonder(mind: &SharedMind, args: &Value, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let text = require_str(args, "text")?;
    let tags = tags_arg(args, "tags");
    let id = mind
        .remember(NodeType::Question, text, None, tags, now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok(
        format!("wondering {id}"),
        Some(json!({"id": id.to_string()})),
    ))
}

pub fn answer(mind: &SharedMind, args: &Value, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let question = require_node_id(args, "question")?;
    let text = require_str(args, "text")?;
    let as_wisdom = args
        .get("wisdom")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let node_type = if as_wisdom {
        NodeType::Wisdom
    } else {
        NodeType::Belief
    };
    let answer_id = mind
        .remember(node_type, text, None, vec![], now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    mind.connect(answer_id, question, EdgeType::Supports, 1.0)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    mind.strengthen(question, 0.1)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
    Ok(ToolResult::ok(
        format!("answered {question} with {answer_id}"),
        Some(json!({"id": answer_id.to_string()})),
    ))
}

pub fn narrate(mind: &SharedMind, args: &Value, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    let text = require_str(args, "text")?;
    let related = args
        .get("related")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();

    let thread_id = mind
        .remember(NodeType::StoryThread, text, None, vec![], now_ms)
        .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;

    for raw in related {
        if let Ok(target) = raw.parse() {
            mind.connect(thread_id, target, EdgeType::RelatesTo, 1.0)
                .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
        }
    }
    Ok(ToolResult::ok(
        format!("narrated {thread_id}"),
        Some(json!({"id": thread_id.to_string()})),
    ))
}
