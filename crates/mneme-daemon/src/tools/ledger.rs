//! `ledger` — session-state persistence, multiplexed on an `action`
//! argument over `Mind::save_ledger`/`load_ledger`/`update_ledger`/
//! `list_ledgers` (spec.md §4.H Ledger).

use serde_json::{json, Value};

use crate::protocol::types::{JsonRpcError, ToolDescription, ToolResult};
use crate::tools::{optional_str, require_node_id, require_str, simple_schema, SharedMind};

pub fn descriptions() -> Vec<ToolDescription> {
    vec![ToolDescription {
        name: "ledger".to_string(),
        description: "Save, load, update, or list session ledgers. `action` is one of save, load, update, list (default save)."
            .to_string(),
        input_schema: simple_schema(
            json!({
                "action": {"type": "string", "enum": ["save", "load", "update", "list"]},
                "session": {"type": "string"},
                "project": {"type": "string"},
                "text": {"type": "string"},
                "id": {"type": "string"},
            }),
            &[],
        ),
    }]
}

fn ledger_json(node: &mneme_core::node::Node) -> Value {
    json!({
        "id": node.id.to_string(),
        "text": node.text(),
        "tags": node.tags,
        "tau_created": node.tau_created,
    })
}

pub fn ledger(mind: &SharedMind, args: &Value, now_ms: i64) -> Result<ToolResult, JsonRpcError> {
    match optional_str(args, "action").unwrap_or("save") {
        "save" => {
            let session = require_str(args, "session")?;
            let project = optional_str(args, "project");
            let text = require_str(args, "text")?;
            let id = mind
                .save_ledger(session, project, text, now_ms)
                .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
            Ok(ToolResult::ok(
                format!("saved {id}"),
                Some(json!({"id": id.to_string()})),
            ))
        }
        "load" => {
            let session = require_str(args, "session")?;
            let found = mind
                .load_ledger(session)
                .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
            match found {
                Some(node) => Ok(ToolResult::ok(node.text(), Some(ledger_json(&node)))),
                None => Ok(ToolResult::err(format!("no ledger for session `{session}`"))),
            }
        }
        "update" => {
            let id = require_node_id(args, "id")?;
            let text = require_str(args, "text")?;
            mind.update_ledger(id, text, now_ms)
                .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
            Ok(ToolResult::ok("updated", None))
        }
        "list" => {
            let project = require_str(args, "project")?;
            let ledgers = mind
                .list_ledgers(project)
                .map_err(|e| JsonRpcError::tool_execution_error(e.to_string()))?;
            let structured: Vec<Value> = ledgers.iter().map(ledger_json).collect();
            Ok(ToolResult::ok(
                format!("{} ledgers", ledgers.len()),
                Some(json!({"ledgers": structured})),
            ))
        }
        other => Err(JsonRpcError::invalid_params(format!(
            "unknown ledger action `{other}`"
        ))),
    }
}
