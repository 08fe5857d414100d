//! MCP transport layer — JSON-RPC dispatch shared by the stdio and
//! streamable-HTTP transports. Exposes five tools over `smartctx-core`'s
//! search and edit engines: `search`, `edit`, `undo`, `redo`, `conventions`.
//! Prompt and resource templates, and per-repo add/rescan tools, are not
//! carried — they belong to a multi-repo desktop UI workflow this project
//! doesn't have.

pub mod auth;
pub mod http;
pub mod stdio;

use serde_json::{json, Value};
use smartctx_core::edit::{EditCoordinator, Normalization, ResolveOptions, TargetEdit};
use smartctx_core::error::CoreError;
use smartctx_core::search::{SearchEngine, SearchOptions};
use smartctx_core::store::SymbolStore;
use smartctx_core::trigram::TrigramIndex;
use smartctx_core::vector::VectorIndexManager;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub const SUPPORTED_VERSIONS: &[&str] = &["2025-11-25", "2025-06-18"];
pub const LATEST_VERSION: &str = "2025-11-25";

pub fn negotiate_version(client_version: &str) -> &'static str {
    SUPPORTED_VERSIONS.iter().find(|&&v| v == client_version).copied().unwrap_or(LATEST_VERSION)
}

/// Everything a tool call needs. Cloning is cheap — every field is an
/// `Arc`/`RwLock` already shared with the HTTP API and the indexer.
#[derive(Clone)]
pub struct McpState {
    pub store: Arc<SymbolStore>,
    pub trigram: Arc<TrigramIndex>,
    pub vector: Option<Arc<VectorIndexManager>>,
    pub file_sizes: Arc<RwLock<HashMap<String, u64>>>,
    pub edit: Arc<EditCoordinator>,
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "search",
            "description": "Hybrid symbol/trigram/filename/vector search over the indexed workspace.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" },
                    "limit": { "type": "integer", "description": "Maximum results", "default": 50 },
                    "include_globs": { "type": "array", "items": { "type": "string" } },
                    "exclude_globs": { "type": "array", "items": { "type": "string" } },
                    "file_types": { "type": "array", "items": { "type": "string" } },
                    "matches_per_file": { "type": "integer" },
                    "snippet_length": { "type": "integer" },
                    "group_by_file": { "type": "boolean" },
                    "deduplicate_by_content": { "type": "boolean" },
                    "case_sensitive": { "type": "boolean" },
                    "smart_case": { "type": "boolean" },
                    "word_boundary": { "type": "boolean" }
                },
                "required": ["query"]
            }
        },
        {
            "name": "edit",
            "description": "Resolve one or more fuzzy target strings in a file and replace them as one atomic operation, recording the change to history. Pass either target/replacement directly, or an edits array for several pairs against the same file. dry_run previews resolution without writing.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "file_path": { "type": "string" },
                    "target": { "type": "string" },
                    "replacement": { "type": "string" },
                    "edits": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "target": { "type": "string" },
                                "replacement": { "type": "string" },
                                "context_before": { "type": "string" },
                                "context_after": { "type": "string" },
                                "expected_content_hash": { "type": "string" },
                                "normalization": { "type": "string", "enum": ["literal", "structural"] },
                                "allow_ambiguous_auto_pick": { "type": "boolean" }
                            },
                            "required": ["target", "replacement"]
                        }
                    },
                    "description": { "type": "string" },
                    "context_before": { "type": "string" },
                    "context_after": { "type": "string" },
                    "expected_content_hash": { "type": "string" },
                    "normalization": { "type": "string", "enum": ["literal", "structural"] },
                    "allow_ambiguous_auto_pick": { "type": "boolean" },
                    "dry_run": { "type": "boolean" }
                },
                "required": ["file_path"]
            }
        },
        {
            "name": "undo",
            "description": "Undo the most recently applied edit or batch.",
            "inputSchema": { "type": "object", "properties": {} }
        },
        {
            "name": "redo",
            "description": "Redo the most recently undone edit or batch.",
            "inputSchema": { "type": "object", "properties": {} }
        },
        {
            "name": "conventions",
            "description": "Summarize detected error-handling, naming, testing, and import conventions across the indexed workspace.",
            "inputSchema": { "type": "object", "properties": {} }
        }
    ])
}

fn error_text(err: &CoreError) -> String {
    format!("{}: {}", err.code.as_str(), err.message)
}

fn json_string_array(args: &Value, key: &str) -> Vec<String> {
    args[key].as_array().map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()).unwrap_or_default()
}

fn parse_normalization(s: Option<&str>) -> Normalization {
    match s {
        Some("structural") => Normalization::Structural,
        _ => Normalization::Literal,
    }
}

fn target_edit_from_json(v: &Value) -> TargetEdit {
    TargetEdit {
        target: v["target"].as_str().unwrap_or("").to_string(),
        replacement: v["replacement"].as_str().unwrap_or("").to_string(),
        options: ResolveOptions {
            context_before: v["context_before"].as_str().map(String::from),
            context_after: v["context_after"].as_str().map(String::from),
            expected_content_hash: v["expected_content_hash"].as_str().map(String::from),
            normalization: parse_normalization(v["normalization"].as_str()),
            allow_ambiguous_auto_pick: v["allow_ambiguous_auto_pick"].as_bool().unwrap_or(false),
        },
    }
}

fn handle_tool_call(state: &McpState, name: &str, args: &Value) -> (String, bool) {
    match name {
        "search" => {
            let query = args["query"].as_str().unwrap_or("");
            let defaults = SearchOptions::default();
            let opts = SearchOptions {
                limit: args["limit"].as_u64().map(|v| v as usize).unwrap_or(defaults.limit),
                include_globs: json_string_array(args, "include_globs"),
                exclude_globs: json_string_array(args, "exclude_globs"),
                file_types: json_string_array(args, "file_types"),
                matches_per_file: args["matches_per_file"].as_u64().map(|v| v as usize).unwrap_or(defaults.matches_per_file),
                snippet_length: args["snippet_length"].as_u64().map(|v| v as usize).unwrap_or(defaults.snippet_length),
                group_by_file: args["group_by_file"].as_bool().unwrap_or(defaults.group_by_file),
                deduplicate_by_content: args["deduplicate_by_content"].as_bool().unwrap_or(false),
                case_sensitive: args["case_sensitive"].as_bool(),
                smart_case: args["smart_case"].as_bool().unwrap_or(defaults.smart_case),
                word_boundary: args["word_boundary"].as_bool().unwrap_or(false),
            };
            let sizes = state.file_sizes.read().unwrap();
            let engine = SearchEngine::new(&state.store, &state.trigram, state.vector.as_deref(), &sizes);
            let response = engine.search_with_options(query, &opts);
            let lines: Vec<String> = response
                .hits
                .iter()
                .map(|h| {
                    let head = match &h.symbol_name {
                        Some(name) => format!("{:<60} {:>6.3}  {}", h.path, h.score, name),
                        None => format!("{:<60} {:>6.3}", h.path, h.score),
                    };
                    match &h.snippet {
                        Some(snippet) => format!("{head}\n    {snippet}"),
                        None => head,
                    }
                })
                .collect();
            let mut text = lines.join("\n");
            if response.degraded {
                text.push_str("\n(degraded: one or more search signals were unavailable)");
            }
            if text.is_empty() {
                text = format!("No results for '{query}'");
            }
            (text, false)
        }
        "edit" => {
            let file_path = args["file_path"].as_str().unwrap_or("").to_string();
            let description = args["description"].as_str().unwrap_or("").to_string();
            let dry_run = args["dry_run"].as_bool().unwrap_or(false);

            let edits: Vec<TargetEdit> = match args.get("edits").and_then(|v| v.as_array()) {
                Some(arr) => arr.iter().map(target_edit_from_json).collect(),
                None => vec![target_edit_from_json(args)],
            };

            match state.edit.apply_multi_edit(file_path, edits, description, dry_run) {
                Ok(op) if dry_run => (format!("Dry run resolved {} edit(s) for {}", op.edits.len(), op.file_path), false),
                Ok(op) => (format!("Applied edit {} to {}", op.id, op.file_path), false),
                Err(e) => (error_text(&e), true),
            }
        }
        "undo" => match state.edit.undo() {
            Ok(_) => ("Undid last operation".to_string(), false),
            Err(e) => (error_text(&e), true),
        },
        "redo" => match state.edit.redo() {
            Ok(_) => ("Redid last undone operation".to_string(), false),
            Err(e) => (error_text(&e), true),
        },
        "conventions" => {
            let files: Vec<smartctx_core::conventions::ScannedFile> = state
                .store
                .paths()
                .into_iter()
                .map(|p| smartctx_core::conventions::ScannedFile { rel_path: p.clone(), abs_path: std::path::PathBuf::from(p) })
                .collect();
            let report = smartctx_core::conventions::mine_conventions(&files);
            (smartctx_core::conventions::format_conventions(&report), false)
        }
        other => (format!("Unknown tool: {other}"), true),
    }
}

/// Process a single JSON-RPC request, shared by the stdio and HTTP
/// transports. Returns `None` for notifications (no `id`).
pub fn dispatch_jsonrpc(state: &McpState, msg: &Value) -> Option<Value> {
    let method = msg["method"].as_str().unwrap_or("");
    let id = msg.get("id").cloned();

    if id.is_none() || method.starts_with("notifications/") {
        return None;
    }

    let response = match method {
        "initialize" => {
            let client_version = msg["params"]["protocolVersion"].as_str().unwrap_or("");
            let negotiated = negotiate_version(client_version);
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": negotiated,
                    "capabilities": {
                        "tools": { "listChanged": true },
                        "prompts": { "listChanged": false },
                        "resources": { "listChanged": false }
                    },
                    "serverInfo": { "name": "smartctx", "version": env!("CARGO_PKG_VERSION") },
                    "instructions": "smartctx indexes this workspace for hybrid code search and fuzzy-target edits. Use search for discovery, edit/undo/redo to make and revert changes, conventions to summarize detected code style."
                }
            })
        }
        "tools/list" => json!({ "jsonrpc": "2.0", "id": id, "result": { "tools": tool_definitions() } }),
        "tools/call" => {
            let tool_name = msg["params"]["name"].as_str().unwrap_or("");
            let arguments = msg["params"].get("arguments").cloned().unwrap_or(json!({}));
            let (text, is_error) = handle_tool_call(state, tool_name, &arguments);
            let content_text = if is_error { format!("\u{26a0} Error: {text}") } else { text };
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "content": [{ "type": "text", "text": content_text }], "isError": false }
            })
        }
        "ping" => json!({ "jsonrpc": "2.0", "id": id, "result": {} }),
        _ => json!({ "jsonrpc": "2.0", "id": id, "error": { "code": -32601, "message": "Method not found" } }),
    };

    Some(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartctx_core::edit::{EditCoordinator, EditResolver, Editor, History};
    use smartctx_core::fs::MemFs;

    fn state() -> McpState {
        let fs = Arc::new(MemFs::new());
        let root = std::path::PathBuf::from("/proj");
        let store = Arc::new(SymbolStore::new());
        let trigram = Arc::new(TrigramIndex::new());
        let resolver = EditResolver::new(100 * 1024, 4);
        let editor = Editor::new(fs.clone(), root.join("backups"), 10);
        let history = History::new(fs.clone(), root.join("history.json"), 50);
        let edit = Arc::new(EditCoordinator::new(fs, root, resolver, editor, history));
        McpState { store, trigram, vector: None, file_sizes: Arc::new(RwLock::new(HashMap::new())), edit }
    }

    #[test]
    fn initialize_negotiates_version() {
        let msg = json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize", "params": { "protocolVersion": "2025-06-18" } });
        let response = dispatch_jsonrpc(&state(), &msg).unwrap();
        assert_eq!(response["result"]["protocolVersion"], "2025-06-18");
    }

    #[test]
    fn notifications_produce_no_response() {
        let msg = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        assert!(dispatch_jsonrpc(&state(), &msg).is_none());
    }

    #[test]
    fn tools_list_includes_search_and_edit() {
        let msg = json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" });
        let response = dispatch_jsonrpc(&state(), &msg).unwrap();
        let tools = response["result"]["tools"].as_array().unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert!(names.contains(&"search"));
        assert!(names.contains(&"edit"));
    }

    #[test]
    fn search_tool_call_with_no_index_returns_empty_message() {
        let msg = json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": { "name": "search", "arguments": { "query": "anything" } }
        });
        let response = dispatch_jsonrpc(&state(), &msg).unwrap();
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("No results"));
    }
}
