//! Test harness for MCP tool integration tests. Builds a real `Indexer`
//! over a fixture project copied into a temp dir, then dispatches JSON-RPC
//! requests via `dispatch_jsonrpc()` directly — no subprocess, no HTTP.

pub mod fixtures;

use smartctx_core::edit::{EditCoordinator, EditResolver, Editor, History};
use smartctx_core::{Config, Indexer, RealFs};
use smartctx_mcp::McpState;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tempfile::TempDir;

pub struct TestHarness {
    pub mcp: McpState,
    pub indexer: Arc<Indexer>,
    pub root: std::path::PathBuf,
    _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a harness from a named fixture directory under `tests/fixtures/`.
    pub fn from_fixture(name: &str) -> Self {
        let fixture_src = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
        assert!(fixture_src.exists(), "Fixture '{name}' not found at {}", fixture_src.display());

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        fixtures::copy_dir_recursive(&fixture_src, &root);

        let fs = Arc::new(RealFs);
        let config = Config::default();
        let indexer = Arc::new(Indexer::new(root.clone(), config.clone(), fs.clone()));
        indexer.run_initial_scan().expect("initial scan failed");

        let resolver = EditResolver::new(config.levenshtein_max_file_size, config.levenshtein_min_target_len);
        let editor = Editor::new(fs.clone(), Config::backups_dir(&root), config.backups_per_file);
        let history = History::new(fs.clone(), Config::history_dir(&root).join("transactions.json"), config.undo_depth);
        let edit = Arc::new(EditCoordinator::new(fs, root, resolver, editor, history));

        let mcp = McpState {
            store: indexer.store(),
            trigram: indexer.trigram(),
            vector: None,
            file_sizes: Arc::new(RwLock::new(HashMap::new())),
            edit,
        };

        TestHarness { mcp, indexer, root, _temp_dir: temp_dir }
    }

    pub fn dispatch(&self, msg: Value) -> Option<Value> {
        smartctx_mcp::dispatch_jsonrpc(&self.mcp, &msg)
    }

    /// Call an MCP tool by name with the given arguments. Returns (text, is_error).
    pub fn call_tool(&self, tool: &str, args: Value) -> (String, bool) {
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": tool, "arguments": args }
        });
        let resp = self.dispatch(msg).expect("Expected response for tools/call");
        let text = resp["result"]["content"][0]["text"].as_str().unwrap_or("").to_string();
        let is_error = text.starts_with('\u{26a0}');
        (text, is_error)
    }

    pub fn initialize(&self) -> Value {
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-11-25",
                "capabilities": {},
                "clientInfo": { "name": "test", "version": "0.1.0" }
            }
        });
        self.dispatch(msg).expect("Expected initialize response")
    }
}
