//! Integration tests exercising the MCP tool surface end-to-end against a
//! real indexed fixture project: initialize, tools/list, and tools/call for
//! search/edit/undo/redo/conventions.

mod helpers;

use helpers::TestHarness;
use serde_json::json;

#[test]
fn initialize_negotiates_latest_version() {
    let harness = TestHarness::from_fixture("basic");
    let response = harness.initialize();
    assert_eq!(response["result"]["protocolVersion"], "2025-11-25");
    assert_eq!(response["result"]["serverInfo"]["name"], "smartctx");
}

#[test]
fn tools_list_exposes_all_five_tools() {
    let harness = TestHarness::from_fixture("basic");
    let msg = json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" });
    let response = harness.dispatch(msg).unwrap();
    let tools = response["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    for expected in ["search", "edit", "undo", "redo", "conventions"] {
        assert!(names.contains(&expected), "expected tool '{expected}' in {names:?}");
    }
}

#[test]
fn search_finds_symbol_by_name() {
    let harness = TestHarness::from_fixture("basic");
    let (text, is_error) = harness.call_tool("search", json!({ "query": "greet" }));
    assert!(!is_error, "search returned an error: {text}");
    assert!(text.contains("lib.rs"), "expected lib.rs in results, got: {text}");
}

#[test]
fn search_with_no_matches_reports_no_results() {
    let harness = TestHarness::from_fixture("basic");
    let (text, is_error) = harness.call_tool("search", json!({ "query": "nonexistent_symbol_xyz" }));
    assert!(!is_error);
    assert!(text.contains("No results"));
}

#[test]
fn edit_replaces_target_and_is_undoable() {
    let harness = TestHarness::from_fixture("basic");
    let (text, is_error) = harness.call_tool(
        "edit",
        json!({
            "file_path": "src/lib.rs",
            "target": "Hello, {}!",
            "replacement": "Hi, {}!",
            "description": "soften greeting"
        }),
    );
    assert!(!is_error, "edit returned an error: {text}");
    assert!(text.contains("lib.rs"));

    let path = harness.root.join("src/lib.rs");
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("Hi, {}!"));

    let (undo_text, undo_is_error) = harness.call_tool("undo", json!({}));
    assert!(!undo_is_error, "undo returned an error: {undo_text}");
    let contents_after_undo = std::fs::read_to_string(&path).unwrap();
    assert!(contents_after_undo.contains("Hello, {}!"));

    let (redo_text, redo_is_error) = harness.call_tool("redo", json!({}));
    assert!(!redo_is_error, "redo returned an error: {redo_text}");
    let contents_after_redo = std::fs::read_to_string(&path).unwrap();
    assert!(contents_after_redo.contains("Hi, {}!"));
}

#[test]
fn edit_with_unresolvable_target_reports_error() {
    let harness = TestHarness::from_fixture("basic");
    let (text, is_error) = harness.call_tool(
        "edit",
        json!({
            "file_path": "src/lib.rs",
            "target": "this string does not appear anywhere in the file",
            "replacement": "x",
        }),
    );
    assert!(is_error, "expected an error for an unresolvable target, got: {text}");
}

#[test]
fn edit_rejects_ambiguous_target_without_auto_pick() {
    let harness = TestHarness::from_fixture("basic");
    let (text, is_error) = harness.call_tool(
        "edit",
        json!({
            "file_path": "src/lib.rs",
            "target": "config.name",
            "replacement": "config.label",
        }),
    );
    assert!(is_error, "expected config.name (occurs twice) to be ambiguous, got: {text}");
    assert!(text.contains("AMBIGUOUS_MATCH"), "expected AMBIGUOUS_MATCH code, got: {text}");
}

#[test]
fn edit_with_edits_array_applies_both_pairs_atomically() {
    let harness = TestHarness::from_fixture("basic");
    let (text, is_error) = harness.call_tool(
        "edit",
        json!({
            "file_path": "src/lib.rs",
            "description": "soften both messages",
            "edits": [
                { "target": "Hello, {}!", "replacement": "Hi, {}!" },
                { "target": "Name cannot be empty", "replacement": "Name must not be empty" },
            ],
        }),
    );
    assert!(!is_error, "multi-edit returned an error: {text}");
    let contents = std::fs::read_to_string(harness.root.join("src/lib.rs")).unwrap();
    assert!(contents.contains("Hi, {}!"));
    assert!(contents.contains("Name must not be empty"));

    let (_undo_text, undo_is_error) = harness.call_tool("undo", json!({}));
    assert!(!undo_is_error);
    let restored = std::fs::read_to_string(harness.root.join("src/lib.rs")).unwrap();
    assert!(restored.contains("Hello, {}!"));
    assert!(restored.contains("Name cannot be empty"));
}

#[test]
fn edit_dry_run_previews_without_writing_or_recording_history() {
    let harness = TestHarness::from_fixture("basic");
    let (text, is_error) = harness.call_tool(
        "edit",
        json!({
            "file_path": "src/lib.rs",
            "target": "Hello, {}!",
            "replacement": "Hi, {}!",
            "dry_run": true,
        }),
    );
    assert!(!is_error, "dry run returned an error: {text}");
    let contents = std::fs::read_to_string(harness.root.join("src/lib.rs")).unwrap();
    assert!(contents.contains("Hello, {}!"), "dry run must not write to disk");

    let (_undo_text, undo_is_error) = harness.call_tool("undo", json!({}));
    assert!(undo_is_error, "a dry run must not leave a history entry to undo");
}

#[test]
fn search_file_types_filter_excludes_other_extensions() {
    let harness = TestHarness::from_fixture("basic");
    let (text, is_error) = harness.call_tool("search", json!({ "query": "greet", "file_types": ["py"] }));
    assert!(!is_error);
    assert!(text.contains("No results"), "expected no .rs hits under a .py-only filter, got: {text}");
}

#[test]
fn search_comment_signal_surfaces_doc_comment_match() {
    let harness = TestHarness::from_fixture("basic");
    let (text, is_error) = harness.call_tool("search", json!({ "query": "greet a user by name" }));
    assert!(!is_error, "search returned an error: {text}");
    assert!(text.contains("lib.rs"), "expected the doc comment on greet() to surface lib.rs, got: {text}");
}

#[test]
fn undo_with_empty_history_reports_error() {
    let harness = TestHarness::from_fixture("basic");
    let (_text, is_error) = harness.call_tool("undo", json!({}));
    assert!(is_error);
}

#[test]
fn conventions_summarizes_scanned_files() {
    let harness = TestHarness::from_fixture("basic");
    let (text, is_error) = harness.call_tool("conventions", json!({}));
    assert!(!is_error, "conventions returned an error: {text}");
    assert!(!text.is_empty());
}

#[test]
fn ping_is_answered_without_initialize() {
    let harness = TestHarness::from_fixture("basic");
    let msg = json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" });
    let response = harness.dispatch(msg).unwrap();
    assert_eq!(response["result"], json!({}));
}
