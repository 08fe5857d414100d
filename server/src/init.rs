//! `smartctx init` and `smartctx doctor` — project setup and health
//! checks. `init` detects the project root, writes a starter
//! `.smartctx.toml` if one is missing, writes or merges a `.mcp.json`
//! pointing Claude Code at this binary, then does a quick validation scan
//! so the user sees file counts instead of silence.

use smartctx_core::Config;
use std::path::{Path, PathBuf};

fn resolve_root(path: Option<&Path>) -> PathBuf {
    let root = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|e| {
            eprintln!("Error: could not determine current directory: {e}");
            std::process::exit(1);
        }),
    };
    root.canonicalize().unwrap_or_else(|e| {
        eprintln!("Error: path '{}' not found: {e}", root.display());
        std::process::exit(1);
    })
}

const STARTER_TOML: &str = r#"# smartctx project configuration. See `.smart-context/` for persisted
# index, history, and vector data. Every key below matches the built-in
# default and may be removed freely.

exclude_globs = [".git", "node_modules", "__pycache__", "target", "dist", "build", ".next", "vendor", ".smart-context"]
max_nodes = 5000
backups_per_file = 10
undo_depth = 50
resolve_timeout_ms = 1500
debounce_ms = 100
ghost_retention_secs = 600

[vector_index]
mode = "auto"
rebuild = "auto"
"#;

fn write_mcp_json(root: &Path) -> Result<(), String> {
    let path = root.join(".mcp.json");
    let exe = std::env::current_exe().map_err(|e| e.to_string())?;
    let entry = serde_json::json!({
        "command": exe.display().to_string(),
        "args": ["--root", root.display().to_string(), "--mcp"],
    });

    let mut doc: serde_json::Value = if path.exists() {
        let content = std::fs::read_to_string(&path).map_err(|e| e.to_string())?;
        serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({"mcpServers": {}}))
    } else {
        serde_json::json!({ "mcpServers": {} })
    };

    let name = root.file_name().and_then(|n| n.to_str()).unwrap_or("smartctx");
    doc["mcpServers"][name] = entry;

    std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap() + "\n").map_err(|e| e.to_string())
}

fn count_scannable_files(root: &Path, config: &Config) -> usize {
    use ignore::WalkBuilder;
    let skip = config.skip_dir_set();
    WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .filter(|entry| {
            !entry.path().components().any(|c| skip.contains(c.as_os_str().to_string_lossy().as_ref()))
        })
        .count()
}

/// Detect the project root, write `.smartctx.toml` and `.mcp.json` if
/// missing, then report a quick file count. Returns a process exit code.
pub fn run_init(path: Option<&Path>) -> i32 {
    let root = resolve_root(path);
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("smartctx {version} init");
    eprintln!("  Project root: {}", root.display());

    let config_path = root.join(".smartctx.toml");
    if config_path.exists() {
        eprintln!("  .smartctx.toml already exists, skipping");
    } else if let Err(e) = std::fs::write(&config_path, STARTER_TOML) {
        eprintln!("Error: failed to write .smartctx.toml: {e}");
        return 1;
    } else {
        eprintln!("  Created .smartctx.toml");
    }

    if let Err(e) = write_mcp_json(&root) {
        eprintln!("Error: failed to write .mcp.json: {e}");
        return 1;
    }
    eprintln!("  Wrote .mcp.json entry");

    let config = Config::load(&root);
    let file_count = count_scannable_files(&root, &config);
    if file_count > 0 {
        eprintln!("  Validated: {file_count} source files found");
    } else {
        eprintln!("  [WARN] No files found under current excludeGlobs.");
    }

    eprintln!();
    eprintln!("  Open Claude Code in {} — smartctx tools are now available.", root.display());
    0
}

/// Diagnose index health: config parse errors, stale backups, orphaned
/// history. Returns a process exit code (1 if any check failed).
pub fn run_doctor(path: Option<&Path>) -> i32 {
    let root = resolve_root(path);
    let version = env!("CARGO_PKG_VERSION");
    let mut has_warn = false;
    let mut has_fail = false;

    eprintln!("smartctx doctor");
    eprintln!();
    eprintln!("  [PASS] smartctx v{version}");

    let config_path = root.join(".smartctx.toml");
    if config_path.exists() {
        match std::fs::read_to_string(&config_path).unwrap_or_default().parse::<toml::Table>() {
            Ok(_) => eprintln!("  [PASS] .smartctx.toml exists and is valid TOML"),
            Err(e) => {
                eprintln!("  [FAIL] .smartctx.toml exists but is invalid: {e}");
                has_fail = true;
            }
        }
    } else {
        eprintln!("  [WARN] .smartctx.toml not found (using defaults)");
        has_warn = true;
    }

    let smart_context_dir = Config::smart_context_dir(&root);
    if smart_context_dir.exists() {
        eprintln!("  [PASS] .smart-context/ present");

        let history_path = Config::history_dir(&root).join("transactions.json");
        if history_path.exists() {
            match std::fs::read_to_string(&history_path).and_then(|c| {
                serde_json::from_str::<serde_json::Value>(&c).map_err(|e| std::io::Error::other(e))
            }) {
                Ok(_) => eprintln!("  [PASS] undo/redo history is valid JSON"),
                Err(e) => {
                    eprintln!("  [FAIL] undo/redo history is corrupt: {e}");
                    has_fail = true;
                }
            }
        }

        let backups_dir = Config::backups_dir(&root);
        if let Ok(entries) = std::fs::read_dir(&backups_dir) {
            let count = entries.count();
            eprintln!("  [PASS] {count} backup file(s) retained");
        }
    } else {
        eprintln!("  [WARN] .smart-context/ not found — run `smartctx init` or start the server once");
        has_warn = true;
    }

    let mcp_json = root.join(".mcp.json");
    if mcp_json.exists() {
        eprintln!("  [PASS] .mcp.json present");
    } else {
        eprintln!("  [WARN] .mcp.json not found — Claude Code won't auto-discover this project");
        has_warn = true;
    }

    eprintln!();
    if has_fail {
        eprintln!("  Doctor found failures — see [FAIL] lines above.");
        1
    } else if has_warn {
        eprintln!("  Doctor found warnings — see [WARN] lines above.");
        0
    } else {
        eprintln!("  Everything looks good.");
        0
    }
}
