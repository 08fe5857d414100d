//! Stdio transport — newline-delimited JSON-RPC over stdin/stdout, for
//! clients that launch `smartctx --mcp` as a subprocess. Parse errors
//! reply with `-32700` but keep the loop alive, `notifications/*` are
//! consumed silently, and any non-initialize method sent before
//! `initialize` gets `-32002` ("Server not initialized").

use crate::{dispatch_jsonrpc, McpState};
use std::io::{self, BufRead, Write};

pub fn run_mcp(state: &McpState) -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut initialized = false;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let msg: serde_json::Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(_) => {
                let err = serde_json::json!({
                    "jsonrpc": "2.0", "id": null,
                    "error": { "code": -32700, "message": "Parse error" }
                });
                writeln!(stdout, "{err}")?;
                stdout.flush()?;
                continue;
            }
        };

        let method = msg["method"].as_str().unwrap_or("");
        if method.starts_with("notifications/") {
            continue;
        }

        if !initialized && method != "initialize" && method != "ping" {
            if let Some(id) = msg.get("id") {
                let err = serde_json::json!({
                    "jsonrpc": "2.0", "id": id,
                    "error": { "code": -32002, "message": "Server not initialized" }
                });
                writeln!(stdout, "{err}")?;
                stdout.flush()?;
            }
            continue;
        }

        if method == "initialize" {
            initialized = true;
        }

        if let Some(response) = dispatch_jsonrpc(state, &msg) {
            writeln!(stdout, "{response}")?;
            stdout.flush()?;
        }
    }

    Ok(())
}
