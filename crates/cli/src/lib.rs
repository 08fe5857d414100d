//! Argument definitions for the `smartctx` binary. Kept in its own crate
//! because the server binary needs `Cli::command()` for shell-completion
//! generation without pulling in the rest of `server`'s dependency graph.
//! Covers `init`, `doctor`, a default run mode, and the flags that
//! configure it.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Workspace code-intelligence service — incremental indexer, hybrid
/// search, fuzzy-target edit engine, and a unified context graph exposed
/// over HTTP and MCP.
#[derive(Parser, Debug)]
#[command(name = "smartctx", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Project root directory (default: current directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Named repository (repeatable, format: NAME=PATH)
    #[arg(long = "repo", value_name = "NAME=PATH")]
    pub repos: Vec<String>,

    /// Load repos from a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run as MCP stdio server
    #[arg(long)]
    pub mcp: bool,

    /// Token counter: bytes-estimate (default) or tiktoken
    #[arg(long, default_value = "bytes-estimate")]
    pub tokenizer: String,

    /// Disable semantic code search (enabled by default when the
    /// `semantic` feature is compiled in)
    #[arg(long)]
    pub no_semantic: bool,

    /// Embedding model: minilm (default), or a HuggingFace model ID
    #[arg(long)]
    pub semantic_model: Option<String>,

    /// Block startup until the vector index is fully built
    #[arg(long)]
    pub wait_semantic: bool,

    /// Enable OAuth with the given authorization server URL
    #[arg(long)]
    pub auth_issuer: Option<String>,

    /// Comma-separated allowed Origin headers for the MCP HTTP transport
    #[arg(long)]
    pub allowed_origins: Option<String>,

    /// Bind to 0.0.0.0 instead of 127.0.0.1 (localhost)
    #[arg(long)]
    pub bind_all: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect the project's ecosystem and write `.smartctx.toml`
    Init {
        /// Project path (default: current directory)
        path: Option<PathBuf>,

        /// Add to the global config (`~/.smartctx/repos.toml`) instead of local
        #[arg(long)]
        global: bool,

        /// Pre-build the vector index during init
        #[arg(long)]
        semantic: bool,
    },
    /// Diagnose index health: config parse errors, stale backups, orphaned history
    Doctor {
        /// Project path (default: current directory)
        path: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}
