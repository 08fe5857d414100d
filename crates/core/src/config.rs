//! `.smartctx.toml` project configuration — include/exclude globs, UCG and
//! history budgets, vector index policy, and the levenshtein cost
//! guardrails. CLI flags take precedence over file values, matching
//! the project's `--repo`/`--config` override order.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorMode {
    Off,
    Bruteforce,
    Hnsw,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RebuildPolicy {
    Manual,
    OnStart,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VectorIndexConfig {
    pub mode: VectorMode,
    pub rebuild: RebuildPolicy,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self { mode: VectorMode::Auto, rebuild: RebuildPolicy::Auto }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub max_nodes: usize,
    pub backups_per_file: usize,
    pub undo_depth: usize,
    pub resolve_timeout_ms: u64,
    pub vector_index: VectorIndexConfig,
    pub levenshtein_max_file_size: u64,
    pub levenshtein_min_target_len: usize,
    /// Per-path debounce window for the watcher, in milliseconds.
    pub debounce_ms: u64,
    /// Ghost symbol retention window, in seconds — see DESIGN.md.
    pub ghost_retention_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_globs: Vec::new(),
            exclude_globs: default_exclude_globs(),
            max_nodes: 5000,
            backups_per_file: 10,
            undo_depth: 50,
            resolve_timeout_ms: 1500,
            vector_index: VectorIndexConfig::default(),
            levenshtein_max_file_size: 100 * 1024,
            levenshtein_min_target_len: 4,
            debounce_ms: 100,
            ghost_retention_secs: 600,
        }
    }
}

fn default_exclude_globs() -> Vec<String> {
    [".git", "node_modules", "__pycache__", "target", "dist", "build", ".next", "vendor", ".smart-context"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    /// Load `<root>/.smartctx.toml`, falling back to defaults when absent or
    /// unparsable (logged, not fatal — a bad config shouldn't keep the
    /// server from starting).
    pub fn load(root: &Path) -> Self {
        let path = root.join(".smartctx.toml");
        match std::fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %path.display(), "Failed to parse config, using defaults");
                Config::default()
            }),
            Err(_) => Config::default(),
        }
    }

    pub fn skip_dir_set(&self) -> HashSet<String> {
        self.exclude_globs.iter().cloned().collect()
    }

    pub fn smart_context_dir(root: &Path) -> PathBuf {
        root.join(".smart-context")
    }

    pub fn index_dir(root: &Path) -> PathBuf {
        Self::smart_context_dir(root).join("data/index")
    }

    pub fn skeleton_cache_dir(root: &Path) -> PathBuf {
        Self::smart_context_dir(root).join("data/cache/skeletons")
    }

    pub fn history_dir(root: &Path) -> PathBuf {
        Self::smart_context_dir(root).join("data/history")
    }

    pub fn backups_dir(root: &Path) -> PathBuf {
        Self::history_dir(root).join("backups")
    }

    pub fn vector_index_dir(root: &Path, provider: &str, model: &str) -> PathBuf {
        Self::smart_context_dir(root).join("vector-index").join(provider).join(model)
    }

    pub fn ucg_checkpoint_path(root: &Path) -> PathBuf {
        Self::smart_context_dir(root).join("ucg.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let c = Config::default();
        assert_eq!(c.max_nodes, 5000);
        assert_eq!(c.backups_per_file, 10);
        assert_eq!(c.undo_depth, 50);
        assert_eq!(c.resolve_timeout_ms, 1500);
        assert_eq!(c.levenshtein_max_file_size, 100 * 1024);
        assert_eq!(c.levenshtein_min_target_len, 4);
        assert_eq!(c.debounce_ms, 100);
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = Config::load(dir.path());
        assert_eq!(c.max_nodes, 5000);
    }

    #[test]
    fn loads_overrides_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".smartctx.toml"), "max_nodes = 100\nundo_depth = 5\n").unwrap();
        let c = Config::load(dir.path());
        assert_eq!(c.max_nodes, 100);
        assert_eq!(c.undo_depth, 5);
    }
}
