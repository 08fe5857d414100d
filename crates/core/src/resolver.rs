//! Module Resolver — maps an `Import`/`Export`'s `source` specifier
//! to a concrete indexed file path, trying (in order) an exact relative
//! path, configured alias prefixes, extension candidates, and `index.<ext>`
//! directory entries.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Extension candidates tried in order when a specifier omits one, per
/// source language family.
const EXTENSION_CANDIDATES: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "go", "rs"];

/// `tsconfig.json`/`jsconfig.json`-style path aliases, e.g. `"@/*" ->
/// "src/*"`. Populated from config; empty by default.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    pub aliases: BTreeMap<String, String>,
}

/// Resolves import specifiers against a set of indexed file paths.
pub struct ModuleResolver<'a> {
    indexed_paths: &'a dashmap::DashSet<String>,
    config: ResolverConfig,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(indexed_paths: &'a dashmap::DashSet<String>, config: ResolverConfig) -> Self {
        Self { indexed_paths, config }
    }

    /// Resolve `specifier` as imported from `importer_path`. Returns `None`
    /// for bare package specifiers (no relative or aliased form resolves to
    /// an indexed file) — these contribute no dependency edge; only
    /// intra-workspace imports are graphed.
    pub fn resolve(&self, importer_path: &str, specifier: &str) -> Option<String> {
        if let Some(resolved) = self.resolve_relative(importer_path, specifier) {
            return Some(resolved);
        }
        if let Some(aliased) = self.resolve_alias(specifier) {
            return self.resolve_relative(importer_path, &aliased).or_else(|| self.try_candidates(&aliased));
        }
        None
    }

    fn resolve_alias(&self, specifier: &str) -> Option<String> {
        for (prefix, target) in &self.config.aliases {
            let prefix_stem = prefix.trim_end_matches('*');
            if let Some(rest) = specifier.strip_prefix(prefix_stem) {
                let target_stem = target.trim_end_matches('*');
                return Some(format!("{target_stem}{rest}"));
            }
        }
        None
    }

    fn resolve_relative(&self, importer_path: &str, specifier: &str) -> Option<String> {
        if !(specifier.starts_with('.') || specifier.starts_with('/')) {
            return None;
        }
        let base = if specifier.starts_with('/') {
            PathBuf::from(specifier.trim_start_matches('/'))
        } else {
            Path::new(importer_path).parent().unwrap_or_else(|| Path::new("")).join(specifier)
        };
        self.try_candidates(&lexical_normalize(&base))
    }

    fn try_candidates(&self, base: &str) -> Option<String> {
        if self.indexed_paths.contains(base) {
            return Some(base.to_string());
        }
        for ext in EXTENSION_CANDIDATES {
            let candidate = format!("{base}.{ext}");
            if self.indexed_paths.contains(&candidate) {
                return Some(candidate);
            }
        }
        for ext in EXTENSION_CANDIDATES {
            let candidate = format!("{base}/index.{ext}");
            if self.indexed_paths.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}

fn lexical_normalize(path: &Path) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                parts.pop();
            }
            std::path::Component::Normal(s) => parts.push(s.to_str().unwrap_or("")),
            _ => {}
        }
    }
    parts.join("/")
}
