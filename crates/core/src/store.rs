//! Symbol Store — the Indexer's exclusive-owned table of per-file
//! `SymbolRecord`s, keyed by path, gated by the content-hash short-circuit.
//! Ghost tombstones are retained for a bounded window after a symbol
//! disappears so edit-resolution and search can still explain a recent
//! rename or deletion.

use crate::model::{GhostSymbol, Symbol, SymbolRecord};
use dashmap::DashMap;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// Content hash used for the unchanged-file short-circuit. Fast and
/// non-cryptographic — this is a cache-invalidation key, not a security
/// boundary (SHA-256 is reserved for edit-resolution hash verification).
pub fn content_hash(content: &str) -> u64 {
    xxhash_rust::xxh3::xxh3_64(content.as_bytes())
}

#[derive(Default)]
pub struct SymbolStore {
    records: DashMap<String, SymbolRecord>,
    ghosts: DashMap<String, Vec<GhostSymbol>>,
}

impl SymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `path` is indexed and `content` hashes to the same
    /// value already on record — the caller should skip reparsing.
    pub fn is_unchanged(&self, path: &str, content: &str) -> bool {
        match self.records.get(path) {
            Some(existing) => existing.content_hash == content_hash(content),
            None => false,
        }
    }

    /// Replace the record for `path` atomically, diffing the previous
    /// symbol names against the new ones and recording ghosts for any that
    /// disappeared.
    pub fn upsert(&self, path: &str, content: &str, symbols: Vec<Symbol>) {
        let new_hash = content_hash(content);
        if let Some(previous) = self.records.get(path) {
            let previous_names: std::collections::HashSet<&str> =
                previous.symbols.iter().filter_map(|s| s.name()).collect();
            let new_names: std::collections::HashSet<&str> = symbols.iter().filter_map(|s| s.name()).collect();
            let removed: Vec<GhostSymbol> = previous_names
                .difference(&new_names)
                .map(|name| GhostSymbol { name: name.to_string(), last_known_path: path.to_string(), removed_at: now_unix() })
                .collect();
            if !removed.is_empty() {
                self.ghosts.entry(path.to_string()).or_default().extend(removed);
            }
        }
        self.records.insert(
            path.to_string(),
            SymbolRecord { path: path.to_string(), content_hash: new_hash, parsed_at: now_unix(), symbols },
        );
    }

    /// Drop the record for `path` entirely (file deleted), tombstoning all
    /// of its symbols as ghosts.
    pub fn remove(&self, path: &str) {
        if let Some((_, record)) = self.records.remove(path) {
            let ghosts: Vec<GhostSymbol> = record
                .symbols
                .iter()
                .filter_map(|s| s.name())
                .map(|name| GhostSymbol { name: name.to_string(), last_known_path: path.to_string(), removed_at: now_unix() })
                .collect();
            if !ghosts.is_empty() {
                self.ghosts.entry(path.to_string()).or_default().extend(ghosts);
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<SymbolRecord> {
        self.records.get(path).map(|r| r.clone())
    }

    pub fn paths(&self) -> Vec<String> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Evict ghosts older than `retention_secs` (`Config::ghost_retention_secs`,
    /// default 600s).
    pub fn evict_expired_ghosts(&self, retention_secs: i64) {
        let cutoff = now_unix() - retention_secs;
        self.ghosts.retain(|_, ghosts| {
            ghosts.retain(|g| g.removed_at >= cutoff);
            !ghosts.is_empty()
        });
    }

    pub fn ghosts_for(&self, path: &str) -> Vec<GhostSymbol> {
        self.ghosts.get(path).map(|g| g.clone()).unwrap_or_default()
    }

    pub fn all_ghosts(&self) -> Vec<GhostSymbol> {
        self.ghosts.iter().flat_map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefinitionKind, Definition, Range};

    fn def(name: &str) -> Symbol {
        Symbol::Definition(Definition {
            kind: DefinitionKind::Function,
            name: name.to_string(),
            container: None,
            signature: format!("fn {name}()"),
            parameters: vec![],
            return_type: None,
            modifiers: vec![],
            doc: None,
            range: Range { start_line: 1, end_line: 1, start_byte: 0, end_byte: 10 },
        })
    }

    #[test]
    fn unchanged_content_short_circuits() {
        let store = SymbolStore::new();
        store.upsert("a.rs", "fn a() {}", vec![def("a")]);
        assert!(store.is_unchanged("a.rs", "fn a() {}"));
        assert!(!store.is_unchanged("a.rs", "fn a() { 1 }"));
        assert!(!store.is_unchanged("b.rs", "fn a() {}"));
    }

    #[test]
    fn removed_symbol_becomes_ghost() {
        let store = SymbolStore::new();
        store.upsert("a.rs", "fn a() {} fn b() {}", vec![def("a"), def("b")]);
        store.upsert("a.rs", "fn a() {}", vec![def("a")]);
        let ghosts = store.ghosts_for("a.rs");
        assert_eq!(ghosts.len(), 1);
        assert_eq!(ghosts[0].name, "b");
    }

    #[test]
    fn deleting_file_tombstones_all_symbols() {
        let store = SymbolStore::new();
        store.upsert("a.rs", "fn a() {}", vec![def("a")]);
        store.remove("a.rs");
        assert!(store.get("a.rs").is_none());
        assert_eq!(store.ghosts_for("a.rs").len(), 1);
    }

    #[test]
    fn expired_ghosts_are_evicted() {
        let store = SymbolStore::new();
        store.upsert("a.rs", "fn a() {} fn b() {}", vec![def("a"), def("b")]);
        store.upsert("a.rs", "fn a() {}", vec![def("a")]);
        store.evict_expired_ghosts(-1);
        assert!(store.ghosts_for("a.rs").is_empty());
    }
}
