//! Search Engine — blends symbol, trigram, filename, comment, and vector
//! signals into a single ranked result list. Candidates are collected in
//! the fixed order symbol -> trigram -> filename -> comment -> vector, each
//! signal normalized to `[0, 1]` independently, a large-file penalty capped
//! at 0.9 applied, then combined with an intent-dependent weight vector.
//! Each signal comes from an existing component: `store.rs` for symbol
//! name and doc-comment matching, `trigram.rs`'s BM25 scorer for content
//! relevance, `fuzzy.rs`'s FZF matcher for the filename signal, and
//! `vector.rs` for semantic similarity. `SearchOptions` layers glob/file-type
//! filtering, case sensitivity, word-boundary matching, snippet extraction,
//! and per-file grouping/deduplication on top of that blend.

use crate::fuzzy;
use crate::model::Symbol;
use crate::store::SymbolStore;
use crate::trigram::TrigramIndex;
use crate::vector::VectorIndexManager;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::path::Path;

/// Large files are still useful hits but shouldn't dominate purely by
/// virtue of containing more trigrams; cap their contribution at 90% of
/// what an equally-relevant small file would score.
const LARGE_FILE_PENALTY: f64 = 0.9;
const LARGE_FILE_THRESHOLD_BYTES: u64 = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Symbol,
    File,
    Code,
    Bug,
}

/// Classify query intent from cheap lexical cues, the same kind of
/// heuristic dispatch a CLI would use to choose between a path lookup, a
/// symbol lookup, and a free-text search based on query shape.
pub fn classify_intent(query: &str) -> Intent {
    let trimmed = query.trim();
    if trimmed.contains('/') || trimmed.ends_with(".rs") || trimmed.ends_with(".ts") || trimmed.ends_with(".py") {
        return Intent::File;
    }
    if trimmed.split_whitespace().count() == 1 && trimmed.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Intent::Symbol;
    }
    let lower = trimmed.to_lowercase();
    if lower.contains("error") || lower.contains("panic") || lower.contains("crash") || lower.contains("fail") {
        return Intent::Bug;
    }
    Intent::Code
}

struct Weights {
    symbol: f64,
    trigram: f64,
    filename: f64,
    comment: f64,
    vector: f64,
}

fn weights_for(intent: Intent) -> Weights {
    match intent {
        Intent::Symbol => Weights { symbol: 0.45, trigram: 0.2, filename: 0.15, comment: 0.1, vector: 0.1 },
        Intent::File => Weights { symbol: 0.1, trigram: 0.1, filename: 0.65, comment: 0.05, vector: 0.1 },
        Intent::Code => Weights { symbol: 0.2, trigram: 0.3, filename: 0.1, comment: 0.15, vector: 0.25 },
        Intent::Bug => Weights { symbol: 0.1, trigram: 0.25, filename: 0.05, comment: 0.15, vector: 0.45 },
    }
}

/// Tunables for a single search call. `limit`/`query` apart from this
/// struct are passed separately to `search_with_options`. Defaults match
/// the behavior of the older single-signal-blend `search` convenience
/// method.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    /// Only paths matching at least one of these globs are considered
    /// (relative to the indexed root). Empty means no include filter.
    pub include_globs: Vec<String>,
    /// Paths matching any of these globs are dropped even if they'd
    /// otherwise match `include_globs`.
    pub exclude_globs: Vec<String>,
    /// File extensions (without the leading dot) to restrict results to.
    /// Empty means no restriction.
    pub file_types: Vec<String>,
    /// Maximum number of per-file match snippets returned when
    /// `group_by_file` is `false`.
    pub matches_per_file: usize,
    /// Maximum character length of an extracted snippet before truncation.
    pub snippet_length: usize,
    /// Collapse every match within a file into a single hit (the default).
    /// When `false`, a file with `matches_per_file` matching definitions
    /// can surface as that many separate hits.
    pub group_by_file: bool,
    /// Drop hits whose file content hash duplicates an already-selected
    /// hit's (e.g. a vendored copy of the same file).
    pub deduplicate_by_content: bool,
    /// `Some(true)`/`Some(false)` forces case sensitivity; `None` defers
    /// to `smart_case`.
    pub case_sensitive: Option<bool>,
    /// When `case_sensitive` is `None`, treat the query as case-sensitive
    /// only if it contains an uppercase character (the classic grep/ag
    /// smart-case rule).
    pub smart_case: bool,
    /// Require the query to land on a non-alphanumeric boundary rather
    /// than matching inside a longer identifier. Deliberately not
    /// camelCase-aware: a word-boundary match against `"user"` must not
    /// match `UserManager.ts`, which a subword-splitting boundary would.
    pub word_boundary: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            file_types: Vec::new(),
            matches_per_file: 3,
            snippet_length: 160,
            group_by_file: true,
            deduplicate_by_content: false,
            case_sensitive: None,
            smart_case: true,
            word_boundary: false,
        }
    }
}

fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().ok()
}

fn effective_case_sensitive(query: &str, opts: &SearchOptions) -> bool {
    match opts.case_sensitive {
        Some(v) => v,
        None if opts.smart_case => query.chars().any(|c| c.is_uppercase()),
        None => false,
    }
}

/// Check whether `needle` occurs in `haystack` on a non-alphanumeric
/// boundary on both sides (or string start/end). Both arguments are
/// expected to already be case-folded by the caller if case-insensitivity
/// is wanted.
fn word_boundary_contains(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let bytes = haystack.as_bytes();
    haystack.match_indices(needle).any(|(i, m)| {
        let before_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
        let after = i + m.len();
        let after_ok = after == bytes.len() || !bytes[after].is_ascii_alphanumeric();
        before_ok && after_ok
    })
}

fn contains_query(haystack: &str, query: &str, word_boundary: bool) -> bool {
    if word_boundary {
        word_boundary_contains(haystack, query)
    } else {
        haystack.contains(query)
    }
}

fn truncate_snippet(s: &str, max_len: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(max_len).collect();
    format!("{}…", truncated.trim_end())
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub path: String,
    pub score: f64,
    pub symbol_name: Option<String>,
    pub snippet: Option<String>,
}

pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    /// Set when any signal failed or timed out — results are still
    /// returned from whichever signals succeeded, never an empty error.
    pub degraded: bool,
}

pub struct SearchEngine<'a> {
    store: &'a SymbolStore,
    trigram: &'a TrigramIndex,
    vector: Option<&'a VectorIndexManager>,
    file_sizes: &'a HashMap<String, u64>,
}

impl<'a> SearchEngine<'a> {
    pub fn new(
        store: &'a SymbolStore,
        trigram: &'a TrigramIndex,
        vector: Option<&'a VectorIndexManager>,
        file_sizes: &'a HashMap<String, u64>,
    ) -> Self {
        Self { store, trigram, vector, file_sizes }
    }

    fn symbol_candidates(&self, query: &str, opts: &SearchOptions) -> HashMap<String, (f64, Option<String>)> {
        let case_sensitive = effective_case_sensitive(query, opts);
        let fold = |s: &str| if case_sensitive { s.to_string() } else { s.to_lowercase() };
        let query_folded = fold(query);
        let mut matches: Vec<(String, String, f64)> = Vec::new();
        for path in self.store.paths() {
            let Some(record) = self.store.get(&path) else { continue };
            for sym in &record.symbols {
                if let Some(name) = sym.name() {
                    let name_folded = fold(name);
                    let score = if name_folded == query_folded {
                        1.0
                    } else if name_folded.starts_with(&query_folded) {
                        0.8
                    } else if contains_query(&name_folded, &query_folded, opts.word_boundary) {
                        0.5
                    } else {
                        continue;
                    };
                    matches.push((path.clone(), name.to_string(), score));
                }
            }
        }
        let max = matches.iter().map(|(_, _, s)| *s).fold(0.0_f64, f64::max);
        let mut out = HashMap::new();
        for (path, name, score) in matches {
            let normalized = if max > 0.0 { score / max } else { 0.0 };
            let entry = out.entry(path).or_insert((0.0, None));
            if normalized > entry.0 {
                *entry = (normalized, Some(name));
            }
        }
        out
    }

    fn comment_candidates(&self, query: &str, opts: &SearchOptions) -> HashMap<String, f64> {
        let case_sensitive = effective_case_sensitive(query, opts);
        let fold = |s: &str| if case_sensitive { s.to_string() } else { s.to_lowercase() };
        let query_folded = fold(query);
        let mut matches: Vec<(String, f64)> = Vec::new();
        for path in self.store.paths() {
            let Some(record) = self.store.get(&path) else { continue };
            for sym in &record.symbols {
                if let Symbol::Definition(def) = sym {
                    if let Some(doc) = &def.doc {
                        let doc_folded = fold(doc);
                        if contains_query(&doc_folded, &query_folded, opts.word_boundary) {
                            matches.push((path.clone(), 1.0));
                        }
                    }
                }
            }
        }
        let max = matches.iter().map(|(_, s)| *s).fold(0.0_f64, f64::max);
        let mut out: HashMap<String, f64> = HashMap::new();
        for (path, score) in matches {
            let normalized = if max > 0.0 { score / max } else { 0.0 };
            let entry = out.entry(path).or_insert(0.0);
            if normalized > *entry {
                *entry = normalized;
            }
        }
        out
    }

    fn filename_candidates(&self, query: &str, opts: &SearchOptions) -> HashMap<String, f64> {
        let paths = self.store.paths();
        let matches = fuzzy::search_filenames(&paths, query, paths.len().max(1));
        let max = matches.iter().map(|m| m.score).fold(0.0_f64, f64::max);
        let mut out: HashMap<String, f64> =
            matches.into_iter().map(|m| (m.path, if max > 0.0 { m.score / max } else { 0.0 })).collect();
        if opts.word_boundary {
            let case_sensitive = effective_case_sensitive(query, opts);
            let fold = |s: &str| if case_sensitive { s.to_string() } else { s.to_lowercase() };
            let query_folded = fold(query);
            out.retain(|path, _| word_boundary_contains(&fold(path), &query_folded));
        }
        out
    }

    fn apply_large_file_penalty(&self, path: &str, score: f64) -> f64 {
        if self.file_sizes.get(path).copied().unwrap_or(0) > LARGE_FILE_THRESHOLD_BYTES {
            score * LARGE_FILE_PENALTY
        } else {
            score
        }
    }

    fn passes_filters(
        &self,
        path: &str,
        opts: &SearchOptions,
        include: &Option<GlobSet>,
        exclude: &Option<GlobSet>,
    ) -> bool {
        if let Some(inc) = include {
            if !inc.is_match(path) {
                return false;
            }
        }
        if let Some(exc) = exclude {
            if exc.is_match(path) {
                return false;
            }
        }
        if !opts.file_types.is_empty() {
            let ext = Path::new(path).extension().and_then(|e| e.to_str()).unwrap_or("");
            if !opts.file_types.iter().any(|t| t.eq_ignore_ascii_case(ext)) {
                return false;
            }
        }
        true
    }

    /// Collect up to `opts.matches_per_file` (query, snippet) pairs for
    /// `path`'s definitions, used both for the single aggregated snippet
    /// (`group_by_file = true`) and for per-definition hit expansion
    /// (`group_by_file = false`).
    fn matching_snippets(&self, path: &str, query: &str, opts: &SearchOptions) -> Vec<(String, String)> {
        let Some(record) = self.store.get(path) else { return Vec::new() };
        let case_sensitive = effective_case_sensitive(query, opts);
        let fold = |s: &str| if case_sensitive { s.to_string() } else { s.to_lowercase() };
        let query_folded = fold(query);
        let mut out = Vec::new();
        for sym in &record.symbols {
            if let Symbol::Definition(def) = sym {
                let hay = format!("{} {}", def.signature, def.doc.clone().unwrap_or_default());
                if contains_query(&fold(&hay), &query_folded, opts.word_boundary) {
                    out.push((def.name.clone(), truncate_snippet(&hay, opts.snippet_length)));
                    if out.len() >= opts.matches_per_file.max(1) {
                        break;
                    }
                }
            }
        }
        out
    }

    /// Run the full collection -> normalization -> blending pipeline for
    /// `query`, returning at most `limit` hits sorted by descending score
    /// with a path-length then lexicographic tie-break.
    pub fn search(&self, query: &str, limit: usize) -> SearchResponse {
        self.search_with_options(query, &SearchOptions { limit, ..SearchOptions::default() })
    }

    pub fn search_with_options(&self, query: &str, opts: &SearchOptions) -> SearchResponse {
        let intent = classify_intent(query);
        let weights = weights_for(intent);
        let mut degraded = false;

        let symbol_hits = self.symbol_candidates(query, opts);
        let trigram_hits: HashMap<String, f64> = self.trigram.search(query, 500).into_iter().collect();
        let filename_hits = self.filename_candidates(query, opts);
        let comment_hits = self.comment_candidates(query, opts);
        let vector_hits: HashMap<String, f64> = match self.vector {
            Some(mgr) if mgr.is_enabled() => match mgr.search(query, 500) {
                Ok(results) => results.into_iter().map(|(chunk, score)| (chunk.file_path, score)).collect(),
                Err(_) => {
                    degraded = true;
                    HashMap::new()
                }
            },
            Some(mgr) => {
                degraded = degraded || mgr.is_degraded();
                HashMap::new()
            }
            None => HashMap::new(),
        };

        let include = build_globset(&opts.include_globs);
        let exclude = build_globset(&opts.exclude_globs);

        let mut all_paths: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        all_paths.extend(symbol_hits.keys().cloned());
        all_paths.extend(trigram_hits.keys().cloned());
        all_paths.extend(filename_hits.keys().cloned());
        all_paths.extend(comment_hits.keys().cloned());
        all_paths.extend(vector_hits.keys().cloned());
        all_paths.retain(|path| self.passes_filters(path, opts, &include, &exclude));

        let mut hits: Vec<SearchHit> = Vec::new();
        for path in &all_paths {
            let symbol_score = symbol_hits.get(path).map(|(s, _)| *s).unwrap_or(0.0);
            let symbol_name = symbol_hits.get(path).and_then(|(_, n)| n.clone());
            let trigram_score = trigram_hits.get(path).copied().unwrap_or(0.0);
            let filename_score = filename_hits.get(path).copied().unwrap_or(0.0);
            let comment_score = comment_hits.get(path).copied().unwrap_or(0.0);
            let vector_score = vector_hits.get(path).copied().unwrap_or(0.0);

            let blended = weights.symbol * symbol_score
                + weights.trigram * trigram_score
                + weights.filename * filename_score
                + weights.comment * comment_score
                + weights.vector * vector_score;
            let score = self.apply_large_file_penalty(path, blended);

            let snippets = self.matching_snippets(path, query, opts);
            if opts.group_by_file || snippets.is_empty() {
                let snippet = snippets.first().map(|(_, s)| s.clone());
                hits.push(SearchHit { path: path.clone(), score, symbol_name, snippet });
            } else {
                for (name, snippet) in snippets {
                    hits.push(SearchHit { path: path.clone(), score, symbol_name: Some(name), snippet: Some(snippet) });
                }
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.len().cmp(&b.path.len()))
                .then_with(|| a.path.cmp(&b.path))
        });

        if opts.deduplicate_by_content {
            let mut seen_hashes = std::collections::HashSet::new();
            hits.retain(|hit| match self.store.get(&hit.path) {
                Some(record) => seen_hashes.insert(record.content_hash),
                None => true,
            });
        }

        hits.truncate(opts.limit);
        SearchResponse { hits, degraded }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefinitionKind, Definition, Range, Symbol};

    fn make_store() -> SymbolStore {
        let store = SymbolStore::new();
        let sym = |name: &str, doc: Option<&str>| {
            Symbol::Definition(Definition {
                kind: DefinitionKind::Function,
                name: name.to_string(),
                container: None,
                signature: format!("fn {name}()"),
                parameters: vec![],
                return_type: None,
                modifiers: vec![],
                doc: doc.map(|d| d.to_string()),
                range: Range { start_line: 1, end_line: 1, start_byte: 0, end_byte: 10 },
            })
        };
        store.upsert("src/search_engine.rs", "fn run_search() {}", vec![sym("run_search", None)]);
        store.upsert("src/unrelated.rs", "fn other_thing() {}", vec![sym("other_thing", None)]);
        store.upsert(
            "src/user/manager.rs",
            "fn new_user() {}",
            vec![sym("new_user", Some("Creates a user record for onboarding"))],
        );
        store.upsert("src/UserManager.ts", "class UserManager {}", vec![sym("UserManager", None)]);
        store.upsert("src/user_service.rs", "fn user_service() {}", vec![sym("user_service", None)]);
        store
    }

    #[test]
    fn classifies_single_identifier_as_symbol_intent() {
        assert_eq!(classify_intent("run_search"), Intent::Symbol);
        assert_eq!(classify_intent("src/main.rs"), Intent::File);
        assert_eq!(classify_intent("panic in the worker loop"), Intent::Bug);
    }

    #[test]
    fn exact_symbol_match_ranks_first() {
        let store = make_store();
        let trigram = TrigramIndex::new();
        trigram.upsert("src/search_engine.rs", "fn run_search() {}", &["run_search"]);
        trigram.upsert("src/unrelated.rs", "fn other_thing() {}", &["other_thing"]);
        let sizes = HashMap::new();
        let engine = SearchEngine::new(&store, &trigram, None, &sizes);
        let response = engine.search("run_search", 10);
        assert!(!response.hits.is_empty());
        assert_eq!(response.hits[0].path, "src/search_engine.rs");
        assert!(!response.degraded);
    }

    #[test]
    fn large_file_penalty_reduces_score() {
        let store = make_store();
        let trigram = TrigramIndex::new();
        trigram.upsert("src/search_engine.rs", "fn run_search() {}", &["run_search"]);
        let mut sizes = HashMap::new();
        sizes.insert("src/search_engine.rs".to_string(), 1_000_000u64);
        let engine = SearchEngine::new(&store, &trigram, None, &sizes);
        let penalized = engine.apply_large_file_penalty("src/search_engine.rs", 1.0);
        assert!((penalized - LARGE_FILE_PENALTY).abs() < 1e-9);
    }

    #[test]
    fn file_types_filter_excludes_other_extensions() {
        let store = make_store();
        let trigram = TrigramIndex::new();
        let sizes = HashMap::new();
        let engine = SearchEngine::new(&store, &trigram, None, &sizes);
        let opts = SearchOptions { file_types: vec!["py".to_string()], ..SearchOptions::default() };
        let response = engine.search_with_options("run_search", &opts);
        assert!(response.hits.is_empty());
    }

    #[test]
    fn exclude_globs_drop_matching_paths() {
        let store = make_store();
        let trigram = TrigramIndex::new();
        let sizes = HashMap::new();
        let engine = SearchEngine::new(&store, &trigram, None, &sizes);
        let opts = SearchOptions { exclude_globs: vec!["src/unrelated.rs".to_string()], ..SearchOptions::default() };
        let response = engine.search_with_options("other_thing", &opts);
        assert!(response.hits.iter().all(|h| h.path != "src/unrelated.rs"));
    }

    #[test]
    fn word_boundary_excludes_camel_case_containment() {
        let store = make_store();
        let trigram = TrigramIndex::new();
        let sizes = HashMap::new();
        let engine = SearchEngine::new(&store, &trigram, None, &sizes);
        let opts = SearchOptions { word_boundary: true, case_sensitive: Some(false), ..SearchOptions::default() };
        let response = engine.search_with_options("user", &opts);
        let paths: Vec<&str> = response.hits.iter().map(|h| h.path.as_str()).collect();
        assert!(!paths.contains(&"src/UserManager.ts"));
        assert!(paths.contains(&"src/user_service.rs"));
    }

    #[test]
    fn comment_signal_surfaces_doc_only_match() {
        let store = make_store();
        let trigram = TrigramIndex::new();
        let sizes = HashMap::new();
        let engine = SearchEngine::new(&store, &trigram, None, &sizes);
        let response = engine.search("onboarding", 10);
        assert!(response.hits.iter().any(|h| h.path == "src/user/manager.rs"));
    }
}
