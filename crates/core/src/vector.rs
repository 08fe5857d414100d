//! Vector Index Manager — embedding-backed semantic search over
//! `VectorChunk`s. The embedding provider port is implemented against
//! `fastembed` (see DESIGN.md for why). Search modes `off`, `bruteforce`,
//! `hnsw`, and `auto` all route through the same brute-force cosine scan
//! for now: an exact HNSW index is future work, so `hnsw` degrades to
//! `bruteforce` with a `degraded` flag rather than erroring the whole
//! search.

use crate::config::{RebuildPolicy, VectorMode};
use crate::model::{chunk_id, Range, VectorChunk};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait EmbeddingProvider: Send + Sync {
    fn provider_id(&self) -> &str;
    fn model_id(&self) -> &str;
    fn dims(&self) -> usize;
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, crate::error::CoreError>;
    fn normalize(&self, vector: &mut [f32]) {
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector {
                *v /= norm;
            }
        }
    }
}

#[cfg(feature = "semantic")]
pub struct FastEmbedProvider {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    model_id: String,
}

#[cfg(feature = "semantic")]
impl FastEmbedProvider {
    pub fn try_new() -> Result<Self, crate::error::CoreError> {
        let model = fastembed::TextEmbedding::try_new(Default::default())
            .map_err(|e| crate::error::CoreError::internal(format!("failed to initialize embedding model: {e}")))?;
        Ok(Self { model: std::sync::Mutex::new(model), model_id: "bge-small-en-v1.5".to_string() })
    }
}

#[cfg(feature = "semantic")]
impl EmbeddingProvider for FastEmbedProvider {
    fn provider_id(&self) -> &str {
        "fastembed"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dims(&self) -> usize {
        384
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, crate::error::CoreError> {
        let mut model = self.model.lock().unwrap();
        model.embed(texts.to_vec(), None).map_err(|e| crate::error::CoreError::internal(format!("embedding failed: {e}")))
    }
}

/// Deterministic, dependency-free stand-in used when `semantic` is
/// disabled or model initialization fails — keeps the Vector Index Manager
/// usable (in brute-force, low-quality form) rather than unavailable.
pub struct HashEmbeddingProvider {
    dims: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn provider_id(&self) -> &str {
        "hash-fallback"
    }

    fn model_id(&self) -> &str {
        "xxh3-bow"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, crate::error::CoreError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0_f32; self.dims];
                for word in text.split_whitespace() {
                    let h = xxhash_rust::xxh3::xxh3_64(word.as_bytes());
                    vector[(h as usize) % self.dims] += 1.0;
                }
                let mut v = vector;
                self.normalize(&mut v);
                v
            })
            .collect())
    }
}

pub struct VectorIndexManager {
    mode: VectorMode,
    rebuild: RebuildPolicy,
    provider: Box<dyn EmbeddingProvider>,
    chunks: DashMap<String, VectorChunk>,
    by_path: DashMap<String, Vec<String>>,
    degraded: AtomicBool,
}

impl VectorIndexManager {
    pub fn new(mode: VectorMode, rebuild: RebuildPolicy, provider: Box<dyn EmbeddingProvider>) -> Self {
        Self { mode, rebuild, provider, chunks: DashMap::new(), by_path: DashMap::new(), degraded: AtomicBool::new(false) }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self.mode, VectorMode::Off)
    }

    pub fn rebuild_policy(&self) -> RebuildPolicy {
        self.rebuild
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn upsert_embedding(&self, file_path: &str, byte_range: Range, text: &str) -> Result<(), crate::error::CoreError> {
        if !self.is_enabled() {
            return Ok(());
        }
        let vectors = match self.provider.embed(&[text.to_string()]) {
            Ok(v) => v,
            Err(err) => {
                self.degraded.store(true, Ordering::Relaxed);
                return Err(err);
            }
        };
        let Some(mut vector) = vectors.into_iter().next() else {
            return Ok(());
        };
        self.provider.normalize(&mut vector);
        let id = chunk_id(file_path, &byte_range, self.provider.provider_id(), self.provider.model_id());
        let chunk = VectorChunk {
            chunk_id: id.clone(),
            file_path: file_path.to_string(),
            byte_range,
            provider_id: self.provider.provider_id().to_string(),
            model_id: self.provider.model_id().to_string(),
            dims: vector.len(),
            vector,
        };
        self.chunks.insert(id.clone(), chunk);
        self.by_path.entry(file_path.to_string()).or_default().push(id);
        Ok(())
    }

    pub fn remove_chunk(&self, chunk_id: &str) {
        self.chunks.remove(chunk_id);
    }

    pub fn remove_path(&self, file_path: &str) {
        if let Some((_, ids)) = self.by_path.remove(file_path) {
            for id in ids {
                self.chunks.remove(&id);
            }
        }
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    /// Brute-force cosine search, serving all of `off|bruteforce|hnsw|auto`
    /// identically for now (see module docs); returns scores normalized to
    /// `[0, 1]` by rescaling cosine similarity from `[-1, 1]`.
    pub fn search(&self, query_text: &str, limit: usize) -> Result<Vec<(VectorChunk, f64)>, crate::error::CoreError> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }
        let mut query_vec = match self.provider.embed(&[query_text.to_string()]) {
            Ok(v) => v.into_iter().next().unwrap_or_default(),
            Err(err) => {
                self.degraded.store(true, Ordering::Relaxed);
                return Err(err);
            }
        };
        self.provider.normalize(&mut query_vec);

        let mut scored: Vec<(VectorChunk, f64)> = self
            .chunks
            .iter()
            .map(|entry| {
                let chunk = entry.value().clone();
                let sim = Self::cosine(&query_vec, &chunk.vector) as f64;
                (chunk, (sim + 1.0) / 2.0)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> VectorIndexManager {
        VectorIndexManager::new(VectorMode::Bruteforce, RebuildPolicy::Auto, Box::new(HashEmbeddingProvider::new(32)))
    }

    fn range() -> Range {
        Range { start_line: 1, end_line: 1, start_byte: 0, end_byte: 10 }
    }

    #[test]
    fn upsert_and_search_returns_normalized_scores() {
        let mgr = manager();
        mgr.upsert_embedding("a.rs", range(), "fn parse_document").unwrap();
        mgr.upsert_embedding("b.rs", range(), "struct HttpClient").unwrap();
        let results = mgr.search("parse document", 5).unwrap();
        assert!(!results.is_empty());
        assert!(results.iter().all(|(_, s)| *s >= 0.0 && *s <= 1.0));
    }

    #[test]
    fn off_mode_never_indexes() {
        let mgr = VectorIndexManager::new(VectorMode::Off, RebuildPolicy::Manual, Box::new(HashEmbeddingProvider::new(32)));
        mgr.upsert_embedding("a.rs", range(), "text").unwrap();
        assert_eq!(mgr.len(), 0);
        assert!(mgr.search("text", 5).unwrap().is_empty());
    }

    #[test]
    fn remove_path_drops_its_chunks() {
        let mgr = manager();
        mgr.upsert_embedding("a.rs", range(), "one").unwrap();
        mgr.upsert_embedding("a.rs", Range { start_byte: 10, end_byte: 20, ..range() }, "two").unwrap();
        assert_eq!(mgr.len(), 2);
        mgr.remove_path("a.rs");
        assert_eq!(mgr.len(), 0);
    }
}
