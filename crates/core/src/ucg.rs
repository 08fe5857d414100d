//! Unified Context Graph — a process-local, LRU-bounded cache of
//! per-file `UcgNode`s at increasing levels of detail (topology ->
//! skeleton -> full AST doc id). `ensure_lod` lazily upgrades a node to the
//! level a caller needs; `invalidate` demotes a node (and optionally its
//! dependents) back down on a file change. Checkpointed to JSON on a
//! debounce so a restart can skip re-deriving LODs for files that haven't
//! changed. Follows the project's existing persistence idiom (`RealFs`
//! atomic write, `serde_json`).

use crate::fs::FileSystemPort;
use crate::model::{Lod, UcgNode};
use crate::skeleton::{self, SkeletonTier};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub struct UnifiedContextGraph {
    nodes: DashMap<String, UcgNode>,
    /// Most-recently-used order, front = most recent. Guarded separately
    /// from `nodes` since eviction order is independent of node contents.
    lru: Mutex<VecDeque<String>>,
    max_nodes: usize,
    checkpoint_path: PathBuf,
    fs: Arc<dyn FileSystemPort>,
    last_checkpoint: Mutex<Instant>,
    checkpoint_debounce: Duration,
}

impl UnifiedContextGraph {
    pub fn new(max_nodes: usize, checkpoint_path: PathBuf, fs: Arc<dyn FileSystemPort>) -> Self {
        Self {
            nodes: DashMap::new(),
            lru: Mutex::new(VecDeque::new()),
            max_nodes,
            checkpoint_path,
            fs,
            last_checkpoint: Mutex::new(Instant::now() - Duration::from_secs(3600)),
            checkpoint_debounce: Duration::from_secs(2),
        }
    }

    /// Best-effort load from a prior checkpoint; absence or parse failure
    /// just starts from an empty graph (this is a cache, never the source
    /// of truth).
    pub fn reload(&self) {
        let Ok(bytes) = self.fs.read_file(&self.checkpoint_path) else { return };
        let Ok(nodes): Result<Vec<UcgNode>, _> = serde_json::from_slice(&bytes) else { return };
        for node in nodes {
            self.touch(&node.path);
            self.nodes.insert(node.path.clone(), node);
        }
    }

    fn touch(&self, path: &str) {
        let mut lru = self.lru.lock().unwrap();
        lru.retain(|p| p != path);
        lru.push_front(path.to_string());
        while lru.len() > self.max_nodes {
            if let Some(evicted) = lru.pop_back() {
                self.nodes.remove(&evicted);
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<UcgNode> {
        self.nodes.get(path).map(|n| n.clone())
    }

    /// Lazily raise `path`'s level of detail to at least `target`,
    /// building intermediate tiers as needed (0 -> topology, 1 -> skeleton,
    /// 2 -> AST doc id) using the supplied closures so this module stays
    /// decoupled from the Indexer/Parser concrete types.
    pub fn ensure_lod(
        &self,
        path: &str,
        target: Lod,
        dependencies: impl FnOnce() -> (std::collections::BTreeSet<String>, std::collections::BTreeSet<String>, i64, u64),
        source: impl FnOnce() -> Option<(String, Vec<crate::model::Symbol>)>,
    ) -> UcgNode {
        let mut node = self.nodes.get(path).map(|n| n.clone()).unwrap_or_else(|| UcgNode::new(path.to_string()));

        if node.lod == Lod::Unknown && target >= Lod::Topology {
            let (deps, dependents, last_modified, size) = dependencies();
            node.dependencies = deps;
            node.dependents = dependents;
            node.last_modified = last_modified;
            node.size = size;
            node.lod = Lod::Topology;
            node.lod_updated_at = now();
        }

        if node.lod < Lod::Skeleton && target >= Lod::Skeleton {
            if let Some((content, defs)) = source() {
                node.skeleton = Some(skeleton::generate(path, &content, &defs, SkeletonTier::FoldedBodies));
                node.lod = Lod::Skeleton;
                node.lod_updated_at = now();
            }
        }

        if node.lod < Lod::FullAst && target >= Lod::FullAst {
            node.ast_doc_id = Some(path.to_string());
            node.lod = Lod::FullAst;
            node.lod_updated_at = now();
        }

        self.touch(path);
        self.nodes.insert(path.to_string(), node.clone());
        node
    }

    /// Demote `path` to `Unknown` (forcing a rebuild next `ensure_lod`
    /// call); when `cascade` is set, also demote every direct dependent
    /// from `FullAst`/`Skeleton` down to `Topology` (never below — the
    /// dependent's own dependency list is still valid, only its derived
    /// content might be stale).
    pub fn invalidate(&self, path: &str, cascade: bool) {
        let dependents = self.nodes.get(path).map(|n| n.dependents.clone()).unwrap_or_default();
        if let Some(mut node) = self.nodes.get_mut(path) {
            node.lod = Lod::Unknown;
            node.skeleton = None;
            node.ast_doc_id = None;
        }
        if cascade {
            for dependent in dependents {
                if let Some(mut node) = self.nodes.get_mut(&dependent) {
                    if node.lod > Lod::Topology {
                        node.lod = Lod::Topology;
                        node.skeleton = None;
                        node.ast_doc_id = None;
                    }
                }
            }
        }
    }

    /// Drop `path` entirely — used when the Indexer reports the file itself
    /// is gone, as opposed to `invalidate`, which just demotes a node that
    /// is still expected to exist.
    pub fn remove_node(&self, path: &str) {
        self.nodes.remove(path);
        self.lru.lock().unwrap().retain(|p| p != path);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Persist all nodes to `checkpoint_path`, skipping the write if the
    /// last checkpoint happened within `checkpoint_debounce`.
    pub fn maybe_checkpoint(&self) -> std::io::Result<bool> {
        let mut last = self.last_checkpoint.lock().unwrap();
        if last.elapsed() < self.checkpoint_debounce {
            return Ok(false);
        }
        let nodes: Vec<UcgNode> = self.nodes.iter().map(|n| n.value().clone()).collect();
        let bytes = serde_json::to_vec(&nodes).unwrap_or_default();
        self.fs.write_file(&self.checkpoint_path, &bytes)?;
        *last = Instant::now();
        Ok(true)
    }
}

fn now() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use std::collections::BTreeSet;

    fn graph(max_nodes: usize) -> UnifiedContextGraph {
        UnifiedContextGraph::new(max_nodes, PathBuf::from("/proj/.smart-context/ucg.json"), Arc::new(MemFs::new()))
    }

    #[test]
    fn ensure_lod_builds_topology_then_skeleton() {
        let g = graph(10);
        let node = g.ensure_lod(
            "a.rs",
            Lod::Skeleton,
            || (BTreeSet::new(), BTreeSet::new(), 0, 10),
            || Some(("fn a() { 1 }".to_string(), vec![])),
        );
        assert_eq!(node.lod, Lod::Skeleton);
        assert!(node.skeleton.is_some());
    }

    #[test]
    fn invalidate_cascades_to_dependents() {
        let g = graph(10);
        g.ensure_lod("a.rs", Lod::Skeleton, || (BTreeSet::new(), BTreeSet::new(), 0, 1), || Some(("x".into(), vec![])));
        g.ensure_lod(
            "b.rs",
            Lod::Skeleton,
            || (BTreeSet::from(["a.rs".to_string()]), BTreeSet::new(), 0, 1),
            || Some(("y".into(), vec![])),
        );
        {
            let mut a = g.nodes.get_mut("a.rs").unwrap();
            a.dependents.insert("b.rs".to_string());
        }
        g.invalidate("a.rs", true);
        let b = g.get("b.rs").unwrap();
        assert_eq!(b.lod, Lod::Topology);
    }

    #[test]
    fn lru_evicts_oldest_beyond_max_nodes() {
        let g = graph(2);
        for name in ["a.rs", "b.rs", "c.rs"] {
            g.ensure_lod(name, Lod::Topology, || (BTreeSet::new(), BTreeSet::new(), 0, 1), || None);
        }
        assert_eq!(g.len(), 2);
        assert!(g.get("a.rs").is_none());
        assert!(g.get("c.rs").is_some());
    }
}
