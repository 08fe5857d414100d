//! Incremental Indexer — owns the initial scan, the filesystem
//! watcher, and the Symbol Store/Trigram Index/Dependency Graph they feed.
//! Parallel `ignore::WalkBuilder` + `rayon` drive the initial scan; a
//! debounced `notify` watcher drives per-path invalidation afterward. Emits
//! the full `model::Symbol` set rather than a flat per-file symbol table.

use crate::config::Config;
use crate::depgraph::DependencyGraph;
use crate::error::{retry_with_backoff, CoreError};
use crate::fs::FileSystemPort;
use crate::model::{DependencyEdge, Symbol};
use crate::resolver::{ModuleResolver, ResolverConfig};
use crate::store::SymbolStore;
use crate::symbol;
use crate::trigram::TrigramIndex;

#[cfg(feature = "treesitter")]
use crate::parser::{ParserPort, TreeSitterParser};

use dashmap::{DashMap, DashSet};
use ignore::WalkBuilder;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// An invalidation event broadcast whenever a path's symbols/trigrams are
/// refreshed or removed, so the UCG's `invalidate(path, cascade)` and the
/// Search Engine can react.
#[derive(Debug, Clone)]
pub enum InvalidationEvent {
    Updated(String),
    Removed(String),
}

struct PerFileLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PerFileLocks {
    fn new() -> Self {
        Self { locks: DashMap::new() }
    }

    fn lock_for(&self, path: &str) -> Arc<Mutex<()>> {
        self.locks.entry(path.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

pub struct Indexer {
    root: PathBuf,
    config: Config,
    fs: Arc<dyn FileSystemPort>,
    store: Arc<SymbolStore>,
    trigram: Arc<TrigramIndex>,
    depgraph: Arc<Mutex<DependencyGraph>>,
    indexed_paths: Arc<DashSet<String>>,
    locks: Arc<PerFileLocks>,
    invalidation_tx: broadcast::Sender<InvalidationEvent>,
    initial_scan_done: Arc<AtomicBool>,
    watcher: Mutex<Option<RecommendedWatcher>>,
    debounced_rx_handle: Mutex<Option<std::thread::JoinHandle<()>>>,
    stop_flag: Arc<AtomicBool>,
}

impl Indexer {
    pub fn new(root: PathBuf, config: Config, fs: Arc<dyn FileSystemPort>) -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self {
            root,
            config,
            fs,
            store: Arc::new(SymbolStore::new()),
            trigram: Arc::new(TrigramIndex::new()),
            depgraph: Arc::new(Mutex::new(DependencyGraph::new())),
            indexed_paths: Arc::new(DashSet::new()),
            locks: Arc::new(PerFileLocks::new()),
            invalidation_tx: tx,
            initial_scan_done: Arc::new(AtomicBool::new(false)),
            watcher: Mutex::new(None),
            debounced_rx_handle: Mutex::new(None),
            stop_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> Arc<SymbolStore> {
        self.store.clone()
    }

    pub fn trigram(&self) -> Arc<TrigramIndex> {
        self.trigram.clone()
    }

    pub fn depgraph(&self) -> Arc<Mutex<DependencyGraph>> {
        self.depgraph.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.invalidation_tx.subscribe()
    }

    pub fn is_initial_scan_done(&self) -> bool {
        self.initial_scan_done.load(Ordering::Acquire)
    }

    /// Walk the tree (gitignore-aware, parallel) and index every file not
    /// excluded by config, then resolve the dependency graph once all
    /// files have contributed their imports. Idempotent: content-hash
    /// short-circuit means a second call only re-extracts files that
    /// actually changed since the last scan.
    pub fn run_initial_scan(&self) -> Result<usize, CoreError> {
        let skip = self.config.skip_dir_set();
        let root = self.root.clone();

        let mut builder = WalkBuilder::new(&root);
        builder.hidden(false).git_ignore(true).git_exclude(true);
        let walker = builder.build();

        let paths: Vec<PathBuf> = walker
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter(|entry| {
                !entry.path().components().any(|c| skip.contains(&c.as_os_str().to_string_lossy().to_string()))
            })
            .map(|entry| entry.into_path())
            .collect();

        let count = std::sync::atomic::AtomicUsize::new(0);
        paths.par_iter().for_each(|path| {
            if let Ok(rel) = path.strip_prefix(&root) {
                let rel_str = rel.to_string_lossy().replace('\\', "/");
                if self.index_file(&rel_str).is_ok() {
                    count.fetch_add(1, Ordering::Relaxed);
                }
            }
        });

        self.rebuild_dependency_graph();
        self.initial_scan_done.store(true, Ordering::Release);
        Ok(count.load(Ordering::Relaxed))
    }

    pub fn wait_for_initial_scan(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while !self.is_initial_scan_done() {
            if start.elapsed() > timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        true
    }

    /// Index (or reindex) a single file, short-circuiting on an unchanged
    /// content hash. Writes are serialized per path via `locks`.
    pub fn index_file(&self, rel_path: &str) -> Result<(), CoreError> {
        let lock = self.locks.lock_for(rel_path);
        let _guard = lock.lock().unwrap();

        let abs_path = self.root.join(rel_path);
        let content = match self.fs.read_file(&abs_path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => {
                self.remove_file(rel_path);
                return Ok(());
            }
        };

        if self.store.is_unchanged(rel_path, &content) {
            self.indexed_paths.insert(rel_path.to_string());
            return Ok(());
        }

        let ext = Path::new(rel_path).extension().and_then(|e| e.to_str()).unwrap_or("");
        let symbols = self.extract_symbols(ext, &content);
        let identifiers: Vec<&str> = symbols.iter().filter_map(|s| s.name()).collect();

        retry_with_backoff(3, 50, || {
            self.store.upsert(rel_path, &content, symbols.clone());
            self.trigram.upsert(rel_path, &content, &identifiers);
            self.indexed_paths.insert(rel_path.to_string());
            Ok::<(), CoreError>(())
        })?;

        let _ = self.invalidation_tx.send(InvalidationEvent::Updated(rel_path.to_string()));
        Ok(())
    }

    pub fn remove_file(&self, rel_path: &str) {
        self.store.remove(rel_path);
        self.trigram.remove(rel_path);
        self.indexed_paths.remove(rel_path);
        self.depgraph.lock().unwrap().remove_edges_from(rel_path);
        let _ = self.invalidation_tx.send(InvalidationEvent::Removed(rel_path.to_string()));
    }

    #[cfg(feature = "treesitter")]
    fn extract_symbols(&self, ext: &str, content: &str) -> Vec<Symbol> {
        let parser = TreeSitterParser;
        let language = parser.get_language_for_file(ext);
        let mut symbols = match parser.parse_file(ext, content) {
            Some(doc) => symbol::extract_definitions(&doc),
            None => Vec::new(),
        };
        symbols.extend(symbol::extract_imports_exports(language, content));
        symbols.sort_by_key(|s| s.range().start_byte);
        symbols
    }

    #[cfg(not(feature = "treesitter"))]
    fn extract_symbols(&self, ext: &str, content: &str) -> Vec<Symbol> {
        let language = crate::parser::language_for_ext(ext);
        symbol::extract_imports_exports(language, content)
    }

    fn rebuild_dependency_graph(&self) {
        let resolver_config = ResolverConfig::default();
        let resolver = ModuleResolver::new(&self.indexed_paths, resolver_config);
        let mut edges = Vec::new();
        let paths: Vec<String> = self.indexed_paths.iter().map(|p| p.clone()).collect();
        for path in &paths {
            if let Some(record) = self.store.get(path) {
                for sym in &record.symbols {
                    if let Symbol::Import(import) = sym {
                        if let Some(target) = resolver.resolve(path, &import.source) {
                            edges.push(DependencyEdge { source: path.clone(), target });
                        }
                    }
                }
            }
        }
        *self.depgraph.lock().unwrap() = DependencyGraph::build(edges);
    }

    /// Start the filesystem watcher with the configured per-path debounce
    /// (default 100ms).
    pub fn start_watcher(self: &Arc<Self>) -> Result<(), CoreError> {
        let (raw_tx, raw_rx): (Sender<PathBuf>, Receiver<PathBuf>) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                if let Ok(event) = res {
                    for path in event.paths {
                        let _ = raw_tx.send(path);
                    }
                }
            },
            notify::Config::default(),
        )
        .map_err(|e| CoreError::internal(format!("failed to start watcher: {e}")))?;
        watcher.watch(&self.root, RecursiveMode::Recursive).map_err(|e| CoreError::internal(format!("watch failed: {e}")))?;
        *self.watcher.lock().unwrap() = Some(watcher);

        let indexer = self.clone();
        let debounce = Duration::from_millis(self.config.debounce_ms);
        let stop_flag = self.stop_flag.clone();
        let handle = std::thread::spawn(move || {
            let mut pending: std::collections::HashMap<PathBuf, Instant> = std::collections::HashMap::new();
            loop {
                if stop_flag.load(Ordering::Relaxed) {
                    return;
                }
                while let Ok(path) = raw_rx.try_recv() {
                    pending.insert(path, Instant::now());
                }
                let now = Instant::now();
                let ready: Vec<PathBuf> =
                    pending.iter().filter(|(_, t)| now.duration_since(**t) >= debounce).map(|(p, _)| p.clone()).collect();
                for path in &ready {
                    pending.remove(path);
                    if let Ok(rel) = path.strip_prefix(&indexer.root) {
                        let rel_str = rel.to_string_lossy().replace('\\', "/");
                        if !rel_str.is_empty() {
                            let _ = indexer.index_file(&rel_str);
                            indexer.rebuild_dependency_graph();
                        }
                    }
                }
                std::thread::sleep(Duration::from_millis(20));
            }
        });
        *self.debounced_rx_handle.lock().unwrap() = Some(handle);
        Ok(())
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        *self.watcher.lock().unwrap() = None;
        if let Some(handle) = self.debounced_rx_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn symbol_count(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::RealFs;

    fn write_file(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn initial_scan_indexes_source_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.rs", "fn a() {}");
        write_file(dir.path(), "b.py", "def b():\n    pass\n");

        let indexer = Indexer::new(dir.path().to_path_buf(), Config::default(), Arc::new(RealFs));
        let count = indexer.run_initial_scan().unwrap();
        assert_eq!(count, 2);
        assert_eq!(indexer.symbol_count(), 2);
    }

    #[test]
    fn reindexing_unchanged_file_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.rs", "fn a() {}");
        let indexer = Indexer::new(dir.path().to_path_buf(), Config::default(), Arc::new(RealFs));
        indexer.run_initial_scan().unwrap();
        let before = indexer.store().get("a.rs").unwrap().parsed_at;
        indexer.index_file("a.rs").unwrap();
        let after = indexer.store().get("a.rs").unwrap().parsed_at;
        assert_eq!(before, after);
    }

    #[test]
    fn removing_file_clears_index_and_ghosts() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.rs", "fn a() {}");
        let indexer = Indexer::new(dir.path().to_path_buf(), Config::default(), Arc::new(RealFs));
        indexer.run_initial_scan().unwrap();
        indexer.remove_file("a.rs");
        assert!(indexer.store().get("a.rs").is_none());
        assert_eq!(indexer.store().ghosts_for("a.rs").len(), 1);
    }
}
