//! History — bounded undo/redo stacks over `HistoryEntry`
//! (single-file or batch), persisted as JSON under
//! `Config::history_dir`. Undoing pops from the undo stack, applies the
//! entry's inverse edits through the caller-supplied apply closure, and
//! pushes the original entry onto the redo stack; redo does the reverse.
//! Pushing a new entry clears the redo stack, matching ordinary editor
//! undo semantics.

use crate::error::{CoreError, ErrorCode};
use crate::fs::FileSystemPort;
use crate::model::HistoryEntry;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

struct Stacks {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

pub struct History {
    fs: Arc<dyn FileSystemPort>,
    path: PathBuf,
    depth: usize,
    stacks: Mutex<Stacks>,
}

#[derive(serde::Serialize, serde::Deserialize, Default)]
struct Persisted {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

impl History {
    pub fn new(fs: Arc<dyn FileSystemPort>, path: PathBuf, depth: usize) -> Self {
        let stacks = fs
            .read_file(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Persisted>(&bytes).ok())
            .map(|p| Stacks { undo: p.undo, redo: p.redo })
            .unwrap_or(Stacks { undo: Vec::new(), redo: Vec::new() });
        Self { fs, path, depth, stacks: Mutex::new(stacks) }
    }

    /// Record a newly-applied entry, clearing redo and trimming undo to
    /// `depth`.
    pub fn push(&self, entry: HistoryEntry) {
        let mut stacks = self.stacks.lock().unwrap();
        stacks.undo.push(entry);
        if stacks.undo.len() > self.depth {
            let overflow = stacks.undo.len() - self.depth;
            stacks.undo.drain(0..overflow);
        }
        stacks.redo.clear();
        self.persist(&stacks);
    }

    pub fn pop_undo(&self) -> Result<HistoryEntry, CoreError> {
        let mut stacks = self.stacks.lock().unwrap();
        let entry = stacks.undo.pop().ok_or_else(|| CoreError::new(ErrorCode::NoUndoHistory, "no operations to undo"))?;
        stacks.redo.push(entry.clone());
        self.persist(&stacks);
        Ok(entry)
    }

    pub fn pop_redo(&self) -> Result<HistoryEntry, CoreError> {
        let mut stacks = self.stacks.lock().unwrap();
        let entry = stacks.redo.pop().ok_or_else(|| CoreError::new(ErrorCode::NoRedoHistory, "no operations to redo"))?;
        stacks.undo.push(entry.clone());
        self.persist(&stacks);
        Ok(entry)
    }

    pub fn undo_depth(&self) -> usize {
        self.stacks.lock().unwrap().undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.stacks.lock().unwrap().redo.len()
    }

    fn persist(&self, stacks: &Stacks) {
        let persisted = Persisted { undo: stacks.undo.clone(), redo: stacks.redo.clone() };
        if let Ok(bytes) = serde_json::to_vec(&persisted) {
            let _ = self.fs.write_file(&self.path, &bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use crate::model::{EditOperation, Range, TextEdit};

    fn op(id: &str) -> HistoryEntry {
        HistoryEntry::Single(EditOperation {
            id: id.to_string(),
            timestamp: 0,
            description: "test edit".to_string(),
            file_path: "a.rs".to_string(),
            edits: vec![TextEdit {
                range: Range { start_line: 1, end_line: 1, start_byte: 0, end_byte: 1 },
                target_string: "a".to_string(),
                replacement_string: "b".to_string(),
            }],
            inverse_edits: vec![TextEdit {
                range: Range { start_line: 1, end_line: 1, start_byte: 0, end_byte: 1 },
                target_string: "b".to_string(),
                replacement_string: "a".to_string(),
            }],
        })
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let h = History::new(Arc::new(MemFs::new()), PathBuf::from("/h.json"), 50);
        h.push(op("1"));
        let undone = h.pop_undo().unwrap();
        assert!(matches!(undone, HistoryEntry::Single(ref e) if e.id == "1"));
        assert_eq!(h.undo_depth(), 0);
        assert_eq!(h.redo_depth(), 1);
        let redone = h.pop_redo().unwrap();
        assert!(matches!(redone, HistoryEntry::Single(ref e) if e.id == "1"));
        assert_eq!(h.undo_depth(), 1);
    }

    #[test]
    fn empty_undo_stack_returns_error() {
        let h = History::new(Arc::new(MemFs::new()), PathBuf::from("/h.json"), 50);
        let err = h.pop_undo().unwrap_err();
        assert_eq!(err.code, ErrorCode::NoUndoHistory);
    }

    #[test]
    fn pushing_new_entry_clears_redo_stack() {
        let h = History::new(Arc::new(MemFs::new()), PathBuf::from("/h.json"), 50);
        h.push(op("1"));
        h.pop_undo().unwrap();
        assert_eq!(h.redo_depth(), 1);
        h.push(op("2"));
        assert_eq!(h.redo_depth(), 0);
    }

    #[test]
    fn undo_depth_trims_oldest_entries() {
        let h = History::new(Arc::new(MemFs::new()), PathBuf::from("/h.json"), 2);
        h.push(op("1"));
        h.push(op("2"));
        h.push(op("3"));
        assert_eq!(h.undo_depth(), 2);
    }

    #[test]
    fn history_persists_across_instances() {
        let fs = Arc::new(MemFs::new());
        let path = PathBuf::from("/h.json");
        {
            let h = History::new(fs.clone(), path.clone(), 50);
            h.push(op("1"));
        }
        let h2 = History::new(fs, path, 50);
        assert_eq!(h2.undo_depth(), 1);
    }
}
