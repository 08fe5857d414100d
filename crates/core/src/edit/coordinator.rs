//! Edit Coordinator — orchestrates resolve -> splice -> write -> history
//! for single edits and multi-file batches. A batch is applied file-by-file;
//! if any file fails after others have already been written, every
//! already-applied file is rolled back via its inverse edits before the
//! error is returned. `undo`/`redo` replay the inverse/forward edits
//! recorded in `History`. Built on top of
//! `resolver.rs`/`editor.rs`/`history.rs`.

use crate::edit::editor::Editor;
use crate::edit::history::History;
use crate::edit::resolver::{EditResolver, ResolveOptions};
use crate::error::{CoreError, ErrorCode};
use crate::fs::FileSystemPort;
use crate::model::{BatchOperation, EditOperation, HistoryEntry, TextEdit};
use std::path::Path;
use std::sync::Arc;

pub struct EditRequest {
    pub file_path: String,
    pub target: String,
    pub replacement: String,
    pub description: String,
    pub options: ResolveOptions,
}

/// One target/replacement pair within a multi-edit request to a single
/// file — `apply_multi_edit` resolves and splices a whole `Vec` of these
/// against one file as one atomic operation.
pub struct TargetEdit {
    pub target: String,
    pub replacement: String,
    pub options: ResolveOptions,
}

pub struct EditCoordinator {
    fs: Arc<dyn FileSystemPort>,
    root: std::path::PathBuf,
    resolver: EditResolver,
    editor: Editor,
    history: History,
}

impl EditCoordinator {
    pub fn new(fs: Arc<dyn FileSystemPort>, root: std::path::PathBuf, resolver: EditResolver, editor: Editor, history: History) -> Self {
        Self { fs, root, resolver, editor, history }
    }

    fn abs(&self, rel: &str) -> std::path::PathBuf {
        self.root.join(rel)
    }

    fn read(&self, rel: &str) -> Result<String, CoreError> {
        let bytes = self
            .fs
            .read_file(&self.abs(rel))
            .map_err(|e| CoreError::new(ErrorCode::InternalError, format!("failed to read {rel}: {e}")))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Resolve and apply a single edit, returning the `EditOperation`
    /// recorded to history. A thin wrapper over `apply_multi_edit` with a
    /// one-element edit list.
    pub fn apply_edit(&self, req: EditRequest) -> Result<EditOperation, CoreError> {
        let EditRequest { file_path, target, replacement, description, options } = req;
        self.apply_multi_edit(file_path, vec![TargetEdit { target, replacement, options }], description, false)
    }

    fn resolve_all(&self, content: &str, edits: &[TargetEdit]) -> Result<Vec<TextEdit>, CoreError> {
        edits
            .iter()
            .map(|te| {
                let resolved = self.resolver.resolve(content, &te.target, &te.options)?;
                Ok(TextEdit { range: resolved.range, target_string: resolved.matched_text, replacement_string: te.replacement.clone() })
            })
            .collect()
    }

    /// Resolve every `TargetEdit` against `file_path`'s current content and
    /// splice them in as one atomic operation. When `dry_run` is set,
    /// resolution and splice validation still run — so the caller learns
    /// about an ambiguous or missing target, or overlapping edits — but
    /// nothing is written to disk and no history entry is recorded.
    pub fn apply_multi_edit(
        &self,
        file_path: String,
        edits: Vec<TargetEdit>,
        description: String,
        dry_run: bool,
    ) -> Result<EditOperation, CoreError> {
        let content = self.read(&file_path)?;

        let text_edits = self.resolve_all(&content, &edits).map_err(|e| {
            if dry_run {
                CoreError::new(ErrorCode::BatchDryRunFailed, format!("dry run: {}", e.message)).with_suggestion_opt(e.suggestion)
            } else {
                e
            }
        })?;

        let (new_content, inverse_edits) = self.editor.splice(&content, text_edits.clone()).map_err(|e| {
            if dry_run {
                CoreError::new(ErrorCode::BatchDryRunFailed, format!("dry run: {}", e.message))
            } else {
                e
            }
        })?;

        let op = EditOperation {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now(),
            description,
            file_path: file_path.clone(),
            edits: text_edits,
            inverse_edits,
        };

        if dry_run {
            return Ok(op);
        }

        self.editor.write_with_backup(&self.abs(&file_path), &file_path, &new_content)?;
        self.history.push(HistoryEntry::Single(op.clone()));
        Ok(op)
    }

    /// Apply several edits (possibly across different files) as one unit.
    /// Rolls back every file already written if a later one fails.
    pub fn apply_batch(&self, requests: Vec<EditRequest>, description: String) -> Result<BatchOperation, CoreError> {
        let mut applied: Vec<(String, String)> = Vec::new();
        let mut operations = Vec::new();

        for req in requests {
            match self.apply_single_for_batch(req) {
                Ok((op, pre_edit_content)) => {
                    applied.push((op.file_path.clone(), pre_edit_content));
                    operations.push(op);
                }
                Err(e) => {
                    for (path, original) in applied.iter().rev() {
                        let _ = self.editor.write_with_backup(&self.abs(path), path, original);
                    }
                    return Err(CoreError::new(ErrorCode::BatchApplyFailed, format!("batch failed, rolled back: {e}")));
                }
            }
        }

        let batch = BatchOperation { id: uuid::Uuid::new_v4().to_string(), timestamp: now(), description, operations };
        self.history.push(HistoryEntry::Batch(batch.clone()));
        Ok(batch)
    }

    fn apply_single_for_batch(&self, req: EditRequest) -> Result<(EditOperation, String), CoreError> {
        let content = self.read(&req.file_path)?;
        let resolved = self.resolver.resolve(&content, &req.target, &req.options)?;
        let edit = TextEdit { range: resolved.range, target_string: resolved.matched_text, replacement_string: req.replacement };
        let (new_content, inverse_edits) = self.editor.splice(&content, vec![edit.clone()])?;
        self.editor.write_with_backup(&self.abs(&req.file_path), &req.file_path, &new_content)?;
        let op = EditOperation {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now(),
            description: req.description,
            file_path: req.file_path,
            edits: vec![edit],
            inverse_edits,
        };
        Ok((op, content))
    }

    /// Pop the most recent entry off the undo stack and apply its inverse
    /// edits to restore prior content.
    pub fn undo(&self) -> Result<HistoryEntry, CoreError> {
        let entry = self.history.pop_undo()?;
        match &entry {
            HistoryEntry::Single(op) => self.apply_inverse(op)?,
            HistoryEntry::Batch(batch) => {
                for op in batch.operations.iter().rev() {
                    self.apply_inverse(op)?;
                }
            }
        }
        Ok(entry)
    }

    /// Pop the most recently undone entry off the redo stack and re-apply
    /// its forward edits.
    pub fn redo(&self) -> Result<HistoryEntry, CoreError> {
        let entry = self.history.pop_redo()?;
        match &entry {
            HistoryEntry::Single(op) => self.apply_forward(op)?,
            HistoryEntry::Batch(batch) => {
                for op in &batch.operations {
                    self.apply_forward(op)?;
                }
            }
        }
        Ok(entry)
    }

    fn apply_inverse(&self, op: &EditOperation) -> Result<(), CoreError> {
        let content = self.read(&op.file_path)?;
        let (new_content, _) = self.editor.splice(&content, op.inverse_edits.clone())?;
        self.editor.write_with_backup(&self.abs(&op.file_path), &op.file_path, &new_content)
    }

    fn apply_forward(&self, op: &EditOperation) -> Result<(), CoreError> {
        let content = self.read(&op.file_path)?;
        let (new_content, _) = self.editor.splice(&content, op.edits.clone())?;
        self.editor.write_with_backup(&self.abs(&op.file_path), &op.file_path, &new_content)
    }
}

fn now() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;

    fn coordinator() -> (EditCoordinator, Arc<MemFs>) {
        let fs = Arc::new(MemFs::new());
        let root = std::path::PathBuf::from("/proj");
        let resolver = EditResolver::new(100 * 1024, 4);
        let editor = Editor::new(fs.clone(), root.join(".smart-context/data/history/backups"), 10);
        let history = History::new(fs.clone(), root.join(".smart-context/data/history/history.json"), 50);
        (EditCoordinator::new(fs.clone(), root, resolver, editor, history), fs)
    }

    #[test]
    fn apply_then_undo_restores_content() {
        let (coord, fs) = coordinator();
        fs.write_file(Path::new("/proj/a.rs"), b"fn a() { 1 }").unwrap();
        let req = EditRequest {
            file_path: "a.rs".to_string(),
            target: "1".to_string(),
            replacement: "100".to_string(),
            description: "bump constant".to_string(),
            options: ResolveOptions::default(),
        };
        coord.apply_edit(req).unwrap();
        assert_eq!(fs.read_file(Path::new("/proj/a.rs")).unwrap(), b"fn a() { 100 }");
        coord.undo().unwrap();
        assert_eq!(fs.read_file(Path::new("/proj/a.rs")).unwrap(), b"fn a() { 1 }");
    }

    #[test]
    fn batch_rolls_back_on_later_failure() {
        let (coord, fs) = coordinator();
        fs.write_file(Path::new("/proj/a.rs"), b"fn a() { 1 }").unwrap();
        fs.write_file(Path::new("/proj/b.rs"), b"fn b() { 2 }").unwrap();
        let requests = vec![
            EditRequest {
                file_path: "a.rs".to_string(),
                target: "1".to_string(),
                replacement: "100".to_string(),
                description: "edit a".to_string(),
                options: ResolveOptions::default(),
            },
            EditRequest {
                file_path: "b.rs".to_string(),
                target: "missing target".to_string(),
                replacement: "x".to_string(),
                description: "edit b".to_string(),
                options: ResolveOptions::default(),
            },
        ];
        let err = coord.apply_batch(requests, "two-file batch".to_string()).unwrap_err();
        assert_eq!(err.code, ErrorCode::BatchApplyFailed);
        assert_eq!(fs.read_file(Path::new("/proj/a.rs")).unwrap(), b"fn a() { 1 }");
    }

    #[test]
    fn redo_reapplies_undone_edit() {
        let (coord, fs) = coordinator();
        fs.write_file(Path::new("/proj/a.rs"), b"fn a() { 1 }").unwrap();
        let req = EditRequest {
            file_path: "a.rs".to_string(),
            target: "1".to_string(),
            replacement: "100".to_string(),
            description: "bump constant".to_string(),
            options: ResolveOptions::default(),
        };
        coord.apply_edit(req).unwrap();
        coord.undo().unwrap();
        coord.redo().unwrap();
        assert_eq!(fs.read_file(Path::new("/proj/a.rs")).unwrap(), b"fn a() { 100 }");
    }

    #[test]
    fn apply_multi_edit_applies_both_edits_as_one_operation() {
        let (coord, fs) = coordinator();
        fs.write_file(Path::new("/proj/a.rs"), b"fn a() { 1 } fn b() { 2 }").unwrap();
        let edits = vec![
            TargetEdit { target: "1".to_string(), replacement: "100".to_string(), options: ResolveOptions::default() },
            TargetEdit { target: "2".to_string(), replacement: "200".to_string(), options: ResolveOptions::default() },
        ];
        let op = coord.apply_multi_edit("a.rs".to_string(), edits, "bump both".to_string(), false).unwrap();
        assert_eq!(op.edits.len(), 2);
        assert_eq!(fs.read_file(Path::new("/proj/a.rs")).unwrap(), b"fn a() { 100 } fn b() { 200 }");
        coord.undo().unwrap();
        assert_eq!(fs.read_file(Path::new("/proj/a.rs")).unwrap(), b"fn a() { 1 } fn b() { 2 }");
    }

    #[test]
    fn dry_run_does_not_write_or_record_history() {
        let (coord, fs) = coordinator();
        fs.write_file(Path::new("/proj/a.rs"), b"fn a() { 1 }").unwrap();
        let edits = vec![TargetEdit { target: "1".to_string(), replacement: "100".to_string(), options: ResolveOptions::default() }];
        let op = coord.apply_multi_edit("a.rs".to_string(), edits, "preview".to_string(), true).unwrap();
        assert_eq!(op.edits[0].replacement_string, "100");
        assert_eq!(fs.read_file(Path::new("/proj/a.rs")).unwrap(), b"fn a() { 1 }");
        assert!(coord.undo().is_err());
    }

    #[test]
    fn dry_run_reports_unresolvable_target_as_batch_dry_run_failed() {
        let (coord, _fs) = coordinator();
        _fs.write_file(Path::new("/proj/a.rs"), b"fn a() { 1 }").unwrap();
        let edits = vec![TargetEdit { target: "missing".to_string(), replacement: "x".to_string(), options: ResolveOptions::default() }];
        let err = coord.apply_multi_edit("a.rs".to_string(), edits, "preview".to_string(), true).unwrap_err();
        assert_eq!(err.code, ErrorCode::BatchDryRunFailed);
    }
}
