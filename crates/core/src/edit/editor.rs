//! Editor — applies a batch of `TextEdit`s to one file's content in
//! descending-offset order (so earlier splices don't invalidate later
//! ranges), rejecting overlapping edits outright, writing the result
//! atomically via the `FileSystemPort`, and retaining a bounded number of
//! pre-edit backups. Computes the inverse edits needed to undo the batch
//! as a side effect of applying it.

use crate::error::{CoreError, ErrorCode};
use crate::fs::FileSystemPort;
use crate::model::{Range, TextEdit};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Editor {
    fs: Arc<dyn FileSystemPort>,
    backups_dir: PathBuf,
    backups_per_file: usize,
}

impl Editor {
    pub fn new(fs: Arc<dyn FileSystemPort>, backups_dir: PathBuf, backups_per_file: usize) -> Self {
        Self { fs, backups_dir, backups_per_file }
    }

    /// Splice `edits` into `content`, returning the new content and the
    /// inverse edits that would undo this exact change. Edits must be
    /// pre-sorted by nothing in particular by the caller; this function
    /// sorts them itself and rejects overlaps.
    pub fn splice(&self, content: &str, mut edits: Vec<TextEdit>) -> Result<(String, Vec<TextEdit>), CoreError> {
        edits.sort_by_key(|e| std::cmp::Reverse(e.range.start_byte));
        for window in edits.windows(2) {
            if window[0].range.overlaps(&window[1].range) {
                return Err(CoreError::new(ErrorCode::BatchApplyFailed, "edits overlap; cannot apply as a single batch"));
            }
        }

        // Edits are applied right-to-left, but an inverse edit's range must
        // describe where its text ends up in the *final* content — which
        // earlier-processed (further-right) edits don't yet reflect, since
        // every edit still to come (further left) shifts everything to its
        // right by its own length delta. `suffix_shift[i]` is exactly that:
        // the sum of length deltas of every edit still to be applied after
        // edit `i`.
        let deltas: Vec<i64> = edits
            .iter()
            .map(|e| e.replacement_string.len() as i64 - (e.range.end_byte - e.range.start_byte) as i64)
            .collect();
        let mut suffix_shift = vec![0i64; edits.len()];
        let mut running = 0i64;
        for i in (0..edits.len()).rev() {
            suffix_shift[i] = running;
            running += deltas[i];
        }

        let mut result = content.to_string();
        let mut inverse_edits = Vec::with_capacity(edits.len());

        for (i, edit) in edits.iter().enumerate() {
            if !result.is_char_boundary(edit.range.start_byte) || !result.is_char_boundary(edit.range.end_byte) {
                return Err(CoreError::new(ErrorCode::BatchApplyFailed, "edit range falls outside a character boundary"));
            }
            let actual = result.get(edit.range.start_byte..edit.range.end_byte).ok_or_else(|| {
                CoreError::new(ErrorCode::BatchApplyFailed, "edit range out of bounds for current content")
            })?;
            if actual != edit.target_string {
                return Err(CoreError::new(
                    ErrorCode::HashMismatch,
                    "content at the target range no longer matches the expected text",
                ));
            }

            let inverse_start = (edit.range.start_byte as i64 + suffix_shift[i]) as usize;
            let inverse_range = Range {
                start_line: edit.range.start_line,
                end_line: edit.range.end_line,
                start_byte: inverse_start,
                end_byte: inverse_start + edit.replacement_string.len(),
            };
            inverse_edits.push(TextEdit {
                range: inverse_range,
                target_string: edit.replacement_string.clone(),
                replacement_string: edit.target_string.clone(),
            });

            result.replace_range(edit.range.start_byte..edit.range.end_byte, &edit.replacement_string);
        }

        inverse_edits.reverse();
        Ok((result, inverse_edits))
    }

    /// Write `content` to `path` atomically (via the filesystem port's
    /// temp+rename semantics), first copying the existing file into
    /// `backups_dir` and trimming to `backups_per_file` retained copies.
    /// `rel_path` is the file's path relative to the project root and is
    /// encoded into the backup filename, so two files sharing a basename in
    /// different directories never collide in the backup listing.
    pub fn write_with_backup(&self, path: &Path, rel_path: &str, content: &str) -> Result<(), CoreError> {
        if self.fs.exists(path) {
            self.backup(path, rel_path)?;
        }
        self.fs
            .write_file(path, content.as_bytes())
            .map_err(|e| CoreError::new(ErrorCode::InternalError, format!("failed to write {}: {e}", path.display())))
    }

    /// Encode a relative path into a filesystem-safe stem by replacing path
    /// separators — the same path under different directories must never
    /// produce the same encoded name as a different path.
    fn encode_path(rel_path: &str) -> String {
        rel_path.replace(['/', '\\'], "_")
    }

    fn backup(&self, path: &Path, rel_path: &str) -> Result<(), CoreError> {
        let existing = self
            .fs
            .read_file(path)
            .map_err(|e| CoreError::new(ErrorCode::InternalError, format!("failed to read {} for backup: {e}", path.display())))?;
        let encoded = Self::encode_path(rel_path);
        let timestamp = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
        let backup_path = self.backups_dir.join(format!("{encoded}_{timestamp}.bak"));
        self.fs
            .write_file(&backup_path, &existing)
            .map_err(|e| CoreError::new(ErrorCode::InternalError, format!("failed to write backup: {e}")))?;
        self.trim_backups(&encoded)
    }

    fn trim_backups(&self, encoded: &str) -> Result<(), CoreError> {
        let mut entries: Vec<PathBuf> = self
            .fs
            .read_dir(&self.backups_dir)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with(&format!("{encoded}_"))))
            .collect();
        entries.sort();
        while entries.len() > self.backups_per_file {
            let oldest = entries.remove(0);
            let _ = self.fs.delete_file(&oldest);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;

    fn edit(start: usize, end: usize, target: &str, replacement: &str) -> TextEdit {
        TextEdit {
            range: Range { start_line: 1, end_line: 1, start_byte: start, end_byte: end },
            target_string: target.to_string(),
            replacement_string: replacement.to_string(),
        }
    }

    #[test]
    fn applies_descending_edits_and_produces_inverse() {
        let editor = Editor::new(Arc::new(MemFs::new()), PathBuf::from("/backups"), 10);
        let content = "fn a() { 1 } fn b() { 2 }";
        let edits = vec![edit(9, 12, "1 }", "100 }"), edit(22, 25, "2 }", "200 }")];
        let (result, inverse) = editor.splice(content, edits).unwrap();
        assert_eq!(result, "fn a() { 100 } fn b() { 200 }");
        let (restored, _) = editor.splice(&result, inverse).unwrap();
        assert_eq!(restored, content);
    }

    #[test]
    fn overlapping_edits_are_rejected() {
        let editor = Editor::new(Arc::new(MemFs::new()), PathBuf::from("/backups"), 10);
        let edits = vec![edit(0, 5, "hello", "hi"), edit(3, 8, "lo wo", "x")];
        let err = editor.splice("hello world", edits).unwrap_err();
        assert_eq!(err.code, ErrorCode::BatchApplyFailed);
    }

    #[test]
    fn stale_target_text_is_detected() {
        let editor = Editor::new(Arc::new(MemFs::new()), PathBuf::from("/backups"), 10);
        let edits = vec![edit(0, 5, "wrong", "x")];
        let err = editor.splice("hello world", edits).unwrap_err();
        assert_eq!(err.code, ErrorCode::HashMismatch);
    }

    #[test]
    fn backup_retention_trims_to_limit() {
        let fs = Arc::new(MemFs::new());
        let path = PathBuf::from("/proj/a.rs");
        fs.write_file(&path, b"v0").unwrap();
        let editor = Editor::new(fs.clone(), PathBuf::from("/proj/.smart-context/data/history/backups"), 2);
        for i in 1..=4 {
            editor.write_with_backup(&path, "a.rs", &format!("v{i}")).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        let backups = fs.read_dir(&PathBuf::from("/proj/.smart-context/data/history/backups")).unwrap();
        assert!(backups.len() <= 2);
    }

    #[test]
    fn backups_for_same_basename_in_different_dirs_dont_collide() {
        let fs = Arc::new(MemFs::new());
        let backups_dir = PathBuf::from("/proj/.smart-context/data/history/backups");
        let path_a = PathBuf::from("/proj/src/a/mod.rs");
        let path_b = PathBuf::from("/proj/src/b/mod.rs");
        fs.write_file(&path_a, b"a-v0").unwrap();
        fs.write_file(&path_b, b"b-v0").unwrap();
        let editor = Editor::new(fs.clone(), backups_dir.clone(), 2);

        editor.write_with_backup(&path_a, "src/a/mod.rs", "a-v1").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        editor.write_with_backup(&path_b, "src/b/mod.rs", "b-v1").unwrap();

        let entries = fs.read_dir(&backups_dir).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|p| p.file_name().unwrap().to_str().unwrap().starts_with("src_a_mod.rs_")));
        assert!(entries.iter().any(|p| p.file_name().unwrap().to_str().unwrap().starts_with("src_b_mod.rs_")));
    }
}
