//! Path Normalizer — project-root–relative canonicalization, symlink
//! resolution, and containment check.

use crate::error::CoreError;
use std::path::{Path, PathBuf};

/// Normalize `candidate` (absolute or root-relative) against `root`, yielding
/// a root-relative path using `/` separators. Any path resolving outside the
/// root is rejected with `SecurityViolation` — this function never returns an
/// absolute path outside root.
pub fn normalize(root: &Path, candidate: &str) -> Result<String, CoreError> {
    if candidate.is_empty() {
        return Err(CoreError::security_violation("empty path"));
    }

    let candidate_path = Path::new(candidate);
    let joined = if candidate_path.is_absolute() { candidate_path.to_path_buf() } else { root.join(candidate_path) };

    let root_canonical = root
        .canonicalize()
        .map_err(|e| CoreError::internal(format!("root does not exist: {e}")))?;

    // Resolve symlinks when the path exists; otherwise resolve lexically
    // (the path may be a write target that doesn't exist yet).
    let resolved = if joined.exists() {
        joined.canonicalize().map_err(|e| CoreError::security_violation(format!("cannot resolve path: {e}")))?
    } else {
        lexical_normalize(&joined)
    };

    if !resolved.starts_with(&root_canonical) {
        return Err(CoreError::security_violation("path escapes project root"));
    }

    let rel = resolved
        .strip_prefix(&root_canonical)
        .map_err(|_| CoreError::security_violation("path escapes project root"))?;

    Ok(to_forward_slashes(rel))
}

/// Lexically collapse `.`/`..` components without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component::*;
        match component {
            CurDir => {}
            ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Quick rejection test used on the hot path (e.g. watcher events) before the
/// full canonicalizing `normalize` call.
pub fn looks_like_traversal(rel_path: &str) -> bool {
    rel_path.is_empty() || rel_path.contains("..") || rel_path.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn normalizes_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "fn main() {}").unwrap();
        let rel = normalize(dir.path(), "a.rs").unwrap();
        assert_eq!(rel, "a.rs");
    }

    #[test]
    fn rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let err = normalize(dir.path(), "../outside.rs").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::SecurityViolation);
    }

    #[test]
    fn looks_like_traversal_detects_dotdot() {
        assert!(looks_like_traversal("../x"));
        assert!(looks_like_traversal("/abs"));
        assert!(!looks_like_traversal("src/main.rs"));
    }
}
