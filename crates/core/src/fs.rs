//! File System Port — read/write/stat/glob abstraction with an
//! in-memory implementation for tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, Clone, Copy)]
pub struct Stat {
    pub size: u64,
    pub mtime: i64,
    pub is_file: bool,
    pub is_dir: bool,
}

pub trait FileSystemPort: Send + Sync {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
    fn stat(&self, path: &Path) -> io::Result<Stat>;
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
    fn exists(&self, path: &Path) -> bool;
    fn create_dir(&self, path: &Path) -> io::Result<()>;
    fn delete_file(&self, path: &Path) -> io::Result<()>;
}

/// Real filesystem implementation. Writes are atomic: content lands in a
/// sibling temp file first, then an OS-level rename replaces the target.
pub struct RealFs;

impl FileSystemPort for RealFs {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let tmp = parent.join(format!(".{}.tmp-{}", file_name_or(path, "file"), uuid::Uuid::new_v4()));
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)
    }

    fn stat(&self, path: &Path) -> io::Result<Stat> {
        let meta = std::fs::metadata(path)?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Ok(Stat { size: meta.len(), mtime, is_file: meta.is_file(), is_dir: meta.is_dir() })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            entries.push(entry?.path());
        }
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

fn file_name_or<'a>(path: &'a Path, default: &'a str) -> std::borrow::Cow<'a, str> {
    path.file_name().map(|n| n.to_string_lossy()).unwrap_or(default.into())
}

/// In-memory filesystem for unit/integration tests — no real I/O.
#[derive(Default)]
pub struct MemFs {
    files: RwLock<HashMap<PathBuf, Vec<u8>>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileSystemPort for MemFs {
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found"))
    }

    fn write_file(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.files.write().unwrap().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn stat(&self, path: &Path) -> io::Result<Stat> {
        let files = self.files.read().unwrap();
        let bytes = files.get(path).ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not found"))?;
        Ok(Stat { size: bytes.len() as u64, mtime: 0, is_file: true, is_dir: false })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let files = self.files.read().unwrap();
        Ok(files.keys().filter(|p| p.parent() == Some(path)).cloned().collect())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.read().unwrap().contains_key(path)
    }

    fn create_dir(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        self.files.write().unwrap().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_fs_roundtrip() {
        let fs = MemFs::new();
        let p = PathBuf::from("/proj/a.rs");
        fs.write_file(&p, b"fn main() {}").unwrap();
        assert!(fs.exists(&p));
        assert_eq!(fs.read_file(&p).unwrap(), b"fn main() {}");
        fs.delete_file(&p).unwrap();
        assert!(!fs.exists(&p));
    }

    #[test]
    fn real_fs_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.txt");
        let rfs = RealFs;
        rfs.write_file(&p, b"hello").unwrap();
        assert_eq!(std::fs::read(&p).unwrap(), b"hello");
        rfs.write_file(&p, b"world").unwrap();
        assert_eq!(std::fs::read(&p).unwrap(), b"world");
    }
}
