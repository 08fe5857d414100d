//! Shared data model: Range, Symbol, SymbolRecord, DependencyEdge,
//! VectorChunk, UcgNode, EditOperation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Byte ranges are authoritative; line numbers are derived from them at
/// extraction time and kept alongside for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_line: usize,
    pub end_line: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Range {
    pub fn len(&self) -> usize {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.start_byte >= self.end_byte
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.start_byte < other.end_byte && other.start_byte < self.end_byte
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    Class,
    Interface,
    Method,
    Function,
    Variable,
    TypeAlias,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub kind: DefinitionKind,
    pub name: String,
    /// Name of the sibling definition in the same file whose range strictly
    /// encloses this one (nearest ancestor of a whitelisted kind).
    pub container: Option<String>,
    /// Definition text up to the body opening (if any).
    pub signature: String,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub modifiers: Vec<String>,
    pub doc: Option<String>,
    pub range: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Default,
    Named,
    Namespace,
    SideEffect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub source: String,
    pub kind: ImportKind,
    pub imports: Option<Vec<ImportedName>>,
    pub alias: Option<String>,
    pub is_type_only: bool,
    pub range: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Named,
    Default,
    ReExport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    pub kind: ExportKind,
    pub exports: Option<Vec<ImportedName>>,
    pub source: Option<String>,
    pub is_type_only: bool,
    pub range: Range,
}

/// Tagged variant over the three symbol shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag")]
pub enum Symbol {
    Definition(Definition),
    Import(Import),
    Export(Export),
}

impl Symbol {
    pub fn range(&self) -> &Range {
        match self {
            Symbol::Definition(d) => &d.range,
            Symbol::Import(i) => &i.range,
            Symbol::Export(e) => &e.range,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Symbol::Definition(d) => Some(&d.name),
            _ => None,
        }
    }
}

/// Per-file symbol record, keyed by content hash for the hash short-circuit
///. Replaced atomically on reparse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub path: String,
    pub content_hash: u64,
    pub parsed_at: i64,
    pub symbols: Vec<Symbol>,
}

impl SymbolRecord {
    /// Invariant: symbols strictly ordered by `range.startByte`.
    pub fn is_ordered(&self) -> bool {
        self.symbols.windows(2).all(|w| w[0].range().start_byte <= w[1].range().start_byte)
    }
}

/// Tombstone for a removed symbol, retained for a bounded window to improve
/// retrieval across edits (glossary: "ghost symbol").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhostSymbol {
    pub name: String,
    pub last_known_path: String,
    pub removed_at: i64,
}

/// Directed `source -> target` edge arising from an import the Module
/// Resolver mapped to a concrete file. Cycles permitted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
}

/// `{ chunkId, filePath, byteRange, providerId, modelId, dims, vector }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorChunk {
    pub chunk_id: String,
    pub file_path: String,
    pub byte_range: Range,
    pub provider_id: String,
    pub model_id: String,
    pub dims: usize,
    pub vector: Vec<f32>,
}

pub fn chunk_id(file_path: &str, byte_range: &Range, provider_id: &str, model_id: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update(byte_range.start_byte.to_le_bytes());
    hasher.update(byte_range.end_byte.to_le_bytes());
    hasher.update(provider_id.as_bytes());
    hasher.update(model_id.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        let mut s = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Lod {
    Unknown = 0,
    Topology = 1,
    Skeleton = 2,
    FullAst = 3,
}

impl Lod {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Lod::Unknown,
            1 => Lod::Topology,
            2 => Lod::Skeleton,
            _ => Lod::FullAst,
        }
    }
}

/// `{ path, lod, topology?, skeleton?, astDocId?, dependencies, dependents,
/// lastModified, size, lodUpdatedAt }`. Invariants enforced by `ensure_lod`
/// in `ucg.rs`, not here (this is a plain data holder).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UcgNode {
    pub path: String,
    pub lod: Lod,
    pub topology: Option<Vec<String>>,
    pub skeleton: Option<String>,
    pub ast_doc_id: Option<String>,
    pub dependencies: BTreeSet<String>,
    pub dependents: BTreeSet<String>,
    pub last_modified: i64,
    pub size: u64,
    pub lod_updated_at: i64,
}

impl UcgNode {
    pub fn new(path: String) -> Self {
        Self {
            path,
            lod: Lod::Unknown,
            topology: None,
            skeleton: None,
            ast_doc_id: None,
            dependencies: BTreeSet::new(),
            dependents: BTreeSet::new(),
            last_modified: 0,
            size: 0,
            lod_updated_at: 0,
        }
    }
}

/// A single byte-range replacement within one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: Range,
    pub target_string: String,
    pub replacement_string: String,
}

/// `{ id, timestamp, description, filePath, edits, inverseEdits }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditOperation {
    pub id: String,
    pub timestamp: i64,
    pub description: String,
    pub file_path: String,
    pub edits: Vec<TextEdit>,
    pub inverse_edits: Vec<TextEdit>,
}

/// A single committed batch: one `EditOperation` per file, undone/redone as
/// one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOperation {
    pub id: String,
    pub timestamp: i64,
    pub description: String,
    pub operations: Vec<EditOperation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum HistoryEntry {
    Single(EditOperation),
    Batch(BatchOperation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_overlap() {
        let a = Range { start_line: 1, end_line: 2, start_byte: 0, end_byte: 10 };
        let b = Range { start_line: 2, end_line: 3, start_byte: 5, end_byte: 15 };
        let c = Range { start_line: 3, end_line: 4, start_byte: 10, end_byte: 20 };
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn symbol_record_ordering() {
        let r = |s: usize, e: usize| Range { start_line: 1, end_line: 1, start_byte: s, end_byte: e };
        let rec = SymbolRecord {
            path: "a.rs".into(),
            content_hash: 0,
            parsed_at: 0,
            symbols: vec![
                Symbol::Import(Import {
                    source: "b".into(),
                    kind: ImportKind::Named,
                    imports: None,
                    alias: None,
                    is_type_only: false,
                    range: r(0, 5),
                }),
                Symbol::Definition(Definition {
                    kind: DefinitionKind::Function,
                    name: "f".into(),
                    container: None,
                    signature: "fn f()".into(),
                    parameters: vec![],
                    return_type: None,
                    modifiers: vec![],
                    doc: None,
                    range: r(6, 20),
                }),
            ],
        };
        assert!(rec.is_ordered());
    }

    #[test]
    fn chunk_id_is_deterministic() {
        let r = Range { start_line: 1, end_line: 2, start_byte: 0, end_byte: 10 };
        let a = chunk_id("x.rs", &r, "fastembed", "minilm");
        let b = chunk_id("x.rs", &r, "fastembed", "minilm");
        assert_eq!(a, b);
        let c = chunk_id("y.rs", &r, "fastembed", "minilm");
        assert_ne!(a, c);
    }
}
