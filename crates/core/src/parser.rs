//! Parser Port — `parseFile(path, content) -> Document`,
//! `getLanguageForFile`, `supportsQueries`, `warmup`. The core binds only to
//! this trait; `TreeSitterParser` is the concrete implementation behind the
//! `treesitter` feature.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageId {
    Rust,
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    Go,
    C,
    Cpp,
    Java,
    Unknown,
}

impl LanguageId {
    pub fn label(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Go => "go",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::Unknown => "unknown",
        }
    }
}

/// Language dispatch by extension.
pub fn language_for_ext(ext: &str) -> LanguageId {
    match ext {
        "rs" => LanguageId::Rust,
        "ts" | "mts" | "cts" => LanguageId::TypeScript,
        "tsx" => LanguageId::Tsx,
        "js" | "jsx" | "mjs" | "cjs" => LanguageId::JavaScript,
        "py" | "pyi" => LanguageId::Python,
        "go" => LanguageId::Go,
        "c" | "h" => LanguageId::C,
        "cpp" | "cxx" | "cc" | "hpp" | "hxx" => LanguageId::Cpp,
        "java" => LanguageId::Java,
        _ => LanguageId::Unknown,
    }
}

/// A parsed syntax tree plus the source text it was parsed from. `rootNode`
/// access goes through `tree_sitter::Node` directly (capability set:
/// children/childByField/startByte/endByte/kind — already the tree-sitter
/// API shape, so no extra wrapper is introduced beyond this struct).
#[cfg(feature = "treesitter")]
pub struct Document {
    pub language: LanguageId,
    pub tree: tree_sitter::Tree,
    pub source: String,
}

#[cfg(feature = "treesitter")]
impl Document {
    pub fn root(&self) -> tree_sitter::Node<'_> {
        self.tree.root_node()
    }
}

pub trait ParserPort: Send + Sync {
    fn get_language_for_file(&self, ext: &str) -> LanguageId;
    fn supports_queries(&self, language: LanguageId) -> bool;
    #[cfg(feature = "treesitter")]
    fn parse_file(&self, ext: &str, content: &str) -> Option<Document>;
    fn warmup(&self, languages: &[LanguageId]);
}

#[cfg(feature = "treesitter")]
fn ts_language(id: LanguageId) -> Option<tree_sitter::Language> {
    match id {
        LanguageId::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
        LanguageId::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        LanguageId::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        LanguageId::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        LanguageId::Python => Some(tree_sitter_python::LANGUAGE.into()),
        LanguageId::Go => Some(tree_sitter_go::LANGUAGE.into()),
        LanguageId::C => Some(tree_sitter_c::LANGUAGE.into()),
        LanguageId::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
        LanguageId::Java => Some(tree_sitter_java::LANGUAGE.into()),
        LanguageId::Unknown => None,
    }
}

/// Default parser port, backed by `tree-sitter` grammars declared under the
/// `treesitter` feature.
#[derive(Default)]
pub struct TreeSitterParser;

impl ParserPort for TreeSitterParser {
    fn get_language_for_file(&self, ext: &str) -> LanguageId {
        language_for_ext(ext)
    }

    fn supports_queries(&self, language: LanguageId) -> bool {
        !matches!(language, LanguageId::Unknown)
    }

    #[cfg(feature = "treesitter")]
    fn parse_file(&self, ext: &str, content: &str) -> Option<Document> {
        let language_id = language_for_ext(ext);
        let language = ts_language(language_id)?;
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&language).ok()?;
        let tree = parser.parse(content, None)?;
        Some(Document { language: language_id, tree, source: content.to_string() })
    }

    fn warmup(&self, _languages: &[LanguageId]) {
        // tree-sitter grammars have no separate warmup step; languages are
        // loaded lazily per `parse_file` call.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_by_extension() {
        assert_eq!(language_for_ext("rs"), LanguageId::Rust);
        assert_eq!(language_for_ext("py"), LanguageId::Python);
        assert_eq!(language_for_ext("weird"), LanguageId::Unknown);
    }

    #[cfg(feature = "treesitter")]
    #[test]
    fn parses_rust_source() {
        let parser = TreeSitterParser;
        let doc = parser.parse_file("rs", "fn main() {}").unwrap();
        assert_eq!(doc.language, LanguageId::Rust);
        assert!(!doc.root().has_error());
    }
}
