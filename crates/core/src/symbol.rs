//! Symbol Extractor — walks a parsed tree and emits the tagged
//! `Symbol` variants from `model.rs`: `Definition`, `Import`, `Export`.
//!
//! Definitions are extracted by walking the tree-sitter tree and classifying
//! node kinds into `DefinitionKind` per language, via a kind-classification
//! table. Imports and exports are extracted with per-language regexes over
//! raw source rather than tree-sitter queries: tree-sitter handles
//! structural definitions, regex handles import/export statements, which
//! are far more uniform across a language's surface syntax than its
//! definition forms.

use crate::model::{Definition, DefinitionKind, Export, ExportKind, Import, ImportKind, ImportedName, Range, Symbol};
use crate::parser::LanguageId;
use regex::Regex;
use std::sync::OnceLock;

#[cfg(feature = "treesitter")]
use crate::parser::Document;

/// Classify a tree-sitter node kind into a `DefinitionKind`, or `None` if the
/// node isn't a whitelisted definition kind for `language`.
#[cfg(feature = "treesitter")]
fn classify_node(language: LanguageId, kind: &str) -> Option<DefinitionKind> {
    use DefinitionKind::*;
    match (language, kind) {
        (LanguageId::Rust, "struct_item" | "enum_item" | "union_item") => Some(Class),
        (LanguageId::Rust, "trait_item") => Some(Interface),
        (LanguageId::Rust, "function_item") => Some(Function),
        (LanguageId::Rust, "type_item") => Some(TypeAlias),
        (LanguageId::Rust, "const_item" | "static_item") => Some(Variable),

        (LanguageId::TypeScript | LanguageId::Tsx | LanguageId::JavaScript, "class_declaration") => Some(Class),
        (LanguageId::TypeScript | LanguageId::Tsx, "interface_declaration") => Some(Interface),
        (LanguageId::TypeScript | LanguageId::Tsx, "type_alias_declaration") => Some(TypeAlias),
        (
            LanguageId::TypeScript | LanguageId::Tsx | LanguageId::JavaScript,
            "function_declaration" | "method_definition" | "arrow_function",
        ) => Some(Function),
        (LanguageId::TypeScript | LanguageId::Tsx | LanguageId::JavaScript, "lexical_declaration" | "variable_declaration") => {
            Some(Variable)
        }

        (LanguageId::Python, "class_definition") => Some(Class),
        (LanguageId::Python, "function_definition") => Some(Function),

        (LanguageId::Go, "type_declaration") => Some(Class),
        (LanguageId::Go, "function_declaration" | "method_declaration") => Some(Function),

        (LanguageId::C | LanguageId::Cpp, "struct_specifier" | "union_specifier" | "enum_specifier") => Some(Class),
        (LanguageId::Cpp, "class_specifier") => Some(Class),
        (LanguageId::C | LanguageId::Cpp, "function_definition") => Some(Function),
        (LanguageId::Cpp, "namespace_definition") => Some(Class),

        (LanguageId::Java, "class_declaration" | "enum_declaration") => Some(Class),
        (LanguageId::Java, "interface_declaration") => Some(Interface),
        (LanguageId::Java, "method_declaration" | "constructor_declaration") => Some(Function),
        (LanguageId::Java, "field_declaration") => Some(Variable),

        _ => None,
    }
}

/// Definition node kinds that can act as a symbol's `container` (nearest
/// enclosing named scope).
fn is_container_kind(kind: DefinitionKind) -> bool {
    matches!(kind, DefinitionKind::Class | DefinitionKind::Interface)
}

#[cfg(feature = "treesitter")]
fn extract_name<'a>(node: tree_sitter::Node<'a>, source: &'a str) -> Option<String> {
    for field in ["name", "declarator"] {
        if let Some(n) = node.child_by_field_name(field) {
            if let Ok(text) = n.utf8_text(source.as_bytes()) {
                let trimmed = text.trim_start_matches('*').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.split(['(', '[', '<']).next().unwrap_or(trimmed).to_string());
                }
            }
        }
    }
    None
}

#[cfg(feature = "treesitter")]
fn extract_signature<'a>(node: tree_sitter::Node<'a>, source: &'a str) -> String {
    let body = node.child_by_field_name("body");
    let end = body.map(|b| b.start_byte()).unwrap_or(node.end_byte());
    let start = node.start_byte();
    source.get(start..end).unwrap_or("").trim_end().to_string()
}

#[cfg(feature = "treesitter")]
fn byte_to_line(source: &str, byte: usize) -> usize {
    source[..byte.min(source.len())].bytes().filter(|&b| b == b'\n').count() + 1
}

#[cfg(feature = "treesitter")]
fn node_range(node: tree_sitter::Node<'_>, source: &str) -> Range {
    Range {
        start_line: byte_to_line(source, node.start_byte()),
        end_line: byte_to_line(source, node.end_byte()),
        start_byte: node.start_byte(),
        end_byte: node.end_byte(),
    }
}

#[cfg(feature = "treesitter")]
fn walk(
    node: tree_sitter::Node<'_>,
    source: &str,
    language: LanguageId,
    container: Option<String>,
    out: &mut Vec<Symbol>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let mut next_container = container.clone();
        if let Some(kind) = classify_node(language, child.kind()) {
            if let Some(name) = extract_name(child, source) {
                let def = Definition {
                    kind,
                    name: name.clone(),
                    container: container.clone(),
                    signature: extract_signature(child, source),
                    parameters: extract_parameters(child, source),
                    return_type: extract_return_type(child, source),
                    modifiers: extract_modifiers(child, source),
                    doc: None,
                    range: node_range(child, source),
                };
                out.push(Symbol::Definition(def));
                if is_container_kind(kind) {
                    next_container = Some(name);
                }
            }
        }
        walk(child, source, language, next_container, out);
    }
}

#[cfg(feature = "treesitter")]
fn extract_parameters<'a>(node: tree_sitter::Node<'a>, source: &'a str) -> Vec<String> {
    let Some(params) = node.child_by_field_name("parameters").or_else(|| node.child_by_field_name("parameter_list")) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        if child.is_named() {
            if let Ok(text) = child.utf8_text(source.as_bytes()) {
                out.push(text.trim().to_string());
            }
        }
    }
    out
}

#[cfg(feature = "treesitter")]
fn extract_return_type<'a>(node: tree_sitter::Node<'a>, source: &'a str) -> Option<String> {
    node.child_by_field_name("return_type")
        .or_else(|| node.child_by_field_name("type"))
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .map(|s| s.trim().to_string())
}

#[cfg(feature = "treesitter")]
fn extract_modifiers<'a>(node: tree_sitter::Node<'a>, source: &'a str) -> Vec<String> {
    let mut modifiers = Vec::new();
    if let Some(parent) = node.parent() {
        if matches!(parent.kind(), "export_statement" | "export_default_declaration") {
            modifiers.push("export".to_string());
        }
    }
    if let Ok(text) = node.utf8_text(source.as_bytes()) {
        for kw in ["pub", "public", "private", "protected", "static", "async", "export"] {
            if text.split_whitespace().next() == Some(kw) {
                modifiers.push(kw.to_string());
            }
        }
    }
    modifiers.sort();
    modifiers.dedup();
    modifiers
}

/// Extract the `Definition` symbols for a file via tree-sitter, when the
/// `treesitter` feature and a supported extension are both available.
#[cfg(feature = "treesitter")]
pub fn extract_definitions(doc: &Document) -> Vec<Symbol> {
    let mut out = Vec::new();
    walk(doc.root(), &doc.source, doc.language, None, &mut out);
    out.sort_by_key(|s| s.range().start_byte);
    out
}

#[cfg(not(feature = "treesitter"))]
pub fn extract_definitions_unavailable() -> Vec<Symbol> {
    Vec::new()
}

// ---------------------------------------------------------------------------
// Import / export extraction (regex-based, per language)
// ---------------------------------------------------------------------------

struct ImportPattern {
    ext_matches: fn(&str) -> bool,
    regex: fn() -> &'static Regex,
}

fn regex_cell(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid import regex")
}

macro_rules! lazy_regex {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static CELL: OnceLock<Regex> = OnceLock::new();
            CELL.get_or_init(|| regex_cell($pat))
        }
    };
}

lazy_regex!(rust_use_re, r#"^\s*(?:pub\s+)?use\s+([\w:]+(?:::\{[^}]*\})?)\s*;"#);
lazy_regex!(js_import_re, r#"^\s*import\s+(?:type\s+)?(.+?)\s+from\s+['"]([^'"]+)['"]"#);
lazy_regex!(js_side_effect_re, r#"^\s*import\s+['"]([^'"]+)['"]"#);
lazy_regex!(js_require_re, r#"require\(['"]([^'"]+)['"]\)"#);
lazy_regex!(js_export_named_re, r#"^\s*export\s+(?:type\s+)?\{([^}]*)\}(?:\s+from\s+['"]([^'"]+)['"])?"#);
lazy_regex!(js_export_star_re, r#"^\s*export\s+\*\s+(?:as\s+(\w+)\s+)?from\s+['"]([^'"]+)['"]"#);
lazy_regex!(js_export_default_re, r#"^\s*export\s+default\b"#);
lazy_regex!(js_export_decl_re, r#"^\s*export\s+(?:const|function|class|let|var)\s+(\w+)"#);
lazy_regex!(py_import_re, r#"^\s*import\s+([\w.]+)(?:\s+as\s+(\w+))?"#);
lazy_regex!(py_from_import_re, r#"^\s*from\s+([\w.]+)\s+import\s+(.+)"#);
lazy_regex!(go_import_re, r#"^\s*(\w+\s+)?"([^"]+)""#);
lazy_regex!(c_include_re, r#"^\s*#include\s*["<]([^">]+)[">]"#);

fn range_for_line(source: &str, line_idx: usize, line: &str) -> Range {
    let start_byte: usize = source.lines().take(line_idx).map(|l| l.len() + 1).sum();
    Range { start_line: line_idx + 1, end_line: line_idx + 1, start_byte, end_byte: start_byte + line.len() }
}

/// Extract `Import`/`Export` symbols from raw source for `language`.
pub fn extract_imports_exports(language: LanguageId, source: &str) -> Vec<Symbol> {
    match language {
        LanguageId::Rust => extract_rust(source),
        LanguageId::TypeScript | LanguageId::Tsx | LanguageId::JavaScript => extract_js(source),
        LanguageId::Python => extract_python(source),
        LanguageId::Go => extract_go(source),
        LanguageId::C | LanguageId::Cpp => extract_c(source),
        _ => Vec::new(),
    }
}

fn extract_rust(source: &str) -> Vec<Symbol> {
    let mut out = Vec::new();
    for (i, line) in source.lines().enumerate() {
        if let Some(caps) = rust_use_re().captures(line) {
            let path = caps[1].to_string();
            let kind = if path.contains('{') { ImportKind::Named } else { ImportKind::Namespace };
            out.push(Symbol::Import(Import {
                source: path,
                kind,
                imports: None,
                alias: None,
                is_type_only: false,
                range: range_for_line(source, i, line),
            }));
        }
    }
    out
}

fn split_names(list: &str) -> Vec<ImportedName> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|item| {
            if let Some((name, alias)) = item.split_once(" as ") {
                ImportedName { name: name.trim().to_string(), alias: Some(alias.trim().to_string()) }
            } else {
                ImportedName { name: item.to_string(), alias: None }
            }
        })
        .collect()
}

fn extract_js(source: &str) -> Vec<Symbol> {
    let mut out = Vec::new();
    for (i, line) in source.lines().enumerate() {
        let is_type_only = line.trim_start().starts_with("import type") || line.trim_start().starts_with("export type");

        if let Some(caps) = js_import_re().captures(line) {
            let clause = caps[1].trim();
            let src = caps[2].to_string();
            let (kind, names) = if clause.starts_with('{') {
                (ImportKind::Named, Some(split_names(clause.trim_matches(|c| c == '{' || c == '}'))))
            } else if clause.starts_with("* as ") {
                (ImportKind::Namespace, Some(vec![ImportedName { name: clause[5..].trim().to_string(), alias: None }]))
            } else {
                (ImportKind::Default, Some(vec![ImportedName { name: clause.to_string(), alias: None }]))
            };
            out.push(Symbol::Import(Import {
                source: src,
                kind,
                imports: names,
                alias: None,
                is_type_only,
                range: range_for_line(source, i, line),
            }));
            continue;
        }

        if let Some(caps) = js_side_effect_re().captures(line) {
            out.push(Symbol::Import(Import {
                source: caps[1].to_string(),
                kind: ImportKind::SideEffect,
                imports: None,
                alias: None,
                is_type_only: false,
                range: range_for_line(source, i, line),
            }));
            continue;
        }

        if let Some(caps) = js_require_re().captures(line) {
            out.push(Symbol::Import(Import {
                source: caps[1].to_string(),
                kind: ImportKind::SideEffect,
                imports: None,
                alias: None,
                is_type_only: false,
                range: range_for_line(source, i, line),
            }));
        }

        if let Some(caps) = js_export_star_re().captures(line) {
            out.push(Symbol::Export(Export {
                kind: ExportKind::ReExport,
                exports: caps.get(1).map(|m| vec![ImportedName { name: m.as_str().to_string(), alias: None }]),
                source: Some(caps[2].to_string()),
                is_type_only,
                range: range_for_line(source, i, line),
            }));
            continue;
        }

        if let Some(caps) = js_export_named_re().captures(line) {
            out.push(Symbol::Export(Export {
                kind: if caps.get(2).is_some() { ExportKind::ReExport } else { ExportKind::Named },
                exports: Some(split_names(&caps[1])),
                source: caps.get(2).map(|m| m.as_str().to_string()),
                is_type_only,
                range: range_for_line(source, i, line),
            }));
            continue;
        }

        if js_export_default_re().is_match(line) {
            out.push(Symbol::Export(Export {
                kind: ExportKind::Default,
                exports: None,
                source: None,
                is_type_only,
                range: range_for_line(source, i, line),
            }));
            continue;
        }

        if let Some(caps) = js_export_decl_re().captures(line) {
            out.push(Symbol::Export(Export {
                kind: ExportKind::Named,
                exports: Some(vec![ImportedName { name: caps[1].to_string(), alias: None }]),
                source: None,
                is_type_only,
                range: range_for_line(source, i, line),
            }));
        }
    }
    out
}

fn extract_python(source: &str) -> Vec<Symbol> {
    let mut out = Vec::new();
    for (i, line) in source.lines().enumerate() {
        if let Some(caps) = py_from_import_re().captures(line) {
            out.push(Symbol::Import(Import {
                source: caps[1].to_string(),
                kind: ImportKind::Named,
                imports: Some(split_names(&caps[2])),
                alias: None,
                is_type_only: false,
                range: range_for_line(source, i, line),
            }));
        } else if let Some(caps) = py_import_re().captures(line) {
            out.push(Symbol::Import(Import {
                source: caps[1].to_string(),
                kind: ImportKind::Namespace,
                imports: None,
                alias: caps.get(2).map(|m| m.as_str().to_string()),
                is_type_only: false,
                range: range_for_line(source, i, line),
            }));
        }
    }
    out
}

fn extract_go(source: &str) -> Vec<Symbol> {
    let mut out = Vec::new();
    let mut in_block = false;
    for (i, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("import (") {
            in_block = true;
            continue;
        }
        if in_block && trimmed == ")" {
            in_block = false;
            continue;
        }
        if in_block || trimmed.starts_with("import ") {
            if let Some(caps) = go_import_re().captures(trimmed) {
                out.push(Symbol::Import(Import {
                    source: caps[2].to_string(),
                    kind: ImportKind::Namespace,
                    imports: None,
                    alias: caps.get(1).map(|m| m.as_str().trim().to_string()),
                    is_type_only: false,
                    range: range_for_line(source, i, line),
                }));
            }
        }
    }
    out
}

fn extract_c(source: &str) -> Vec<Symbol> {
    let mut out = Vec::new();
    for (i, line) in source.lines().enumerate() {
        if let Some(caps) = c_include_re().captures(line) {
            out.push(Symbol::Import(Import {
                source: caps[1].to_string(),
                kind: ImportKind::SideEffect,
                imports: None,
                alias: None,
                is_type_only: false,
                range: range_for_line(source, i, line),
            }));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_use_statements() {
        let src = "use std::collections::HashMap;\npub use crate::model::{Symbol, Range};\n";
        let imports = extract_imports_exports(LanguageId::Rust, src);
        assert_eq!(imports.len(), 2);
    }

    #[test]
    fn js_named_and_default_imports() {
        let src = "import { foo, bar as baz } from './utils';\nimport React from 'react';\nexport default App;\n";
        let symbols = extract_imports_exports(LanguageId::JavaScript, src);
        assert_eq!(symbols.len(), 3);
    }

    #[test]
    fn python_from_import() {
        let src = "from os import path, sep\nimport sys\n";
        let symbols = extract_imports_exports(LanguageId::Python, src);
        assert_eq!(symbols.len(), 2);
    }

    #[cfg(feature = "treesitter")]
    #[test]
    fn rust_function_definition_extracted() {
        use crate::parser::{ParserPort, TreeSitterParser};
        let parser = TreeSitterParser;
        let doc = parser.parse_file("rs", "fn greet(name: &str) -> String { name.to_string() }").unwrap();
        let defs = extract_definitions(&doc);
        assert_eq!(defs.len(), 1);
        match &defs[0] {
            Symbol::Definition(d) => {
                assert_eq!(d.name, "greet");
                assert_eq!(d.kind, DefinitionKind::Function);
            }
            _ => panic!("expected definition"),
        }
    }

    #[cfg(feature = "treesitter")]
    #[test]
    fn nested_method_gets_container() {
        use crate::parser::{ParserPort, TreeSitterParser};
        let parser = TreeSitterParser;
        let src = "struct Foo; impl Foo { fn bar(&self) {} }";
        let doc = parser.parse_file("rs", src).unwrap();
        let defs = extract_definitions(&doc);
        assert!(defs.iter().any(|s| matches!(s, Symbol::Definition(d) if d.name == "bar")));
    }
}
