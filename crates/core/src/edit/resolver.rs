//! Edit Resolver — turns a caller-supplied `target_string` (plus
//! optional context hints and an expected content hash) into a
//! `ResolvedEdit` byte range within a file's current content. Pipeline:
//! normalize -> candidate generation (exact, whitespace-insensitive,
//! levenshtein) -> context filter -> disambiguation -> hash verification.
//! Follows the crate's existing `CoreError`/`ErrorCode` idiom from
//! `error.rs`.

use crate::error::{CoreError, ErrorCode, Suggestion};
use crate::model::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Whitespace,
    Structural,
    Levenshtein,
}

/// `Literal` matches target text as given; `Structural` additionally folds
/// `'`/`"`/`` ` `` together so a target written with different quote style
/// than the file still resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    #[default]
    Literal,
    Structural,
}

#[derive(Debug, Clone)]
pub struct ResolvedEdit {
    pub range: Range,
    pub matched_text: String,
    pub kind: MatchKind,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Lines of surrounding content the caller expects immediately before
    /// the target, used to disambiguate when the target string recurs.
    pub context_before: Option<String>,
    pub context_after: Option<String>,
    /// SHA-256 hex digest of the content the caller last read; verified
    /// against current content once a unique match is found.
    pub expected_content_hash: Option<String>,
    pub normalization: Normalization,
    /// When multiple candidates survive context filtering, pick the first
    /// (by start byte) instead of returning `AmbiguousMatch`.
    pub allow_ambiguous_auto_pick: bool,
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn byte_to_line(source: &str, byte: usize) -> usize {
    source[..byte.min(source.len())].bytes().filter(|&b| b == b'\n').count() + 1
}

fn find_exact(content: &str, target: &str) -> Vec<usize> {
    if target.is_empty() {
        return Vec::new();
    }
    content.match_indices(target).map(|(i, _)| i).collect()
}

/// Collapse `\r\n` and lone `\r` to `\n`. Safe to run on raw bytes: `\r`/`\n`
/// are always standalone single-byte ASCII characters in UTF-8 and never
/// appear as continuation bytes of a multi-byte sequence.
fn normalize_line_endings(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            out.push('\n');
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Same as `normalize_line_endings` but also returns, for every byte offset
/// in the normalized output, the corresponding byte offset in `content` —
/// needed because collapsing `\r\n` shortens the string and a later match
/// offset has to be translated back before it can be used as a `Range`.
fn normalize_line_endings_with_map(content: &str) -> (String, Vec<usize>) {
    let bytes = content.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut map = Vec::with_capacity(bytes.len() + 1);
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\r' {
            out.push(b'\n');
            map.push(i);
            i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
        } else {
            out.push(bytes[i]);
            map.push(i);
            i += 1;
        }
    }
    map.push(bytes.len());
    (String::from_utf8(out).unwrap_or_default(), map)
}

/// Find `target` in `content` treating `\r\n`/`\r`/`\n` as equivalent —
/// catches a target copied from a file with different line endings than
/// the one being edited.
fn find_exact_line_ending_insensitive(content: &str, target: &str) -> Vec<(usize, usize)> {
    let target_norm = normalize_line_endings(target);
    if target_norm.is_empty() {
        return Vec::new();
    }
    let (content_norm, map) = normalize_line_endings_with_map(content);
    content_norm
        .match_indices(&target_norm)
        .filter_map(|(i, m)| {
            let end = i + m.len();
            if end < map.len() { Some((map[i], map[end])) } else { None }
        })
        .collect()
}

/// Fold `'`/`"`/`` ` `` together so quote-style differences don't block a
/// match. Quote characters are single-byte ASCII, so this preserves byte
/// length 1:1 and match offsets need no translation back to `content`.
fn normalize_quotes(s: &str) -> String {
    s.chars().map(|c| if c == '\'' || c == '"' || c == '`' { '"' } else { c }).collect()
}

fn find_structural(content: &str, target: &str) -> Vec<(usize, usize)> {
    let target_norm = normalize_quotes(target);
    if target_norm.is_empty() {
        return Vec::new();
    }
    let content_norm = normalize_quotes(content);
    content_norm.match_indices(&target_norm).map(|(i, _)| (i, i + target_norm.len())).collect()
}

/// Find occurrences of `target` ignoring run-length of whitespace
/// differences, by scanning a sliding window of the same token count.
fn find_whitespace_insensitive(content: &str, target: &str) -> Vec<(usize, usize)> {
    let normalized_target = normalize_whitespace(target);
    if normalized_target.is_empty() {
        return Vec::new();
    }
    let target_token_count = normalized_target.split(' ').count();
    let mut results = Vec::new();

    let tokens: Vec<(usize, &str)> = content
        .split_word_bound_indices_approx()
        .collect();

    for window_start in 0..tokens.len() {
        if window_start + target_token_count > tokens.len() {
            break;
        }
        let window = &tokens[window_start..window_start + target_token_count];
        let candidate: String = window.iter().map(|(_, t)| *t).collect::<Vec<_>>().join(" ");
        if candidate == normalized_target {
            let start = window[0].0;
            let last = window.last().unwrap();
            let end = last.0 + last.1.len();
            results.push((start, end));
        }
    }
    results
}

/// Minimal word-boundary tokenizer used only by the whitespace-insensitive
/// candidate pass above (not a general-purpose lexer).
trait ApproxWordBounds {
    fn split_word_bound_indices_approx(&self) -> Vec<(usize, &str)>;
}

impl ApproxWordBounds for str {
    fn split_word_bound_indices_approx(&self) -> Vec<(usize, &str)> {
        let mut out = Vec::new();
        let mut idx = 0;
        for word in self.split_whitespace() {
            let start = self[idx..].find(word).map(|p| idx + p).unwrap_or(idx);
            out.push((start, word));
            idx = start + word.len();
        }
        out
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Slide a window of `target.len()` bytes across `content`, keeping
/// matches within an edit-distance threshold proportional to target
/// length. Gated by the caller on file size / target length (
/// `levenshtein_max_file_size`/`levenshtein_min_target_len`) before this is
/// ever invoked — this function itself has no size awareness.
fn find_levenshtein(content: &str, target: &str, max_distance: usize) -> Vec<(usize, usize, usize)> {
    if target.is_empty() {
        return Vec::new();
    }
    let target_len = target.len();
    let mut best: Option<(usize, usize, usize)> = None;
    let mut results = Vec::new();

    let mut i = 0;
    while i + target_len <= content.len() {
        if content.is_char_boundary(i) && content.is_char_boundary(i + target_len) {
            let window = &content[i..i + target_len];
            let dist = levenshtein(window, target);
            if dist <= max_distance {
                match best {
                    Some((_, _, best_dist)) if dist >= best_dist => {}
                    _ => best = Some((i, i + target_len, dist)),
                }
                results.push((i, i + target_len, dist));
            }
        }
        i += 1;
    }
    results
}

pub struct EditResolver {
    pub levenshtein_max_file_size: u64,
    pub levenshtein_min_target_len: usize,
}

impl EditResolver {
    pub fn new(levenshtein_max_file_size: u64, levenshtein_min_target_len: usize) -> Self {
        Self { levenshtein_max_file_size, levenshtein_min_target_len }
    }

    /// Resolve `target` within `content`, applying the pipeline in order
    /// and stopping at the first stage that yields exactly one candidate
    /// (after context filtering). Returns `NoMatch`, `AmbiguousMatch`
    /// (with a `Suggestion` naming the conflicting lines), or
    /// `LevenshteinBlocked` when the file is too large for a short target.
    pub fn resolve(&self, content: &str, target: &str, opts: &ResolveOptions) -> Result<ResolvedEdit, CoreError> {
        if let Some(expected) = &opts.expected_content_hash {
            let actual = sha256_hex(content);
            if &actual != expected {
                return Err(CoreError::new(
                    ErrorCode::HashMismatch,
                    "file content has changed since it was last read; re-read before editing",
                ));
            }
        }

        let mut exact: Vec<(usize, usize)> = find_exact(content, target).into_iter().map(|s| (s, s + target.len())).collect();
        if exact.is_empty() {
            exact = find_exact_line_ending_insensitive(content, target);
        }
        if let Some(resolved) = self.pick(content, target, exact, MatchKind::Exact, opts)? {
            return Ok(resolved);
        }

        let whitespace = find_whitespace_insensitive(content, target);
        if let Some(resolved) = self.pick(content, target, whitespace, MatchKind::Whitespace, opts)? {
            return Ok(resolved);
        }

        if opts.normalization == Normalization::Structural {
            let structural = find_structural(content, target);
            if let Some(resolved) = self.pick(content, target, structural, MatchKind::Structural, opts)? {
                return Ok(resolved);
            }
        }

        if (content.len() as u64) > self.levenshtein_max_file_size && target.len() < self.levenshtein_min_target_len {
            return Err(CoreError::new(
                ErrorCode::LevenshteinBlocked,
                "target too short to fuzzy-match safely in a file this large",
            ));
        }

        let max_distance = (target.len() / 10).max(1);
        let fuzzy: Vec<(usize, usize)> =
            find_levenshtein(content, target, max_distance).into_iter().map(|(s, e, _)| (s, e)).collect();
        if let Some(resolved) = self.pick(content, target, fuzzy, MatchKind::Levenshtein, opts)? {
            return Ok(resolved);
        }

        Err(CoreError::new(ErrorCode::NoMatch, "no occurrence of the target text was found in the file"))
    }

    fn pick(
        &self,
        content: &str,
        target: &str,
        mut candidates: Vec<(usize, usize)>,
        kind: MatchKind,
        opts: &ResolveOptions,
    ) -> Result<Option<ResolvedEdit>, CoreError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        if candidates.len() > 1 {
            candidates.retain(|&(start, end)| self.context_matches(content, start, end, opts));
        }

        if candidates.len() > 1 {
            candidates.sort_by_key(|&(start, _)| start);

            if opts.allow_ambiguous_auto_pick {
                candidates.truncate(1);
            } else {
                let conflicting_lines: Vec<usize> = candidates.iter().map(|&(s, _)| byte_to_line(content, s)).collect();
                let (sug_start, sug_end) = candidates[0];
                let line_range = Some((byte_to_line(content, sug_start), byte_to_line(content, sug_end)));
                return Err(CoreError::new(ErrorCode::AmbiguousMatch, format!("target matched {} locations", candidates.len()))
                    .with_suggestion(Suggestion { line_range, conflicting_lines, message: Some(
                        "provide context_before/context_after or a narrower target to disambiguate".to_string(),
                    ) }));
            }
        }

        let (start, end) = candidates[0];
        let matched_text = content.get(start..end).unwrap_or(target).to_string();
        Ok(Some(ResolvedEdit {
            range: Range { start_line: byte_to_line(content, start), end_line: byte_to_line(content, end), start_byte: start, end_byte: end },
            matched_text,
            kind,
        }))
    }

    fn context_matches(&self, content: &str, start: usize, end: usize, opts: &ResolveOptions) -> bool {
        if opts.context_before.is_none() && opts.context_after.is_none() {
            return true;
        }
        let before_ok = opts
            .context_before
            .as_ref()
            .map(|ctx| content.get(..start).is_some_and(|b| normalize_whitespace(b).ends_with(&normalize_whitespace(ctx))))
            .unwrap_or(true);
        let after_ok = opts
            .context_after
            .as_ref()
            .map(|ctx| content.get(end..).is_some_and(|a| normalize_whitespace(a).starts_with(&normalize_whitespace(ctx))))
            .unwrap_or(true);
        before_ok && after_ok
    }
}

pub fn sha256_hex(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_unique_exact_match() {
        let resolver = EditResolver::new(100 * 1024, 4);
        let content = "fn a() {}\nfn b() {}\n";
        let resolved = resolver.resolve(content, "fn b() {}", &ResolveOptions::default()).unwrap();
        assert_eq!(resolved.kind, MatchKind::Exact);
        assert_eq!(&content[resolved.range.start_byte..resolved.range.end_byte], "fn b() {}");
    }

    #[test]
    fn ambiguous_match_reports_conflicting_lines() {
        let resolver = EditResolver::new(100 * 1024, 4);
        let content = "x = 1;\nx = 1;\n";
        let err = resolver.resolve(content, "x = 1;", &ResolveOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::AmbiguousMatch);
        let suggestion = err.suggestion.unwrap();
        assert_eq!(suggestion.conflicting_lines.len(), 2);
        assert_eq!(suggestion.line_range, Some((1, 1)));
    }

    #[test]
    fn allow_ambiguous_auto_pick_selects_first_candidate() {
        let resolver = EditResolver::new(100 * 1024, 4);
        let content = "x = 1;\nx = 1;\n";
        let opts = ResolveOptions { allow_ambiguous_auto_pick: true, ..Default::default() };
        let resolved = resolver.resolve(content, "x = 1;", &opts).unwrap();
        assert_eq!(resolved.range.start_byte, 0);
    }

    #[test]
    fn crlf_target_matches_lf_content() {
        let resolver = EditResolver::new(100 * 1024, 4);
        let content = "fn a() {\n    1\n}\n";
        let resolved = resolver.resolve(content, "fn a() {\r\n    1\r\n}", &ResolveOptions::default()).unwrap();
        assert_eq!(resolved.kind, MatchKind::Exact);
        assert_eq!(&content[resolved.range.start_byte..resolved.range.end_byte], "fn a() {\n    1\n}");
    }

    #[test]
    fn structural_normalization_tolerates_quote_style() {
        let resolver = EditResolver::new(100 * 1024, 4);
        let content = "let s = \"hello\";\n";
        let opts = ResolveOptions { normalization: Normalization::Structural, ..Default::default() };
        let resolved = resolver.resolve(content, "let s = 'hello';", &opts).unwrap();
        assert_eq!(resolved.kind, MatchKind::Structural);
        assert_eq!(&content[resolved.range.start_byte..resolved.range.end_byte], "let s = \"hello\";");
    }

    #[test]
    fn no_match_returns_no_match_error() {
        let resolver = EditResolver::new(100 * 1024, 4);
        let err = resolver.resolve("fn a() {}", "totally absent", &ResolveOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoMatch);
    }

    #[test]
    fn hash_mismatch_detected_before_resolving() {
        let resolver = EditResolver::new(100 * 1024, 4);
        let opts = ResolveOptions { expected_content_hash: Some("deadbeef".to_string()), ..Default::default() };
        let err = resolver.resolve("fn a() {}", "fn a() {}", &opts).unwrap_err();
        assert_eq!(err.code, ErrorCode::HashMismatch);
    }

    #[test]
    fn context_disambiguates_duplicate_targets() {
        let resolver = EditResolver::new(100 * 1024, 4);
        let content = "// first\nx = 1;\n// second\nx = 1;\n";
        let opts = ResolveOptions { context_before: Some("// second".to_string()), ..Default::default() };
        let resolved = resolver.resolve(content, "x = 1;", &opts).unwrap();
        assert!(resolved.range.start_byte > content.find("// second").unwrap());
    }

    #[test]
    fn whitespace_insensitive_match_tolerates_reformatting() {
        let resolver = EditResolver::new(100 * 1024, 4);
        let content = "fn a(  x:  i32 ) { x }\n";
        let resolved = resolver.resolve(content, "fn a( x: i32 ) { x }", &ResolveOptions::default()).unwrap();
        assert_eq!(resolved.kind, MatchKind::Whitespace);
    }
}
