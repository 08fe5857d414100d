//! FZF v2 fuzzy matching with 64-bit bitmask pre-filter for O(1) candidate
//! rejection, and Smith-Waterman dynamic programming for scoring with
//! CamelCase, delimiter, and consecutive-character bonuses
//! (`fuzzy_score_v2`, `char_bitmask`, character-class bonus table). The
//! outer layer operates against plain file paths, the filename signal the
//! Search Engine blends in alongside symbol, trigram, and vector scores.

use rayon::prelude::*;
use std::time::Instant;

// ---------------------------------------------------------------------------
// Scoring constants (fzf v2)
// ---------------------------------------------------------------------------

const SCORE_MATCH: i32 = 16;
const SCORE_GAP_START: i32 = -3;
const SCORE_GAP_EXTENSION: i32 = -1;
const BONUS_BOUNDARY: i32 = 8;
const BONUS_CAMEL_CASE: i32 = 7;
const BONUS_CONSECUTIVE: i32 = 4;
const BONUS_FIRST_CHAR_MULTIPLIER: i32 = 2;
const BONUS_BOUNDARY_WHITE: i32 = 10;
const BONUS_BOUNDARY_DELIMITER: i32 = 9;

// ---------------------------------------------------------------------------
// Character classification
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq)]
enum CharClass {
    Lower,
    Upper,
    Digit,
    White,
    Delimiter,
    NonWord,
}

fn char_class(b: u8) -> CharClass {
    match b {
        b'a'..=b'z' => CharClass::Lower,
        b'A'..=b'Z' => CharClass::Upper,
        b'0'..=b'9' => CharClass::Digit,
        b' ' | b'\t' | b'\n' | b'\r' => CharClass::White,
        b'/' | b'_' | b'-' | b'.' | b':' | b';' | b'|' | b'>' => CharClass::Delimiter,
        _ => CharClass::NonWord,
    }
}

fn compute_bonus(prev: CharClass, curr: CharClass) -> i32 {
    match prev {
        CharClass::White => match curr {
            CharClass::White => 0,
            _ => BONUS_BOUNDARY_WHITE,
        },
        CharClass::Delimiter => match curr {
            CharClass::Delimiter => 0,
            _ => BONUS_BOUNDARY_DELIMITER,
        },
        CharClass::NonWord => match curr {
            CharClass::NonWord => 0,
            _ => BONUS_BOUNDARY,
        },
        CharClass::Lower => match curr {
            CharClass::Upper => BONUS_CAMEL_CASE,
            _ => 0,
        },
        CharClass::Digit => match curr {
            CharClass::Lower | CharClass::Upper => BONUS_BOUNDARY,
            _ => 0,
        },
        CharClass::Upper => 0,
    }
}

// ---------------------------------------------------------------------------
// Bitmask pre-filter
// ---------------------------------------------------------------------------

/// Compute a 64-bit character bitmask for O(1) rejection of non-matching
/// candidates. a-z -> bits 0-25, 0-9 -> bits 26-35, specials -> bits 36-39.
pub fn char_bitmask(s: &str) -> u64 {
    let mut mask: u64 = 0;
    for &b in s.as_bytes() {
        let idx = match b {
            b'a'..=b'z' => (b - b'a') as u32,
            b'A'..=b'Z' => (b.to_ascii_lowercase() - b'a') as u32,
            b'0'..=b'9' => (b - b'0') as u32 + 26,
            b'_' => 36,
            b'-' => 37,
            b'.' => 38,
            b'/' => 39,
            _ => continue,
        };
        mask |= 1u64 << idx;
    }
    mask
}

fn has_uppercase(s: &str) -> bool {
    s.bytes().any(|b| b.is_ascii_uppercase())
}

#[inline]
fn chars_match(text_byte: u8, pattern_byte: u8, case_sensitive: bool) -> bool {
    if case_sensitive {
        text_byte == pattern_byte
    } else {
        text_byte.eq_ignore_ascii_case(&pattern_byte)
    }
}

fn find_substring(text: &[u8], pattern: &[u8], case_sensitive: bool) -> Option<usize> {
    if pattern.is_empty() {
        return Some(0);
    }
    if pattern.len() > text.len() {
        return None;
    }
    'outer: for i in 0..=text.len() - pattern.len() {
        for (j, &pb) in pattern.iter().enumerate() {
            if !chars_match(text[i + j], pb, case_sensitive) {
                continue 'outer;
            }
        }
        return Some(i);
    }
    None
}

// ---------------------------------------------------------------------------
// Smith-Waterman DP fuzzy matcher (fzf v2 style)
// ---------------------------------------------------------------------------

pub fn fuzzy_score_v2(text: &str, pattern: &str, case_sensitive: bool) -> Option<(f64, Vec<usize>)> {
    if pattern.is_empty() {
        return Some((0.0, vec![]));
    }
    let tb = text.as_bytes();
    let pb = pattern.as_bytes();
    let m = pb.len();
    let n = tb.len();
    if m > n {
        return None;
    }

    // Subsequence check + bounds narrowing (left-to-right)
    let mut pi = 0;
    let mut end_bound = 0;
    for (i, &b) in tb.iter().enumerate() {
        if pi < m && chars_match(b, pb[pi], case_sensitive) {
            pi += 1;
            end_bound = i;
        }
    }
    if pi < m {
        return None;
    }

    // Tighten from right-to-left
    pi = m;
    let mut start_bound = end_bound;
    for i in (0..=end_bound).rev() {
        if pi > 0 && chars_match(tb[i], pb[pi - 1], case_sensitive) {
            pi -= 1;
            start_bound = i;
        }
    }

    let w = end_bound - start_bound + 1;

    // Bonus array for the window
    let mut bonus = vec![0i32; w];
    for (j, slot) in bonus.iter_mut().enumerate() {
        let pos = start_bound + j;
        let prev_class = if pos == 0 { CharClass::White } else { char_class(tb[pos - 1]) };
        *slot = compute_bonus(prev_class, char_class(tb[pos]));
    }

    // Fast path: exact substring match
    if let Some(sub_pos) = find_substring(&tb[start_bound..=end_bound], pb, case_sensitive) {
        let abs_pos = start_bound + sub_pos;
        let mut score = SCORE_MATCH * m as i32;
        let first_bonus = if abs_pos == 0 {
            compute_bonus(CharClass::White, char_class(tb[0]))
        } else {
            compute_bonus(char_class(tb[abs_pos - 1]), char_class(tb[abs_pos]))
        };
        score += first_bonus * BONUS_FIRST_CHAR_MULTIPLIER;
        for k in 1..m {
            let b = if abs_pos + k < start_bound + w { bonus[abs_pos + k - start_bound] } else { 0 };
            score += std::cmp::max(b, BONUS_CONSECUTIVE);
        }
        let indices: Vec<usize> = (abs_pos..abs_pos + m).collect();
        return Some((score as f64, indices));
    }

    // DP matrices
    let mut h = vec![i32::MIN / 2; m * w];
    let mut c = vec![0u16; m * w];
    let mut dir = vec![false; m * w];

    for i in 0..m {
        let mut in_gap = false;
        for j in 0..w {
            let pos = start_bound + j;
            let idx = i * w + j;

            if chars_match(tb[pos], pb[i], case_sensitive) {
                let mut score = SCORE_MATCH;
                let b = bonus[j];
                let prev_consec = if i > 0 && j > 0 { c[(i - 1) * w + (j - 1)] } else { 0 };

                if prev_consec > 0 {
                    score += std::cmp::max(b, BONUS_CONSECUTIVE);
                } else {
                    score += b;
                }

                if i == 0 {
                    score += b * (BONUS_FIRST_CHAR_MULTIPLIER - 1);
                }

                let diag =
                    if i > 0 && j > 0 { h[(i - 1) * w + (j - 1)] } else if i == 0 { 0 } else { i32::MIN / 2 };

                let left =
                    if j > 0 { h[idx - 1] + if in_gap { SCORE_GAP_EXTENSION } else { SCORE_GAP_START } } else { i32::MIN / 2 };

                let match_score = diag.saturating_add(score);

                if match_score >= left {
                    h[idx] = match_score;
                    c[idx] = prev_consec + 1;
                    dir[idx] = true;
                } else {
                    h[idx] = left;
                    c[idx] = 0;
                    dir[idx] = false;
                }
                in_gap = false;
            } else {
                h[idx] = if j > 0 { h[idx - 1] + if in_gap { SCORE_GAP_EXTENSION } else { SCORE_GAP_START } } else { i32::MIN / 2 };
                c[idx] = 0;
                dir[idx] = false;
                in_gap = true;
            }
        }
    }

    // Find best end position in last row
    let last_row = (m - 1) * w;
    let mut best_score = i32::MIN;
    let mut best_j = 0;
    for j in 0..w {
        if h[last_row + j] > best_score {
            best_score = h[last_row + j];
            best_j = j;
        }
    }

    if best_score <= 0 {
        return None;
    }

    // Traceback
    let mut indices = Vec::with_capacity(m);
    let mut i = m - 1;
    let mut j = best_j;
    loop {
        let idx = i * w + j;
        if dir[idx] {
            indices.push(start_bound + j);
            if i == 0 {
                break;
            }
            i -= 1;
            j -= 1;
        } else {
            if j == 0 {
                break;
            }
            j -= 1;
        }
    }
    indices.reverse();

    if indices.len() != m {
        return None;
    }

    Some((best_score as f64, indices))
}

// ---------------------------------------------------------------------------
// Filename search over indexed paths
// ---------------------------------------------------------------------------

struct TokenInfo {
    lower: String,
    case_sensitive: bool,
    mask: u64,
}

/// A scored path match, with match position indices into the filename.
#[derive(Debug, Clone)]
pub struct FilenameMatch {
    pub path: String,
    pub score: f64,
    pub filename_indices: Vec<usize>,
}

struct IndexedPath<'a> {
    path: &'a str,
    path_lower: String,
    filename: &'a str,
    filename_lower: String,
    filename_mask: u64,
    path_mask: u64,
}

fn filename_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn score_path(entry: &IndexedPath<'_>, tokens: &[TokenInfo]) -> Option<FilenameMatch> {
    let mut total_score = 0.0;
    let mut filename_indices = Vec::new();

    for token in tokens {
        let pattern = &token.lower;

        let fname_text = if token.case_sensitive { entry.filename } else { entry.filename_lower.as_str() };
        let fname_passes = (token.mask & entry.filename_mask) == token.mask;
        if fname_passes {
            let stem = entry.filename_lower.rsplit_once('.').map(|(s, _)| s).unwrap_or(&entry.filename_lower);
            if pattern == stem || pattern == &entry.filename_lower {
                total_score += 10000.0;
                filename_indices.extend(0..entry.filename.len());
                continue;
            }
            if stem.starts_with(pattern.as_str()) && pattern.len() >= 3 {
                total_score += 5000.0 + (pattern.len() as f64 / stem.len() as f64) * 1000.0;
                filename_indices.extend(0..pattern.len());
                continue;
            }
            if let Some((score, indices)) = fuzzy_score_v2(fname_text, pattern, token.case_sensitive) {
                total_score += score * 2.0;
                filename_indices.extend(indices);
                continue;
            }
        }

        let path_text = if token.case_sensitive { entry.path } else { entry.path_lower.as_str() };
        let path_passes = (token.mask & entry.path_mask) == token.mask;
        if path_passes {
            if let Some((score, _)) = fuzzy_score_v2(path_text, pattern, token.case_sensitive) {
                total_score += score;
                continue;
            }
        }

        return None;
    }

    Some(FilenameMatch { path: entry.path.to_string(), score: total_score, filename_indices })
}

/// Rank `paths` against `query`, returning at most `limit` matches sorted by
/// descending score. Scores here are the raw fzf-style values (not yet
/// normalized to `[0, 1]`) — the search engine normalizes per-signal before
/// blending.
pub fn search_filenames(paths: &[String], query: &str, limit: usize) -> Vec<FilenameMatch> {
    let trimmed = preprocess_search_query(query.trim());
    if trimmed.is_empty() {
        return Vec::new();
    }

    let tokens: Vec<TokenInfo> = trimmed
        .split_whitespace()
        .map(|t| {
            let case_sensitive = has_uppercase(t);
            let lower = t.to_lowercase();
            let mask = char_bitmask(&lower);
            TokenInfo { lower, case_sensitive, mask }
        })
        .collect();

    let entries: Vec<IndexedPath<'_>> = paths
        .iter()
        .map(|path| {
            let filename = filename_of(path);
            IndexedPath {
                path,
                path_lower: path.to_lowercase(),
                filename,
                filename_lower: filename.to_lowercase(),
                filename_mask: char_bitmask(&filename.to_lowercase()),
                path_mask: char_bitmask(&path.to_lowercase()),
            }
        })
        .collect();

    let mut results: Vec<FilenameMatch> = entries.par_iter().filter_map(|e| score_path(e, &tokens)).collect();

    if results.len() > limit {
        results.select_nth_unstable_by(limit, |a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
    }
    results.sort_unstable_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results
}

/// Measures elapsed wall-clock time for a search call, for the `degraded`
/// flag's timeout bookkeeping in `search.rs`.
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, std::time::Duration) {
    let start = Instant::now();
    let result = f();
    (result, start.elapsed())
}

// ---------------------------------------------------------------------------
// Query preprocessing
// ---------------------------------------------------------------------------

const KNOWN_EXTS: &[&str] = &[
    "h", "hpp", "hxx", "cpp", "cxx", "cc", "c", "cs", "py", "rb", "lua", "ini", "cfg", "conf", "toml", "yaml", "yml",
    "json", "xml", "js", "ts", "jsx", "tsx", "mjs", "cjs", "rs", "go", "java", "kt", "scala", "swift", "css", "scss",
    "less", "sass", "html", "htm", "vue", "svelte", "sh", "bash", "zsh", "ps1", "bat", "cmd", "md", "rst", "txt",
];

/// Strip known file extensions from search tokens so fuzzy search matches
/// the stem — e.g. `"parser.rs"` becomes `"parser"`.
pub fn preprocess_search_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|token| {
            if let Some((stem, ext)) = token.rsplit_once('.') {
                if KNOWN_EXTS.contains(&ext) && !stem.is_empty() {
                    return stem;
                }
            }
            token
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_filename_match_scores_highest() {
        let paths = vec!["src/api.rs".to_string()];
        let results = search_filenames(&paths, "api", 10);
        assert_eq!(results.len(), 1);
        assert!(results[0].score >= 10000.0);
    }

    #[test]
    fn prefix_match_scores_higher_than_substring() {
        let paths = vec!["src/Actor.h".to_string(), "src/MyActorComponent.h".to_string()];
        let results = search_filenames(&paths, "actor", 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].path, "src/Actor.h");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn camelcase_boundary_bonus() {
        let score = fuzzy_score_v2("SearchModule", "SM", true);
        assert!(score.is_some());
        assert!(score.unwrap().0 > 0.0);
    }

    #[test]
    fn non_matching_returns_none() {
        assert!(fuzzy_score_v2("hello", "xyz", false).is_none());
    }

    #[test]
    fn empty_query_returns_empty_results() {
        let paths = vec!["a.rs".to_string()];
        assert!(search_filenames(&paths, "", 10).is_empty());
    }
}
