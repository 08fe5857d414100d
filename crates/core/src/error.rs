//! Opaque error codes surfaced to callers, plus the four error kinds from the
//! propagation policy: validation, resolution, transient I/O, fatal.

use std::fmt;

/// Stable error code surfaced across the Search API and Edit API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    AmbiguousMatch,
    NoMatch,
    HashMismatch,
    LevenshteinBlocked,
    BatchDryRunFailed,
    BatchApplyFailed,
    NoUndoHistory,
    NoRedoHistory,
    SecurityViolation,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AmbiguousMatch => "AMBIGUOUS_MATCH",
            Self::NoMatch => "NO_MATCH",
            Self::HashMismatch => "HASH_MISMATCH",
            Self::LevenshteinBlocked => "LEVENSHTEIN_BLOCKED",
            Self::BatchDryRunFailed => "BatchDryRunFailed",
            Self::BatchApplyFailed => "BatchApplyFailed",
            Self::NoUndoHistory => "NoUndoHistory",
            Self::NoRedoHistory => "NoRedoHistory",
            Self::SecurityViolation => "SecurityViolation",
            Self::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolution-kind error carries a suggestion payload the caller can act on
/// (a narrower line range, the conflicting line numbers, etc).
#[derive(Debug, Clone, Default)]
pub struct Suggestion {
    pub line_range: Option<(usize, usize)>,
    pub conflicting_lines: Vec<usize>,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CoreError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<Suggestion>,
}

impl CoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), suggestion: None }
    }

    pub fn with_suggestion(mut self, suggestion: Suggestion) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    pub fn with_suggestion_opt(mut self, suggestion: Option<Suggestion>) -> Self {
        self.suggestion = suggestion;
        self
    }

    pub fn security_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SecurityViolation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CoreError {}

pub type CoreResult<T> = Result<T, CoreError>;

/// Retry a transient I/O operation with exponential backoff, per the Error
/// Handling Design's "transient" kind. Gives up after `max_attempts` and
/// returns the last error.
pub fn retry_with_backoff<T, E>(
    max_attempts: u32,
    base_delay_ms: u64,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(e);
                }
                let delay = base_delay_ms * (1u64 << (attempt - 1).min(10));
                std::thread::sleep(std::time::Duration::from_millis(delay));
            }
        }
    }
}
