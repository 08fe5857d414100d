//! Search API and Edit API over `axum`: a `State<ApiState>` extractor,
//! `Json<...>` request/response bodies, `(StatusCode, Json<Value>)` error
//! tuples, built against `smartctx-core`'s `SearchEngine`/`EditCoordinator`.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use smartctx_core::edit::{EditCoordinator, EditRequest, Normalization, ResolveOptions, TargetEdit};
use smartctx_core::error::{CoreError, ErrorCode};
use smartctx_core::search::{SearchEngine, SearchOptions};
use smartctx_core::store::SymbolStore;
use smartctx_core::trigram::TrigramIndex;
use smartctx_core::vector::VectorIndexManager;
use smartctx_core::conventions::{self, ScannedFile};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Shared state handed to every route. Indexer's own stores are cloned
/// through `Arc` so handlers never take the indexer's internal locks
/// directly.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<SymbolStore>,
    pub trigram: Arc<TrigramIndex>,
    pub vector: Option<Arc<VectorIndexManager>>,
    pub file_sizes: Arc<RwLock<HashMap<String, u64>>>,
    pub edit: Arc<EditCoordinator>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/search", post(search_handler))
        .route("/api/edit", post(apply_edit_handler))
        .route("/api/edit/multi", post(apply_multi_edit_handler))
        .route("/api/edit/batch", post(apply_batch_handler))
        .route("/api/edit/undo", post(undo_handler))
        .route("/api/edit/redo", post(redo_handler))
        .route("/api/conventions", get(conventions_handler))
        .with_state(state)
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn error_response(err: &CoreError) -> ApiError {
    let status = match err.code {
        ErrorCode::AmbiguousMatch | ErrorCode::NoMatch | ErrorCode::LevenshteinBlocked | ErrorCode::HashMismatch => {
            StatusCode::CONFLICT
        }
        ErrorCode::SecurityViolation => StatusCode::FORBIDDEN,
        ErrorCode::NoUndoHistory | ErrorCode::NoRedoHistory => StatusCode::BAD_REQUEST,
        ErrorCode::BatchDryRunFailed | ErrorCode::BatchApplyFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = serde_json::json!({
        "error": err.code.as_str(),
        "message": err.message,
        "suggestion": err.suggestion.as_ref().map(|s| serde_json::json!({
            "line_range": s.line_range,
            "conflicting_lines": s.conflicting_lines,
            "message": s.message,
        })),
    });
    (status, Json(body))
}

// ---------------------------------------------------------------------------
// Search API
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SearchRequestBody {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default)]
    pub matches_per_file: Option<usize>,
    #[serde(default)]
    pub snippet_length: Option<usize>,
    #[serde(default)]
    pub group_by_file: Option<bool>,
    #[serde(default)]
    pub deduplicate_by_content: bool,
    #[serde(default)]
    pub case_sensitive: Option<bool>,
    #[serde(default)]
    pub smart_case: Option<bool>,
    #[serde(default)]
    pub word_boundary: bool,
}

fn default_limit() -> usize {
    50
}

impl From<&SearchRequestBody> for SearchOptions {
    fn from(b: &SearchRequestBody) -> Self {
        let defaults = SearchOptions::default();
        SearchOptions {
            limit: b.limit,
            include_globs: b.include_globs.clone(),
            exclude_globs: b.exclude_globs.clone(),
            file_types: b.file_types.clone(),
            matches_per_file: b.matches_per_file.unwrap_or(defaults.matches_per_file),
            snippet_length: b.snippet_length.unwrap_or(defaults.snippet_length),
            group_by_file: b.group_by_file.unwrap_or(defaults.group_by_file),
            deduplicate_by_content: b.deduplicate_by_content,
            case_sensitive: b.case_sensitive,
            smart_case: b.smart_case.unwrap_or(defaults.smart_case),
            word_boundary: b.word_boundary,
        }
    }
}

#[derive(Serialize)]
pub struct SearchResponseBody {
    pub hits: Vec<SearchHitBody>,
    pub degraded: bool,
}

#[derive(Serialize)]
pub struct SearchHitBody {
    pub path: String,
    pub score: f64,
    pub symbol_name: Option<String>,
    pub snippet: Option<String>,
}

pub async fn search_handler(State(state): State<ApiState>, Json(req): Json<SearchRequestBody>) -> impl IntoResponse {
    let sizes = state.file_sizes.read().unwrap();
    let engine = SearchEngine::new(&state.store, &state.trigram, state.vector.as_deref(), &sizes);
    let opts: SearchOptions = (&req).into();
    let response = engine.search_with_options(&req.query, &opts);
    Json(SearchResponseBody {
        hits: response
            .hits
            .into_iter()
            .map(|h| SearchHitBody { path: h.path, score: h.score, symbol_name: h.symbol_name, snippet: h.snippet })
            .collect(),
        degraded: response.degraded,
    })
}

// ---------------------------------------------------------------------------
// Edit API
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct EditRequestBody {
    pub file_path: String,
    pub target: String,
    pub replacement: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub context_before: Option<String>,
    #[serde(default)]
    pub context_after: Option<String>,
    #[serde(default)]
    pub expected_content_hash: Option<String>,
    /// `"literal"` (default) or `"structural"` — fold quote style when matching.
    #[serde(default)]
    pub normalization: Option<String>,
    #[serde(default)]
    pub allow_ambiguous_auto_pick: bool,
}

fn parse_normalization(s: Option<&str>) -> Normalization {
    match s {
        Some("structural") => Normalization::Structural,
        _ => Normalization::Literal,
    }
}

fn resolve_options(
    context_before: Option<String>,
    context_after: Option<String>,
    expected_content_hash: Option<String>,
    normalization: Option<String>,
    allow_ambiguous_auto_pick: bool,
) -> ResolveOptions {
    ResolveOptions {
        context_before,
        context_after,
        expected_content_hash,
        normalization: parse_normalization(normalization.as_deref()),
        allow_ambiguous_auto_pick,
    }
}

impl From<EditRequestBody> for EditRequest {
    fn from(b: EditRequestBody) -> Self {
        EditRequest {
            file_path: b.file_path,
            target: b.target,
            replacement: b.replacement,
            description: b.description,
            options: resolve_options(
                b.context_before,
                b.context_after,
                b.expected_content_hash,
                b.normalization,
                b.allow_ambiguous_auto_pick,
            ),
        }
    }
}

pub async fn apply_edit_handler(
    State(state): State<ApiState>,
    Json(req): Json<EditRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let op = state.edit.apply_edit(req.into()).map_err(|e| error_response(&e))?;
    Ok(Json(serde_json::to_value(&op).unwrap()))
}

#[derive(Deserialize)]
pub struct BatchEditRequestBody {
    pub edits: Vec<EditRequestBody>,
    #[serde(default)]
    pub description: String,
}

pub async fn apply_batch_handler(
    State(state): State<ApiState>,
    Json(req): Json<BatchEditRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let requests: Vec<EditRequest> = req.edits.into_iter().map(Into::into).collect();
    let batch = state.edit.apply_batch(requests, req.description).map_err(|e| error_response(&e))?;
    Ok(Json(serde_json::to_value(&batch).unwrap()))
}

// ---------------------------------------------------------------------------
// Multi-edit (several target/replacement pairs against one file, atomically)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TargetEditBody {
    pub target: String,
    pub replacement: String,
    #[serde(default)]
    pub context_before: Option<String>,
    #[serde(default)]
    pub context_after: Option<String>,
    #[serde(default)]
    pub expected_content_hash: Option<String>,
    #[serde(default)]
    pub normalization: Option<String>,
    #[serde(default)]
    pub allow_ambiguous_auto_pick: bool,
}

impl From<TargetEditBody> for TargetEdit {
    fn from(b: TargetEditBody) -> Self {
        TargetEdit {
            target: b.target,
            replacement: b.replacement,
            options: resolve_options(
                b.context_before,
                b.context_after,
                b.expected_content_hash,
                b.normalization,
                b.allow_ambiguous_auto_pick,
            ),
        }
    }
}

#[derive(Deserialize)]
pub struct MultiEditRequestBody {
    pub file_path: String,
    pub edits: Vec<TargetEditBody>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn apply_multi_edit_handler(
    State(state): State<ApiState>,
    Json(req): Json<MultiEditRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let edits: Vec<TargetEdit> = req.edits.into_iter().map(Into::into).collect();
    let op = state
        .edit
        .apply_multi_edit(req.file_path, edits, req.description, req.dry_run)
        .map_err(|e| error_response(&e))?;
    Ok(Json(serde_json::to_value(&op).unwrap()))
}

pub async fn undo_handler(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let entry = state.edit.undo().map_err(|e| error_response(&e))?;
    Ok(Json(serde_json::to_value(&entry).unwrap()))
}

pub async fn redo_handler(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let entry = state.edit.redo().map_err(|e| error_response(&e))?;
    Ok(Json(serde_json::to_value(&entry).unwrap()))
}

// ---------------------------------------------------------------------------
// Convention mining (supplemental, read-only)
// ---------------------------------------------------------------------------

pub async fn conventions_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let files: Vec<ScannedFile> = state
        .store
        .paths()
        .into_iter()
        .map(|p| ScannedFile { rel_path: p.clone(), abs_path: std::path::PathBuf::from(p) })
        .collect();
    let report = conventions::mine_conventions(&files);
    Json(serde_json::to_value(&report).unwrap())
}
