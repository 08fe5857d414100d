//! Streamable HTTP transport (MCP 2025-11-25): `POST /mcp` for JSON-RPC
//! request/response (single or batched), `DELETE /mcp` for session
//! termination, `GET /mcp` returns 405 (no server-push notifications).
//! Session id travels in the `Mcp-Session-Id` header; protocol version is
//! checked against what was negotiated at `initialize` via
//! `Mcp-Protocol-Version`.

use axum::{
    body::Body,
    extract::{FromRef, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::{dispatch_jsonrpc, negotiate_version, McpState};

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Static configuration for the HTTP transport's auth/origin middleware.
#[derive(Clone)]
pub struct McpHttpConfig {
    pub server_url: String,
    pub allowed_origins: Vec<String>,
    pub auth_issuer: Option<String>,
}

struct McpSession {
    protocol_version: String,
    last_activity: Instant,
}

#[derive(Clone)]
pub struct McpHttpState {
    pub mcp: McpState,
    pub config: McpHttpConfig,
    sessions: Arc<DashMap<String, McpSession>>,
}

impl McpHttpState {
    pub fn new(mcp: McpState, config: McpHttpConfig) -> Self {
        Self { mcp, config, sessions: Arc::new(DashMap::new()) }
    }
}

impl FromRef<McpHttpState> for McpState {
    fn from_ref(state: &McpHttpState) -> Self {
        state.mcp.clone()
    }
}

impl FromRef<McpHttpState> for McpHttpConfig {
    fn from_ref(state: &McpHttpState) -> Self {
        state.config.clone()
    }
}

pub fn router(state: McpHttpState) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp_post).delete(handle_mcp_delete).get(handle_mcp_get))
        .route("/.well-known/oauth-protected-resource/mcp", get(crate::auth::prm_endpoint))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), crate::auth::validate_origin))
        .with_state(state)
}

pub async fn handle_mcp_post(State(state): State<McpHttpState>, headers: HeaderMap, body: String) -> Result<Response, Response> {
    let parsed: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(_) => {
            let err = serde_json::json!({ "jsonrpc": "2.0", "id": null, "error": { "code": -32700, "message": "Parse error" } });
            return Ok(json_response(StatusCode::BAD_REQUEST, &err));
        }
    };

    let is_batch = parsed.is_array();
    let requests: Vec<Value> = if is_batch { parsed.as_array().unwrap().clone() } else { vec![parsed] };

    let has_initialize = requests.iter().any(|r| r["method"].as_str() == Some("initialize"));
    let session_id = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).map(String::from);

    if !has_initialize {
        match session_id.as_ref() {
            Some(s) if state.sessions.contains_key(s) => {}
            Some(_) => return Err(error_response(StatusCode::BAD_REQUEST, "Invalid or expired session ID")),
            None => return Err(error_response(StatusCode::BAD_REQUEST, "Missing Mcp-Session-Id header. Send 'initialize' first.")),
        }

        if let Some(pv) = headers.get(PROTOCOL_VERSION_HEADER).and_then(|v| v.to_str().ok()) {
            if let Some(session) = state.sessions.get(session_id.as_ref().unwrap()) {
                if pv != session.protocol_version {
                    return Err(error_response(
                        StatusCode::BAD_REQUEST,
                        &format!("Protocol version mismatch: header '{}' != negotiated '{}'", pv, session.protocol_version),
                    ));
                }
            }
        }
    }

    let mut responses = Vec::new();
    let mut new_session_id: Option<String> = None;

    for req in &requests {
        let method = req["method"].as_str().unwrap_or("");

        if method == "initialize" {
            let client_version = req["params"]["protocolVersion"].as_str().unwrap_or("");
            let negotiated = negotiate_version(client_version);
            let sid = Uuid::new_v4().to_string();
            state.sessions.insert(sid.clone(), McpSession { protocol_version: negotiated.to_string(), last_activity: Instant::now() });
            new_session_id = Some(sid);

            if let Some(resp) = dispatch_jsonrpc(&state.mcp, req) {
                responses.push(resp);
            }
        } else if method.starts_with("notifications/") {
            if let Some(ref sid) = session_id {
                if let Some(mut s) = state.sessions.get_mut(sid) {
                    s.last_activity = Instant::now();
                }
            }
        } else {
            if let Some(sid) = session_id.as_ref().or(new_session_id.as_ref()) {
                if let Some(mut s) = state.sessions.get_mut(sid) {
                    s.last_activity = Instant::now();
                }
            }
            if let Some(resp) = dispatch_jsonrpc(&state.mcp, req) {
                responses.push(resp);
            }
        }
    }

    if responses.is_empty() {
        return Ok(Response::builder().status(StatusCode::ACCEPTED).body(Body::empty()).unwrap());
    }

    let body_json = if is_batch { serde_json::to_string(&responses).unwrap() } else { serde_json::to_string(&responses[0]).unwrap() };

    let mut builder = Response::builder().status(StatusCode::OK).header("content-type", "application/json");
    if let Some(ref sid) = new_session_id {
        builder = builder.header(SESSION_HEADER, sid);
    }
    Ok(builder.body(Body::from(body_json)).unwrap())
}

pub async fn handle_mcp_delete(State(state): State<McpHttpState>, headers: HeaderMap) -> StatusCode {
    if let Some(sid) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
        state.sessions.remove(sid);
    }
    StatusCode::OK
}

pub async fn handle_mcp_get() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

fn json_response(status: StatusCode, body: &Value) -> Response {
    Response::builder().status(status).header("content-type", "application/json").body(Body::from(serde_json::to_string(body).unwrap())).unwrap()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({ "jsonrpc": "2.0", "id": null, "error": { "code": -32600, "message": message } });
    json_response(status, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartctx_core::edit::{EditCoordinator, EditResolver, Editor, History};
    use smartctx_core::fs::MemFs;
    use smartctx_core::store::SymbolStore;
    use smartctx_core::trigram::TrigramIndex;
    use std::collections::HashMap;
    use std::sync::RwLock;

    fn mcp_state() -> McpState {
        let fs = Arc::new(MemFs::new());
        let root = std::path::PathBuf::from("/proj");
        let store = Arc::new(SymbolStore::new());
        let trigram = Arc::new(TrigramIndex::new());
        let resolver = EditResolver::new(100 * 1024, 4);
        let editor = Editor::new(fs.clone(), root.join("backups"), 10);
        let history = History::new(fs.clone(), root.join("history.json"), 50);
        let edit = Arc::new(EditCoordinator::new(fs, root, resolver, editor, history));
        McpState { store, trigram, vector: None, file_sizes: Arc::new(RwLock::new(HashMap::new())), edit }
    }

    #[tokio::test]
    async fn post_without_initialize_requires_session_header() {
        let state = McpHttpState::new(
            mcp_state(),
            McpHttpConfig { server_url: "http://x".into(), allowed_origins: vec![], auth_issuer: None },
        );
        let body = serde_json::json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }).to_string();
        let response = handle_mcp_post(State(state), HeaderMap::new(), body).await;
        assert!(response.is_err());
        assert_eq!(response.unwrap_err().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn initialize_issues_session_id_header() {
        let state = McpHttpState::new(
            mcp_state(),
            McpHttpConfig { server_url: "http://x".into(), allowed_origins: vec![], auth_issuer: None },
        );
        let body = serde_json::json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": { "protocolVersion": "2025-11-25" }
        })
        .to_string();
        let response = handle_mcp_post(State(state), HeaderMap::new(), body).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SESSION_HEADER).is_some());
    }
}
