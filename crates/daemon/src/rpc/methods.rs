use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use aide_common::protocol::jsonrpc::{
    is_supported_protocol_version, Request, RequestId, Response, RpcError, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, REGISTRY_ERROR, SUPPORTED_PROTOCOL_VERSIONS,
};
use aide_common::protocol::rpc_methods;
use aide_common::types::WorkspaceSettings;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::capability::GrantProvider;
use crate::error::{ErrorCode, RegistryError};
use crate::registry::{OpenOutcome, WorkspaceRegistry};
use crate::store::RecordPatch;

#[derive(Clone)]
pub struct RpcServerState {
    registry: Arc<WorkspaceRegistry>,
    shutdown_notifier: Option<broadcast::Sender<()>>,
}

impl RpcServerState {
    pub fn new(registry: Arc<WorkspaceRegistry>) -> Self {
        Self {
            registry,
            shutdown_notifier: None,
        }
    }

    pub fn with_shutdown_notifier(mut self, notifier: broadcast::Sender<()>) -> Self {
        self.shutdown_notifier = Some(notifier);
        self
    }

    pub fn registry(&self) -> &WorkspaceRegistry {
        &self.registry
    }
}

// ── Params ──────────────────────────────────────────────────────────

/// Grants answer the directory prompts a pass would show. An id with no
/// grant is reported back as pending with reason `aborted`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkspaceListParams {
    #[serde(default)]
    grants: BTreeMap<String, PathBuf>,
    #[serde(default)]
    denied: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkspaceCreateParams {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkspaceImportParams {
    #[serde(default)]
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkspaceOpenParams {
    workspace_id: String,
    #[serde(default)]
    grant: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkspaceUpdateParams {
    workspace_id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    settings: Option<WorkspaceSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkspaceIdParams {
    workspace_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilePathParams {
    workspace_id: String,
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileWriteParams {
    workspace_id: String,
    path: String,
    content: String,
}

// ── Dispatch ────────────────────────────────────────────────────────

pub async fn handle_raw_request(raw: &[u8], state: &RpcServerState) -> Response {
    let request = match serde_json::from_slice::<Request>(raw) {
        Ok(request) => request,
        Err(error) => {
            return Response::error(
                RequestId::Null,
                RpcError {
                    code: PARSE_ERROR,
                    message: "Parse error".to_string(),
                    data: Some(json!({ "reason": error.to_string() })),
                },
            );
        }
    };

    if request.jsonrpc != "2.0" {
        return Response::error(
            request.id,
            RpcError {
                code: INVALID_REQUEST,
                message: "Invalid Request".to_string(),
                data: None,
            },
        );
    }

    if let Some(version) = request.protocol_version.as_deref() {
        if !is_supported_protocol_version(version) {
            return Response::error(
                request.id,
                RpcError {
                    code: INVALID_REQUEST,
                    message: "Unsupported protocol version".to_string(),
                    data: Some(json!({
                        "requested": version,
                        "supported": SUPPORTED_PROTOCOL_VERSIONS,
                    })),
                },
            );
        }
    }

    dispatch_request(request, state).await
}

pub async fn dispatch_request(request: Request, state: &RpcServerState) -> Response {
    debug!(method = %request.method, "rpc request");
    match request.method.as_str() {
        rpc_methods::RPC_PING => Response::success(request.id, json!({ "ok": true })),
        rpc_methods::DAEMON_SHUTDOWN => {
            if let Some(notifier) = &state.shutdown_notifier {
                let _ = notifier.send(());
            }
            Response::success(request.id, json!({ "ok": true }))
        }
        rpc_methods::WORKSPACE_LIST => handle_workspace_list(request, state).await,
        rpc_methods::WORKSPACE_CREATE => handle_workspace_create(request, state).await,
        rpc_methods::WORKSPACE_IMPORT => handle_workspace_import(request, state).await,
        rpc_methods::WORKSPACE_OPEN => handle_workspace_open(request, state).await,
        rpc_methods::WORKSPACE_UPDATE => handle_workspace_update(request, state).await,
        rpc_methods::WORKSPACE_DELETE => handle_workspace_delete(request, state).await,
        rpc_methods::FILES_LIST => handle_files_list(request, state).await,
        rpc_methods::FILES_READ => handle_files_read(request, state).await,
        rpc_methods::FILES_WRITE => handle_files_write(request, state).await,
        rpc_methods::FILES_MKDIR => handle_files_mkdir(request, state).await,
        rpc_methods::FILES_DELETE => handle_files_delete(request, state).await,
        _ => Response::error(
            request.id,
            RpcError {
                code: METHOD_NOT_FOUND,
                message: "Method not found".to_string(),
                data: None,
            },
        ),
    }
}

// ── Workspace RPC handlers ──────────────────────────────────────────

async fn handle_workspace_list(request: Request, state: &RpcServerState) -> Response {
    let params: WorkspaceListParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let mut provider = GrantProvider::new();
    for (id, path) in params.grants {
        provider = provider.with_grant(id, path);
    }
    for id in params.denied {
        provider = provider.with_denial(id);
    }

    match state.registry.list_workspaces(&provider).await {
        Ok(listing) => Response::success(request.id, json!(listing)),
        Err(error) => registry_error_response(request.id, &error),
    }
}

async fn handle_workspace_create(request: Request, state: &RpcServerState) -> Response {
    let params: WorkspaceCreateParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    match state.registry.create_workspace(&params.name, params.description).await {
        Ok(record) => Response::success(request.id, json!({ "workspace": record })),
        Err(error) => registry_error_response(request.id, &error),
    }
}

async fn handle_workspace_import(request: Request, state: &RpcServerState) -> Response {
    let params: WorkspaceImportParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let provider = match params.path {
        Some(path) => GrantProvider::new().with_import(path),
        None => GrantProvider::new(),
    };

    match state.registry.import_workspace(&provider).await {
        Ok(registration) => Response::success(
            request.id,
            json!({ "workspace": registration.record, "created": registration.created }),
        ),
        Err(error) => registry_error_response(request.id, &error),
    }
}

async fn handle_workspace_open(request: Request, state: &RpcServerState) -> Response {
    let params: WorkspaceOpenParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let provider = match params.grant {
        Some(path) => GrantProvider::new().with_grant(params.workspace_id.clone(), path),
        None => GrantProvider::new(),
    };

    let result = match state.registry.open_workspace(&params.workspace_id, &provider).await {
        OpenOutcome::Opened { record, .. } => json!({ "status": "opened", "workspace": record }),
        OpenOutcome::Unresolved { reason } => {
            json!({ "status": "unresolved", "reason": reason, "workspace": Value::Null })
        }
        OpenOutcome::Removed { reason } => {
            json!({ "status": "removed", "reason": reason, "workspace": Value::Null })
        }
    };
    Response::success(request.id, result)
}

async fn handle_workspace_update(request: Request, state: &RpcServerState) -> Response {
    let params: WorkspaceUpdateParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let patch = RecordPatch {
        name: params.name,
        description: params.description,
        settings: params.settings,
    };
    if patch.is_empty() {
        return invalid_params_response(
            request.id,
            "workspace.update requires at least one of name, description, settings".to_string(),
        );
    }

    match state.registry.update_workspace(&params.workspace_id, patch).await {
        Ok(record) => Response::success(request.id, json!({ "workspace": record })),
        Err(error) => registry_error_response(request.id, &error),
    }
}

async fn handle_workspace_delete(request: Request, state: &RpcServerState) -> Response {
    let params: WorkspaceIdParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let existed = state.registry.delete_workspace(&params.workspace_id).await;
    Response::success(request.id, json!({ "ok": true, "existed": existed }))
}

// ── File RPC handlers ───────────────────────────────────────────────

async fn handle_files_list(request: Request, state: &RpcServerState) -> Response {
    let params: WorkspaceIdParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    match state.registry.list_files(&params.workspace_id).await {
        Ok(tree) => Response::success(request.id, json!({ "tree": tree })),
        Err(error) => registry_error_response(request.id, &error),
    }
}

async fn handle_files_read(request: Request, state: &RpcServerState) -> Response {
    let params: FilePathParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let bytes = match state.registry.read_file(&params.workspace_id, &params.path).await {
        Ok(bytes) => bytes,
        Err(error) => return registry_error_response(request.id, &error),
    };
    match String::from_utf8(bytes) {
        Ok(content) => Response::success(request.id, json!({ "content": content })),
        Err(_) => registry_error_response(
            request.id,
            &RegistryError::InvalidInput(format!("`{}` is not UTF-8 text", params.path)),
        ),
    }
}

async fn handle_files_write(request: Request, state: &RpcServerState) -> Response {
    let params: FileWriteParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    match state
        .registry
        .write_file(
            &params.workspace_id,
            &params.path,
            params.content.as_bytes(),
        )
        .await
    {
        Ok(()) => Response::success(
            request.id,
            json!({ "ok": true, "bytes_written": params.content.len() }),
        ),
        Err(error) => registry_error_response(request.id, &error),
    }
}

async fn handle_files_mkdir(request: Request, state: &RpcServerState) -> Response {
    let params: FilePathParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    match state.registry.mkdir(&params.workspace_id, &params.path).await {
        Ok(()) => Response::success(request.id, json!({ "ok": true })),
        Err(error) => registry_error_response(request.id, &error),
    }
}

async fn handle_files_delete(request: Request, state: &RpcServerState) -> Response {
    let params: FilePathParams = match parse_params(&request) {
        Ok(params) => params,
        Err(response) => return response,
    };

    match state.registry.delete_entry(&params.workspace_id, &params.path).await {
        Ok(()) => Response::success(request.id, json!({ "ok": true })),
        Err(error) => registry_error_response(request.id, &error),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Decode params; a missing `params` member decodes as `{}`.
fn parse_params<T: DeserializeOwned>(request: &Request) -> Result<T, Response> {
    let params = request.params.clone().unwrap_or_else(|| json!({}));
    serde_json::from_value(params).map_err(|error| {
        invalid_params_response(
            request.id.clone(),
            format!("failed to decode {} params: {error}", request.method),
        )
    })
}

fn invalid_params_response(request_id: RequestId, reason: String) -> Response {
    Response::error(
        request_id,
        RpcError {
            code: INVALID_PARAMS,
            message: "Invalid params".to_string(),
            data: Some(json!({ "reason": reason })),
        },
    )
}

/// Internal causes are logged here and never forwarded.
fn registry_error_response(request_id: RequestId, error: &RegistryError) -> Response {
    let code = error.code();
    if code == ErrorCode::InternalError {
        warn!(error = ?error, "registry operation failed");
    }
    let data = json!({ "code": code.as_str(), "action": error.user_action() });
    Response::error(
        request_id,
        RpcError {
            code: REGISTRY_ERROR,
            message: error.user_message(),
            data: Some(data),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryOptions;
    use tempfile::TempDir;

    fn state() -> (TempDir, RpcServerState) {
        let tmp = tempfile::tempdir().unwrap();
        let registry = WorkspaceRegistry::open(RegistryOptions::under(tmp.path())).unwrap();
        (tmp, RpcServerState::new(Arc::new(registry)))
    }

    async fn call(state: &RpcServerState, method: &str, params: Value) -> Response {
        let request = Request::new(method, Some(params), RequestId::Number(1));
        dispatch_request(request, state).await
    }

    async fn create(state: &RpcServerState, name: &str) -> String {
        let created = call(state, "workspace.create", json!({ "name": name })).await;
        let result = created.result.expect("create should succeed");
        result["workspace"]["id"].as_str().unwrap().to_string()
    }

    fn error_code(response: &Response) -> String {
        let error = response.error.as_ref().expect("error response expected");
        assert_eq!(error.code, REGISTRY_ERROR);
        let data = error.data.as_ref().unwrap();
        data["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn ping_and_unknown_method() {
        let (_tmp, state) = state();
        let ping = call(&state, "rpc.ping", json!({})).await;
        assert_eq!(ping.result, Some(json!({ "ok": true })));

        let unknown = call(&state, "doc.read", json!({})).await;
        assert_eq!(unknown.error.unwrap().code, METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_protocol_version_is_rejected() {
        let (_tmp, state) = state();
        let raw = json!({
            "jsonrpc": "2.0",
            "protocol_version": "aide-rpc.v0",
            "method": "rpc.ping",
            "id": 3
        })
        .to_string();
        let response = handle_raw_request(raw.as_bytes(), &state).await;
        assert_eq!(response.error.unwrap().code, INVALID_REQUEST);

        let garbage = handle_raw_request(b"{nope", &state).await;
        assert_eq!(garbage.id, RequestId::Null);
        assert_eq!(garbage.error.unwrap().code, PARSE_ERROR);
    }

    #[tokio::test]
    async fn daemon_shutdown_notifies_runtime_when_configured() {
        let (_tmp, state) = state();
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let state = state.with_shutdown_notifier(shutdown_tx);

        let request = Request::new("daemon.shutdown", None, RequestId::Number(4));
        let response = dispatch_request(request, &state).await;

        assert!(
            response.error.is_none(),
            "expected success response: {response:?}"
        );
        shutdown_rx
            .recv()
            .await
            .expect("shutdown notification should be sent");
    }

    #[tokio::test]
    async fn create_then_file_roundtrip() {
        let (_tmp, state) = state();
        let id = create(&state, "notes").await;

        let params = json!({ "workspace_id": id, "path": "docs/a.md", "content": "# A\n" });
        let write = call(&state, "files.write", params).await;
        assert_eq!(write.result.unwrap()["bytes_written"], 4);

        let params = json!({ "workspace_id": id, "path": "docs/a.md" });
        let read = call(&state, "files.read", params).await;
        assert_eq!(read.result.unwrap()["content"], "# A\n");

        let tree = call(&state, "files.list", json!({ "workspace_id": id })).await;
        let names: Vec<String> = tree.result.unwrap()["tree"]
            .as_array()
            .unwrap()
            .iter()
            .map(|node| node["name"].as_str().unwrap().to_string())
            .collect();
        assert!(names.contains(&"docs".to_string()));
        assert!(names.contains(&"README.md".to_string()));
    }

    #[tokio::test]
    async fn registry_errors_carry_code_and_action() {
        let (_tmp, state) = state();
        let params = json!({ "workspace_id": "ghost", "path": "a" });
        let missing = call(&state, "files.read", params).await;
        assert_eq!(error_code(&missing), "NOT_FOUND");
        assert!(missing.error.unwrap().data.unwrap()["action"].is_string());

        let aborted = call(&state, "workspace.import", json!({})).await;
        assert_eq!(error_code(&aborted), "ABORTED");

        let id = create(&state, "x").await;
        let params = json!({ "workspace_id": id, "path": "../x", "content": "" });
        let traversal = call(&state, "files.write", params).await;
        assert_eq!(error_code(&traversal), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn malformed_params_are_invalid_params() {
        let (_tmp, state) = state();
        let response = call(&state, "workspace.open", json!({ "id": "x" })).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, INVALID_PARAMS);
        let reason = error.data.unwrap()["reason"].as_str().unwrap().to_string();
        assert!(reason.contains("workspace.open"));

        let empty_update = call(&state, "workspace.update", json!({ "workspace_id": "x" })).await;
        assert_eq!(empty_update.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn open_missing_workspace_returns_null() {
        let (_tmp, state) = state();
        let response = call(&state, "workspace.open", json!({ "workspace_id": "ghost" })).await;
        let result = response.result.expect("open never fails");
        assert_eq!(result["workspace"], Value::Null);
        assert_eq!(result["status"], "removed");
        assert_eq!(result["reason"], "missing_record");
    }

    #[tokio::test]
    async fn delete_always_acknowledges() {
        let (_tmp, state) = state();
        let params = json!({ "workspace_id": "ghost" });
        let response = call(&state, "workspace.delete", params).await;
        assert_eq!(
            response.result,
            Some(json!({ "ok": true, "existed": false }))
        );
    }
}
