//! MCP server over line-delimited stdio.
//!
//! Each line on the input stream is one JSON-RPC message. `tools/call`
//! requests run concurrently, one task per request; every response is funnelled
//! through a single writer task so output lines never interleave.

use crate::error::{ServerError, ToolError};
use crate::protocol::{
    negotiate_protocol_version, CallToolParams, CallToolResult, CancelledParams,
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::tools::{Arguments, Tool, ToolRegistry};
use serde_json::Value;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const SERVER_NAME: &str = "pinner-mcp";

pub const DEFAULT_INSTRUCTIONS: &str = "This is a Model Context Protocol (MCP) server that can \
    help pin GitHub Actions to a specific commit hash.";

/// Responses buffered between request tasks and the writer.
const RESPONSE_BUFFER: usize = 64;

/// What the read loop does with one incoming line.
enum Route {
    Reply(JsonRpcResponse),
    Call(PendingCall),
    Silent,
}

struct PendingCall {
    id: Value,
    name: String,
    tool: Arc<dyn Tool>,
    arguments: Arguments,
    token: CancellationToken,
}

/// MCP host serving the tools of a [`ToolRegistry`].
#[derive(Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    instructions: Option<Arc<str>>,
    in_flight: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            instructions: Some(Arc::from(DEFAULT_INSTRUCTIONS)),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace the text sent to clients in the `initialize` result.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(Arc::from(instructions.into()));
        self
    }

    /// Serve on the process's stdin and stdout until stdin closes.
    pub async fn serve(&self) -> Result<(), ServerError> {
        self.serve_with(tokio::io::stdin(), tokio::io::stdout())
            .await
    }

    /// Serve on an arbitrary stream pair until `reader` reaches EOF.
    ///
    /// Calls still running at EOF are awaited and their responses written
    /// before this returns.
    pub async fn serve_with<R, W>(&self, reader: R, writer: W) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let mut lines = BufReader::new(reader).lines();
        let mut calls = JoinSet::new();

        tracing::info!(tools = self.registry.len(), "MCP server ready, listening on stdio");

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tracing::debug!(len = line.len(), "Received message");

            while let Some(finished) = calls.try_join_next() {
                log_task_outcome(finished);
            }

            match self.route(line).await {
                Route::Reply(response) => {
                    if tx.send(response).await.is_err() {
                        return Err(writer_failure(writer_task).await);
                    }
                }
                Route::Call(call) => {
                    let server = self.clone();
                    let tx = tx.clone();
                    calls.spawn(async move {
                        if let Some(response) = server.run_call(call).await {
                            // The writer only goes away on a fatal error, which the read loop reports.
                            let _ = tx.send(response).await;
                        }
                    });
                }
                Route::Silent => {}
            }
        }

        tracing::info!(pending = calls.len(), "Input closed, draining in-flight calls");
        while let Some(finished) = calls.join_next().await {
            log_task_outcome(finished);
        }

        drop(tx);
        writer_task.await??;
        tracing::info!("MCP server stopped");
        Ok(())
    }

    /// Handle one message to completion, including any tool call.
    ///
    /// Returns `None` for notifications and cancelled calls.
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        match self.route(line).await {
            Route::Reply(response) => Some(response),
            Route::Call(call) => self.run_call(call).await,
            Route::Silent => None,
        }
    }

    async fn route(&self, line: &str) -> Route {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed JSON-RPC message");
                return Route::Reply(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()));
            }
        };

        let request: JsonRpcRequest = match serde_json::from_value(value.clone()) {
            Ok(request) => request,
            Err(_) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                return Route::Reply(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
            }
        };

        if request.jsonrpc != "2.0" {
            let id = request.id.unwrap_or(Value::Null);
            return Route::Reply(JsonRpcResponse::error(id, JsonRpcError::invalid_request()));
        }

        let Some(id) = request.id else {
            self.handle_notification(&request.method, request.params).await;
            return Route::Silent;
        };

        tracing::debug!(method = %request.method, %id, "Handling request");

        match request.method.as_str() {
            "initialize" => Route::Reply(self.initialize(id, request.params)),
            "ping" => Route::Reply(JsonRpcResponse::success(id, serde_json::json!({}))),
            "tools/list" => {
                let result = ListToolsResult {
                    tools: self.registry.list_schemas(),
                };
                Route::Reply(JsonRpcResponse::from_result(id, &result))
            }
            "tools/call" => self.prepare_call(id, request.params).await,
            method => {
                tracing::debug!(%method, "Unknown method");
                Route::Reply(JsonRpcResponse::error(id, JsonRpcError::method_not_found(method)))
            }
        }
    }

    fn initialize(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: InitializeParams = match params {
            None => InitializeParams::default(),
            Some(params) => match serde_json::from_value(params) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)),
                    )
                }
            },
        };

        let protocol_version = negotiate_protocol_version(&params.protocol_version);
        match &params.client_info {
            Some(client) => tracing::info!(
                client = %client.name,
                client_version = %client.version,
                requested = %params.protocol_version,
                %protocol_version,
                "Client initialized"
            ),
            None => tracing::info!(%protocol_version, "Client initialized"),
        }

        let result = InitializeResult {
            protocol_version: protocol_version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                logging: None,
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: self.instructions.as_deref().map(str::to_string),
        };
        JsonRpcResponse::from_result(id, &result)
    }

    async fn handle_notification(&self, method: &str, params: Option<Value>) {
        match method {
            "notifications/initialized" => tracing::debug!("Client finished initialization"),
            "notifications/cancelled" => {
                let Some(params) = params
                    .and_then(|p| serde_json::from_value::<CancelledParams>(p).ok())
                else {
                    tracing::warn!("Ignoring cancellation without a requestId");
                    return;
                };
                let key = params.request_id.to_string();
                match self.in_flight.lock().await.get(&key) {
                    Some(token) => {
                        tracing::info!(
                            request_id = %key,
                            reason = params.reason.as_deref().unwrap_or(""),
                            "Cancelling tool call"
                        );
                        token.cancel();
                    }
                    None => tracing::debug!(request_id = %key, "Cancellation for unknown request"),
                }
            }
            other => tracing::debug!(method = %other, "Ignoring notification"),
        }
    }

    /// Validate a `tools/call` and register it as in flight.
    async fn prepare_call(&self, id: Value, params: Option<Value>) -> Route {
        let params: CallToolParams = match params.map(serde_json::from_value::<CallToolParams>) {
            Some(Ok(params)) => params,
            Some(Err(e)) => {
                return Route::Reply(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid tools/call params: {}", e)),
                ))
            }
            None => {
                return Route::Reply(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params("Missing tools/call params"),
                ))
            }
        };

        let Some(tool) = self.registry.get(&params.name) else {
            return Route::Reply(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params(format!("Unknown tool: {}", params.name)),
            ));
        };

        let arguments = match Arguments::from_value(params.arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                return Route::Reply(JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(e.to_string()),
                ))
            }
        };

        // Registered before the call task starts so a cancellation that
        // arrives right behind the request still finds it.
        let token = CancellationToken::new();
        match self.in_flight.lock().await.entry(id.to_string()) {
            Entry::Occupied(_) => {
                tracing::warn!(%id, "Rejecting call that reuses an in-flight request id");
                let mut error = JsonRpcError::invalid_request();
                error.message = format!("Request id {} is already in flight", id);
                return Route::Reply(JsonRpcResponse::error(id, error));
            }
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
            }
        }

        Route::Call(PendingCall {
            id,
            name: params.name,
            tool,
            arguments,
            token,
        })
    }

    async fn run_call(&self, call: PendingCall) -> Option<JsonRpcResponse> {
        let PendingCall {
            id,
            name,
            tool,
            arguments,
            token,
        } = call;

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(ToolError::Cancelled),
            result = tool.execute(arguments) => result,
        };

        self.in_flight.lock().await.remove(&id.to_string());

        let result = match outcome {
            Ok(result) => {
                tracing::info!(tool = %name, %id, "Tool call succeeded");
                result
            }
            Err(ToolError::Cancelled) => {
                tracing::info!(tool = %name, %id, "Tool call cancelled");
                return None;
            }
            Err(e) => {
                tracing::warn!(tool = %name, %id, error = %e, "Tool call failed");
                CallToolResult::error(e.to_string())
            }
        };

        Some(JsonRpcResponse::from_result(id, &result))
    }
}

async fn write_responses<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<JsonRpcResponse>,
) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_vec(&response)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}

async fn writer_failure(
    writer_task: tokio::task::JoinHandle<Result<(), ServerError>>,
) -> ServerError {
    match writer_task.await {
        Ok(Err(e)) => e,
        Ok(Ok(())) => ServerError::WriterClosed,
        Err(e) => ServerError::Task(e),
    }
}

fn log_task_outcome(outcome: Result<(), tokio::task::JoinError>) {
    if let Err(e) = outcome {
        tracing::error!(error = %e, "Tool call task panicked");
    }
}
