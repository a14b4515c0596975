//! MCP server implementation.
//!
//! The server handles the MCP protocol lifecycle:
//! 1. Initialize - exchange capabilities
//! 2. List and call tools, list and read resources
//! 3. Shutdown - on EOF, after in-flight calls have answered

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use devops_core::{Dispatcher, Error, ResourceProvider};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::protocol::{
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId,
    ResourceContents, ResourceReadParams, ResourceReadResult, ResourcesCapability,
    ResourcesListResult, ServerCapabilities, ServerInfo, ToolCallParams, ToolsCapability,
    ToolsListResult, MCP_VERSION,
};
use crate::transport::{IncomingMessage, MessageReader, MessageWriter};

/// MCP server over one dispatcher and an optional resource provider.
pub struct McpServer {
    name: String,
    dispatcher: Dispatcher,
    resources: Option<Arc<dyn ResourceProvider>>,
    initialized: AtomicBool,
}

impl McpServer {
    /// Create a new MCP server announcing itself as `name`.
    pub fn new(name: impl Into<String>, dispatcher: Dispatcher) -> Self {
        Self {
            name: name.into(),
            dispatcher,
            resources: None,
            initialized: AtomicBool::new(false),
        }
    }

    /// Expose resources from `provider`.
    pub fn with_resources(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.resources = Some(provider);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Serve on stdin/stdout until EOF.
    pub async fn run_stdio(self: Arc<Self>) -> io::Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC from `reader` to `writer` until EOF.
    ///
    /// `tools/call` and `resources/read` run in their own tasks, so their
    /// responses may be written out of order. All responses go through a
    /// single writer task.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tracing::info!(
            server = %self.name,
            tools = self.dispatcher.list_tools().len(),
            "Starting MCP server"
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let writer_task = tokio::spawn(async move {
            let mut writer = MessageWriter::new(writer);
            while let Some(response) = rx.recv().await {
                if let Err(e) = writer.write_response(&response).await {
                    tracing::error!("Failed to write response: {}", e);
                    return Err(e);
                }
            }
            Ok(())
        });

        let mut reader = MessageReader::new(reader);
        let read_result = loop {
            match reader.read_message().await {
                Ok(Some(IncomingMessage::Request(req))) if is_long_running(&req.method) => {
                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let response = server.handle_request(req).await;
                        let _ = tx.send(response);
                    });
                }
                Ok(Some(msg)) => {
                    if let Some(response) = self.handle_message(msg).await {
                        if tx.send(response).is_err() {
                            break Ok(());
                        }
                    }
                }
                Ok(None) => {
                    tracing::info!("EOF received, shutting down");
                    break Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    let response = JsonRpcResponse::error(
                        RequestId::Null,
                        JsonRpcError::parse_error(&e.to_string()),
                    );
                    if tx.send(response).is_err() {
                        break Ok(());
                    }
                }
                Err(e) => {
                    tracing::error!("Transport error: {}", e);
                    break Err(e);
                }
            }
        };

        // The writer drains once every in-flight task has dropped its sender.
        drop(tx);
        let write_result = writer_task
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        tracing::info!("MCP server stopped");
        read_result.and(write_result)
    }

    /// Handle an incoming message. Notifications get no response.
    pub async fn handle_message(&self, msg: IncomingMessage) -> Option<JsonRpcResponse> {
        match msg {
            IncomingMessage::Request(req) => Some(self.handle_request(req).await),
            IncomingMessage::Notification(notif) => {
                self.handle_notification(&notif.method);
                None
            }
        }
    }

    /// Handle a message received over a stateless transport.
    ///
    /// Each HTTP request may come from a different client, so `initialize`
    /// is answered every time instead of only once.
    pub async fn handle_stateless_message(&self, msg: IncomingMessage) -> Option<JsonRpcResponse> {
        match msg {
            IncomingMessage::Request(req) if req.method == "initialize" => {
                self.initialized.store(true, Ordering::SeqCst);
                Some(self.initialize_response(req.id, req.params))
            }
            msg => self.handle_message(msg).await,
        }
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        tracing::debug!("Handling request: {} (id: {:?})", req.method, req.id);

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req.id, req.params),
            "ping" => self.handle_ping(req.id),
            "tools/list" => self.handle_tools_list(req.id),
            "tools/call" => self.handle_tools_call(req.id, req.params).await,
            "resources/list" => self.handle_resources_list(req.id),
            "resources/read" => self.handle_resources_read(req.id, req.params).await,
            method => {
                tracing::warn!("Unknown method: {}", method);
                JsonRpcResponse::error(req.id, JsonRpcError::method_not_found(method))
            }
        }
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "initialized" | "notifications/initialized" => {
                tracing::info!("Client initialized");
            }
            "notifications/cancelled" => {
                tracing::debug!("Request cancelled by client");
            }
            _ => {
                tracing::debug!("Ignoring notification: {}", method);
            }
        }
    }

    fn handle_initialize(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request("Server already initialized"),
            );
        }
        self.initialize_response(id, params)
    }

    fn initialize_response(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        if let Some(params) = params {
            match serde_json::from_value::<InitializeParams>(params) {
                Ok(init_params) => {
                    tracing::info!(
                        "Client: {} v{} (protocol: {})",
                        init_params.client_info.name,
                        init_params.client_info.version,
                        init_params.protocol_version
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to parse initialize params: {}", e);
                }
            }
        }

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                resources: self.resources.as_ref().map(|_| ResourcesCapability {
                    subscribe: false,
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        JsonRpcResponse::from_result(id, &result)
    }

    fn handle_ping(&self, id: RequestId) -> JsonRpcResponse {
        JsonRpcResponse::success(id, serde_json::json!({}))
    }

    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.dispatcher.list_tools().to_vec(),
        };
        JsonRpcResponse::from_result(id, &result)
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match parse_params(params) {
            Ok(params) => params,
            Err(e) => return JsonRpcResponse::error(id, e),
        };

        let result = self
            .dispatcher
            .call_tool(&params.name, params.arguments)
            .await;
        JsonRpcResponse::from_result(id, &result)
    }

    fn handle_resources_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ResourcesListResult {
            resources: self
                .resources
                .as_ref()
                .map(|provider| provider.resources())
                .unwrap_or_default(),
        };
        JsonRpcResponse::from_result(id, &result)
    }

    async fn handle_resources_read(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: ResourceReadParams = match parse_params(params) {
            Ok(params) => params,
            Err(e) => return JsonRpcResponse::error(id, e),
        };

        let Some(provider) = &self.resources else {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_params(&format!("Unknown resource: {}", params.uri)),
            );
        };

        let mime_type = provider
            .resources()
            .into_iter()
            .find(|r| r.uri == params.uri)
            .and_then(|r| r.mime_type);

        match provider.read(&params.uri).await {
            Ok(text) => {
                let result = ResourceReadResult {
                    contents: vec![ResourceContents {
                        uri: params.uri,
                        mime_type,
                        text,
                    }],
                };
                JsonRpcResponse::from_result(id, &result)
            }
            Err(e @ Error::UnknownResource(_)) => {
                JsonRpcResponse::error(id, JsonRpcError::invalid_params(&e.to_string()))
            }
            Err(e) => {
                tracing::warn!(uri = %params.uri, "Resource read failed: {}", e);
                JsonRpcResponse::error(id, JsonRpcError::internal_error(&e.to_string()))
            }
        }
    }
}

/// Methods whose handlers do network or subprocess I/O.
fn is_long_running(method: &str) -> bool {
    matches!(method, "tools/call" | "resources/read")
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))
}
