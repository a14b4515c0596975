//! HTTP adapter.
//!
//! Routes:
//! - `POST /mcp`, `POST /` - one JSON-RPC message per request body
//! - `GET /health` - liveness probe
//!
//! Every JSON-RPC response is returned with HTTP 200; tool failures are
//! reported inside the result like on stdio.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use crate::protocol::{JsonRpcError, JsonRpcResponse, RequestId};
use crate::server::McpServer;
use crate::transport::{parse_message, IncomingMessage};

/// Build the router for `server`.
pub fn router(server: Arc<McpServer>) -> Router {
    Router::new()
        .route("/mcp", post(handle_rpc))
        .route("/", post(handle_rpc))
        .route("/health", get(health))
        .with_state(server)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(server: Arc<McpServer>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        server = %server.name(),
        "Listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, router(server)).await
}

async fn health(State(server): State<Arc<McpServer>>) -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "service": server.name()}))
}

async fn handle_rpc(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    let line = String::from_utf8_lossy(&body);
    tracing::debug!("HTTP request: {}", line);

    match parse_message(line.trim()) {
        Ok(msg @ IncomingMessage::Request(_)) => match server.handle_stateless_message(msg).await {
            Some(response) => (StatusCode::OK, Json(response)).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        },
        Ok(msg @ IncomingMessage::Notification(_)) => {
            server.handle_stateless_message(msg).await;
            StatusCode::ACCEPTED.into_response()
        }
        Err(e) => {
            let response =
                JsonRpcResponse::error(RequestId::Null, JsonRpcError::parse_error(&e.to_string()));
            (StatusCode::OK, Json(response)).into_response()
        }
    }
}
