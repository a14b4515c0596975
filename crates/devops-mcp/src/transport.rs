//! Transport layer for MCP JSON-RPC communication.
//!
//! MCP uses newline-delimited JSON over stdin/stdout. Reading and writing
//! are split so responses can be written from a separate task while the
//! reader keeps accepting requests.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Message that can be received from the client.
#[derive(Debug)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

/// Reads newline-delimited JSON-RPC messages.
pub struct MessageReader<R> {
    reader: R,
    line: String,
}

impl<R: AsyncBufRead + Unpin> MessageReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }

    /// Read the next message; `Ok(None)` on EOF. Blank lines are skipped.
    ///
    /// A line that is not a JSON-RPC message yields an
    /// [`io::ErrorKind::InvalidData`] error; the stream stays usable.
    pub async fn read_message(&mut self) -> io::Result<Option<IncomingMessage>> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }

            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }

            tracing::debug!("Received: {}", line);
            return parse_message(line).map(Some);
        }
    }
}

/// Parse one JSON-RPC message. Requests carry an `id`, notifications do not.
pub fn parse_message(line: &str) -> io::Result<IncomingMessage> {
    if let Ok(request) = serde_json::from_str::<JsonRpcRequest>(line) {
        return Ok(IncomingMessage::Request(request));
    }

    if let Ok(notification) = serde_json::from_str::<JsonRpcNotification>(line) {
        return Ok(IncomingMessage::Notification(notification));
    }

    tracing::warn!("Failed to parse message: {}", line);
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("Invalid JSON-RPC message: {}", line),
    ))
}

/// Writes JSON-RPC responses, one per line.
pub struct MessageWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let mut json = serde_json::to_string(response).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("Serialization error: {}", e))
        })?;

        tracing::debug!("Sending: {}", json);

        json.push('\n');
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestId;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_read_request_and_notification() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/list","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n"
        );
        let mut reader = MessageReader::new(input.as_bytes());

        match reader.read_message().await.unwrap() {
            Some(IncomingMessage::Request(req)) => {
                assert_eq!(req.method, "tools/list");
                assert_eq!(req.id, RequestId::Number(1));
            }
            other => panic!("Expected request, got {:?}", other),
        }

        match reader.read_message().await.unwrap() {
            Some(IncomingMessage::Notification(notif)) => {
                assert_eq!(notif.method, "notifications/initialized");
            }
            other => panic!("Expected notification, got {:?}", other),
        }

        assert!(reader.read_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let input = "\n   \n{\"jsonrpc\":\"2.0\",\"id\":\"a\",\"method\":\"ping\"}\n";
        let mut reader = MessageReader::new(input.as_bytes());

        let msg = reader.read_message().await.unwrap();
        assert!(matches!(msg, Some(IncomingMessage::Request(_))));
    }

    #[tokio::test]
    async fn test_malformed_line_then_recover() {
        let input = "not json\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n";
        let mut reader = MessageReader::new(input.as_bytes());

        let err = reader.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let msg = reader.read_message().await.unwrap();
        assert!(matches!(msg, Some(IncomingMessage::Request(_))));
    }

    #[tokio::test]
    async fn test_write_response_is_one_line() {
        let (client, server) = tokio::io::duplex(4096);
        let mut writer = MessageWriter::new(server);

        let response =
            JsonRpcResponse::success(RequestId::Number(1), serde_json::json!({"test": true}));
        writer.write_response(&response).await.unwrap();
        drop(writer);

        let mut output = String::new();
        let mut client = client;
        client.read_to_string(&mut output).await.unwrap();

        assert!(output.ends_with('\n'));
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("\"jsonrpc\":\"2.0\""));
        assert!(output.contains("\"id\":1"));
    }
}
