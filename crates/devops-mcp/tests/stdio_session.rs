//! End-to-end session over in-memory pipes.

use std::sync::Arc;
use std::time::Duration;

use devops_core::{Arguments, Dispatcher, Error, ToolDescriptor, ToolRegistry, ToolResult};
use devops_mcp::McpServer;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;

fn registry() -> ToolRegistry {
    ToolRegistry::builder()
        .register(
            ToolDescriptor::new(
                "slow",
                "Answers after a delay",
                json!({"type": "object", "properties": {"ms": {"type": "integer", "default": 200}}}),
            ),
            |args: Arguments| async move {
                let ms = args.require_i64("ms")?;
                tokio::time::sleep(Duration::from_millis(ms as u64)).await;
                Ok::<_, Error>(ToolResult::text("slow done"))
            },
        )
        .register(
            ToolDescriptor::new(
                "fast",
                "Answers immediately",
                json!({"type": "object", "properties": {}}),
            ),
            |_args: Arguments| async move { Ok::<_, Error>(ToolResult::text("fast done")) },
        )
        .build()
        .unwrap()
}

async fn run_session(input: &str) -> Vec<Value> {
    let server = Arc::new(McpServer::new("session-test", Dispatcher::new(registry())));
    let (mut client, server_side) = tokio::io::duplex(1 << 16);

    server.serve(input.as_bytes(), server_side).await.unwrap();

    let mut output = String::new();
    client.read_to_string(&mut output).await.unwrap();
    output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn by_id(responses: &[Value], id: i64) -> &Value {
    responses
        .iter()
        .find(|r| r["id"] == json!(id))
        .unwrap_or_else(|| panic!("no response with id {}", id))
}

#[tokio::test]
async fn full_session() {
    let input = [
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"it","version":"0"}}}"#,
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"fast","arguments":{}}}"#,
        r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"Fast"}}"#,
        "this is not json",
        r#"{"jsonrpc":"2.0","id":5,"method":"prompts/list"}"#,
        r#"{"jsonrpc":"2.0","id":6,"method":"initialize"}"#,
    ]
    .join("\n");

    let responses = run_session(&input).await;

    // One response per request plus the parse error; the notification is silent.
    assert_eq!(responses.len(), 7);

    assert_eq!(by_id(&responses, 1)["result"]["serverInfo"]["name"], "session-test");

    let tools = by_id(&responses, 2)["result"]["tools"].as_array().unwrap();
    let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["slow", "fast"]);
    assert!(tools[0]["inputSchema"].is_object());

    assert_eq!(by_id(&responses, 3)["result"]["content"][0]["text"], "fast done");

    let unknown = by_id(&responses, 4);
    assert!(unknown.get("error").is_none());
    assert!(unknown["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Fast"));

    let parse_error = responses
        .iter()
        .find(|r| r["id"].is_null())
        .expect("parse error response");
    assert_eq!(parse_error["error"]["code"], -32700);

    assert_eq!(by_id(&responses, 5)["error"]["code"], -32601);
    assert_eq!(by_id(&responses, 6)["error"]["code"], -32600);
}

#[tokio::test]
async fn calls_may_complete_out_of_order() {
    let input = [
        r#"{"jsonrpc":"2.0","id":10,"method":"tools/call","params":{"name":"slow","arguments":{"ms":300}}}"#,
        r#"{"jsonrpc":"2.0","id":11,"method":"tools/call","params":{"name":"fast"}}"#,
    ]
    .join("\n");

    let responses = run_session(&input).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 11);
    assert_eq!(responses[1]["id"], 10);
    assert_eq!(responses[1]["result"]["content"][0]["text"], "slow done");
}
