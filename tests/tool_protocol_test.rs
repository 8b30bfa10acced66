mod common;

use retail_insights::{
    tools::{ToolServer, PROTOCOL_VERSION},
    AppState,
};
use serde_json::{json, Value};
use tokio::io::BufReader;

async fn server() -> ToolServer {
    let state = AppState::new(common::test_config(), common::seeded_provider().await, None);
    ToolServer::from_state(&state)
}

fn content_json(reply: &Value) -> Value {
    let text = reply["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    serde_json::from_str(text).expect("content text is JSON")
}

#[tokio::test]
async fn initialize_reports_protocol_version() {
    let reply = server()
        .await
        .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
        .await
        .expect("reply");

    assert_eq!(reply["id"], 1);
    assert_eq!(reply["result"]["protocolVersion"], PROTOCOL_VERSION);
    assert_eq!(reply["result"]["serverInfo"]["name"], "retail-insights");
}

#[tokio::test]
async fn lists_every_tool() {
    let reply = server()
        .await
        .handle_line(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
        .await
        .expect("reply");

    assert_eq!(reply["jsonrpc"], "2.0");
    assert_eq!(reply["id"], "a");
    let tools = reply["result"]["tools"].as_array().expect("tools");
    assert_eq!(tools.len(), 10);
    assert!(tools.iter().any(|t| t["name"] == "get_top_skus"));
}

#[tokio::test]
async fn tool_call_returns_rows_as_text() {
    let request = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/call",
        "params": {
            "name": "get_sales_by_sku",
            "arguments": { "sku_id": 3 }
        }
    });
    let reply = server()
        .await
        .handle_line(&request.to_string())
        .await
        .expect("reply");

    assert_eq!(reply["result"]["content"][0]["type"], "text");
    assert!(reply["result"].get("isError").is_none());
    let rows = content_json(&reply);
    assert_eq!(rows[0]["sku_name"], "Chips");
    assert_eq!(rows[0]["total_quantity"], 3);
}

#[tokio::test]
async fn tool_errors_are_flagged_in_content() {
    let server = server().await;

    let unknown = json!({
        "jsonrpc": "2.0", "id": 3, "method": "tools/call",
        "params": { "name": "drop_tables", "arguments": {} }
    });
    let reply = server.handle_line(&unknown.to_string()).await.expect("reply");
    assert_eq!(reply["result"]["isError"], true);
    assert_eq!(content_json(&reply)["error"], "Unknown tool: drop_tables");

    let bad_period = json!({
        "jsonrpc": "2.0", "id": 4, "method": "tools/call",
        "params": { "name": "get_sales_by_time_period", "arguments": { "period": "yearly" } }
    });
    let reply = server
        .handle_line(&bad_period.to_string())
        .await
        .expect("reply");
    assert_eq!(reply["result"]["isError"], true);
}

#[tokio::test]
async fn unknown_method_echoes_id() {
    let reply = server()
        .await
        .handle_line(r#"{"jsonrpc":"2.0","id":9,"method":"resources/list"}"#)
        .await
        .expect("reply");

    assert_eq!(reply["id"], 9);
    assert_eq!(reply["error"], "Unknown method: resources/list");
}

#[tokio::test]
async fn malformed_line_is_answered() {
    let reply = server()
        .await
        .handle_line("{not json")
        .await
        .expect("reply");

    assert_eq!(reply["error"], "Invalid JSON");
    assert!(reply["id"].is_null());
}

#[tokio::test]
async fn notifications_get_no_reply() {
    let server = server().await;
    assert!(server
        .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await
        .is_none());
    assert!(server.handle_line("   ").await.is_none());
}

#[tokio::test]
async fn run_writes_one_line_per_reply() {
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_category_summary"}}"#,
        "\n",
        "garbage\n",
    );
    let mut output = Vec::new();

    server()
        .await
        .run(BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();

    let replies: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0]["id"], 1);
    assert_eq!(replies[1]["id"], 2);
    assert_eq!(content_json(&replies[1])[0]["category"], "Beverages");
    assert_eq!(replies[2]["error"], "Invalid JSON");
}

#[tokio::test]
async fn undecodable_line_is_answered_and_serving_continues() {
    let mut input = b"\xff\xfe garbage\n".to_vec();
    input.extend_from_slice(br#"{"jsonrpc":"2.0","id":7,"method":"tools/list"}"#);
    input.push(b'\n');
    let mut output = Vec::new();

    server()
        .await
        .run(BufReader::new(input.as_slice()), &mut output)
        .await
        .unwrap();

    let replies: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["error"], "Invalid JSON");
    assert_eq!(replies[1]["id"], 7);
    assert_eq!(replies[1]["result"]["tools"].as_array().unwrap().len(), 10);
}
