//! Line-oriented JSON-RPC tool server.
//!
//! Each input line is one JSON request, each output line one JSON response.
//! Requests without an `id` that name a `notifications/*` method get no
//! reply. Everything else is answered, including malformed lines.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        DateRangeQuery, DateWindow, MerchantPatternsQuery, QuestionRequest,
        SalesByDistrictRequest, SalesByMerchantRequest, SalesBySkuRequest,
        SalesByTimePeriodRequest, SalesRepPerformanceRequest, TopSkusQuery,
    },
    errors::ServiceError,
    handlers::common::{validate_input, validate_window},
    services::{assistant::Assistant, reports::ReportService},
    AppState,
};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "retail-insights";

/// A tool advertised by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn dated_schema(id_field: Option<(&str, &str)>) -> Value {
    let mut properties = serde_json::Map::new();
    if let Some((field, kind)) = id_field {
        properties.insert(field.to_string(), json!({ "type": kind }));
    }
    properties.insert(
        "start_date".into(),
        json!({"type": "string", "format": "date"}),
    );
    properties.insert("end_date".into(), json!({"type": "string", "format": "date"}));
    json!({ "type": "object", "properties": properties })
}

/// Every tool the server exposes.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            "get_sales_by_sku",
            "Sales totals per SKU, optionally for one SKU and a date range",
            dated_schema(Some(("sku_id", "integer"))),
        ),
        tool(
            "get_sales_by_merchant",
            "Sales totals per merchant, optionally for one merchant and a date range",
            dated_schema(Some(("merchant_id", "integer"))),
        ),
        tool(
            "get_sales_by_district",
            "Sales totals per district, optionally for one district and a date range",
            dated_schema(Some(("district", "string"))),
        ),
        tool(
            "get_sales_by_time_period",
            "Sales totals bucketed by day, week or month",
            json!({
                "type": "object",
                "properties": {
                    "period": {"type": "string", "enum": ["daily", "weekly", "monthly"]},
                    "start_date": {"type": "string", "format": "date"},
                    "end_date": {"type": "string", "format": "date"}
                }
            }),
        ),
        tool(
            "get_sales_rep_performance",
            "Sales representative performance",
            dated_schema(Some(("sales_rep_id", "integer"))),
        ),
        tool(
            "get_top_skus",
            "Best selling SKUs",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "minimum": 1, "maximum": 100},
                    "start_date": {"type": "string", "format": "date"},
                    "end_date": {"type": "string", "format": "date"}
                }
            }),
        ),
        tool(
            "get_district_trends",
            "Sales trends across all districts",
            dated_schema(None),
        ),
        tool(
            "get_category_summary",
            "Sales summary per product category",
            dated_schema(None),
        ),
        tool(
            "get_merchant_patterns",
            "Monthly ordering patterns per merchant",
            json!({
                "type": "object",
                "properties": { "merchant_id": {"type": "integer"} }
            }),
        ),
        tool(
            "answer_business_question",
            "Answer a natural-language business question",
            json!({
                "type": "object",
                "properties": { "question": {"type": "string"} },
                "required": ["question"]
            }),
        ),
    ]
}

fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ServiceError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args)
        .map_err(|e| ServiceError::BadRequest(format!("invalid arguments: {}", e)))
}

fn dated_args<T: DeserializeOwned + validator::Validate + DateWindow>(
    args: Value,
) -> Result<T, ServiceError> {
    let parsed: T = parse_args(args)?;
    validate_window(&parsed)?;
    Ok(parsed)
}

fn text_content(value: &Value) -> Value {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    json!({ "content": [{ "type": "text", "text": text }] })
}

fn response(id: Option<Value>, body: Result<Value, String>) -> Value {
    let id = id.unwrap_or(Value::Null);
    match body {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(error) => json!({ "jsonrpc": "2.0", "id": id, "error": error }),
    }
}

/// Serves the report tools over newline-delimited JSON.
#[derive(Clone)]
pub struct ToolServer {
    reports: ReportService,
    assistant: Assistant,
}

impl ToolServer {
    pub fn new(reports: ReportService, assistant: Assistant) -> Self {
        Self { reports, assistant }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.reports.clone(), state.assistant.clone())
    }

    /// Runs a tool and returns its JSON result.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<Value, ServiceError> {
        let r = &self.reports;
        let value = match name {
            "get_sales_by_sku" => {
                let a: SalesBySkuRequest = dated_args(args)?;
                serde_json::to_value(r.sales_by_sku(a.sku_id, a.start_date(), a.end_date()).await?)?
            }
            "get_sales_by_merchant" => {
                let a: SalesByMerchantRequest = dated_args(args)?;
                serde_json::to_value(
                    r.sales_by_merchant(a.merchant_id, a.start_date(), a.end_date())
                        .await?,
                )?
            }
            "get_sales_by_district" => {
                let a: SalesByDistrictRequest = dated_args(args)?;
                serde_json::to_value(
                    r.sales_by_district(a.district.as_deref(), a.start_date(), a.end_date())
                        .await?,
                )?
            }
            "get_sales_by_time_period" => {
                let a: SalesByTimePeriodRequest = parse_args(args)?;
                let period = a.period()?;
                validate_window(&a)?;
                serde_json::to_value(
                    r.sales_by_time_period(period, a.start_date(), a.end_date())
                        .await?,
                )?
            }
            "get_sales_rep_performance" => {
                let a: SalesRepPerformanceRequest = dated_args(args)?;
                serde_json::to_value(
                    r.sales_rep_performance(a.sales_rep_id, a.start_date(), a.end_date())
                        .await?,
                )?
            }
            "get_top_skus" => {
                let a: TopSkusQuery = dated_args(args)?;
                serde_json::to_value(
                    r.top_skus(a.limit.map(u64::from), a.start_date(), a.end_date())
                        .await?,
                )?
            }
            "get_district_trends" => {
                let a: DateRangeQuery = dated_args(args)?;
                serde_json::to_value(r.district_trends(a.start_date(), a.end_date()).await?)?
            }
            "get_category_summary" => {
                let a: DateRangeQuery = dated_args(args)?;
                serde_json::to_value(r.category_summary(a.start_date(), a.end_date()).await?)?
            }
            "get_merchant_patterns" => {
                let a: MerchantPatternsQuery = parse_args(args)?;
                serde_json::to_value(r.merchant_ordering_patterns(a.merchant_id).await?)?
            }
            "answer_business_question" => {
                let a: QuestionRequest = parse_args(args)?;
                validate_input(&a)?;
                Value::String(self.assistant.answer(a.question.trim()).await?)
            }
            other => {
                return Err(ServiceError::NotFound(format!("Unknown tool: {}", other)));
            }
        };
        Ok(value)
    }

    pub async fn handle_request(&self, request: RpcRequest) -> Option<Value> {
        debug!(method = %request.method, "Tool request");
        let body = match request.method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
                "capabilities": { "tools": {} }
            })),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => {
                let name = request
                    .params
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let args = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(Value::Null);

                match self.call_tool(&name, args).await {
                    Ok(value) => Ok(text_content(&value)),
                    Err(e) => {
                        warn!(tool = %name, "Tool call failed: {}", e);
                        let message = match e {
                            ServiceError::NotFound(message) => message,
                            other => other.response_message(),
                        };
                        let mut content = text_content(&json!({ "error": message }));
                        content["isError"] = Value::Bool(true);
                        Ok(content)
                    }
                }
            }
            method if method.starts_with("notifications/") && request.id.is_none() => {
                return None;
            }
            method => Err(format!("Unknown method: {}", method)),
        };
        Some(response(request.id, body))
    }

    /// Handles one input line. Blank lines and notifications yield `None`.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match serde_json::from_str::<RpcRequest>(line) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => {
                debug!("Rejected malformed request: {}", e);
                Some(response(None, Err("Invalid JSON".to_string())))
            }
        }
    }

    /// Serves requests until `reader` reaches end of input.
    ///
    /// A line that is not valid UTF-8 is answered like any other malformed
    /// request and the loop keeps reading.
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Tool server ready");
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            let reply = match std::str::from_utf8(&buf) {
                Ok(line) => self.handle_line(line).await,
                Err(e) => {
                    debug!("Rejected non UTF-8 request: {}", e);
                    Some(response(None, Err("Invalid JSON".to_string())))
                }
            };
            if let Some(reply) = reply {
                let mut encoded = reply.to_string();
                encoded.push('\n');
                writer.write_all(encoded.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        info!("Tool server input closed");
        Ok(())
    }
}
