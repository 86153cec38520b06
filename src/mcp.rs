// BigQuery MCP Gateway - MCP Server (JSON-RPC 2.0 over stdio)
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// One request per line on stdin, one response per line on stdout.
// Logs go to stderr. Requests are handled one at a time.
// Exposes: resources (dataset schemas), tools (query, listTables),
//          prompts (extended profile only)

use crate::config::ServerConfig;
use crate::error::{GatewayError, PARSE_ERROR};
use crate::warehouse::Warehouse;
use crate::{prompts, resources, tools};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "mcp-server/bigquery";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Summarize tool args for logging (truncate large values)
fn param_summary(name: &str, args: &Value) -> String {
    match name {
        "query" => {
            let sql = args.get("sql").and_then(Value::as_str).unwrap_or("?");
            let sql: String = sql.split_whitespace().collect::<Vec<_>>().join(" ");
            let shown: String = sql.chars().take(200).collect();
            let ellipsis = if shown.len() < sql.len() { "…" } else { "" };
            match args.get("datasetId").and_then(Value::as_str) {
                Some(dataset) => format!("sql={}{} dataset={}", shown, ellipsis, dataset),
                None => format!("sql={}{}", shown, ellipsis),
            }
        }
        "listTables" => {
            format!("dataset={}", args.get("datasetId").and_then(Value::as_str).unwrap_or("?"))
        }
        _ => {
            let s = args.to_string();
            if s.chars().count() > 300 {
                format!("{}…", s.chars().take(300).collect::<String>())
            } else {
                s
            }
        }
    }
}

/// JSON-RPC response
fn response(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// JSON-RPC error response
fn error_response(id: &Value, code: i64, message: &str, kind: Option<&str>) -> Value {
    let mut error = json!({ "code": code, "message": message });
    if let Some(kind) = kind {
        error["data"] = json!({ "kind": kind });
    }
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error,
    })
}

/// Write one message as a single line and flush
fn send<O: Write>(out: &mut O, message: &Value) -> io::Result<()> {
    serde_json::to_writer(&mut *out, message)?;
    out.write_all(b"\n")?;
    out.flush()
}

/// MCP server over any warehouse
pub struct McpServer<W: Warehouse> {
    config: ServerConfig,
    warehouse: W,
}

impl<W: Warehouse> McpServer<W> {
    pub fn new(config: ServerConfig, warehouse: W) -> Self {
        Self { config, warehouse }
    }

    fn capabilities(&self) -> Value {
        let mut caps = json!({ "resources": {}, "tools": {} });
        if self.config.profile.is_extended() {
            caps["prompts"] = json!({});
        }
        caps
    }

    /// Handle one decoded message. `None` for notifications.
    pub fn handle_message(&self, msg: &Value) -> Option<Value> {
        let method = msg.get("method").and_then(Value::as_str).unwrap_or("");
        let id = msg.get("id").cloned().unwrap_or(Value::Null);
        let params = msg.get("params").cloned().unwrap_or_else(|| json!({}));
        let is_notification = id.is_null();

        log::info!("Received: {}", method);

        match self.dispatch(method, &params) {
            Ok(Some(result)) if !is_notification => Some(response(&id, result)),
            Ok(_) => None,
            Err(e) => {
                log::warn!("{} failed: {}", method, e);
                if is_notification {
                    None
                } else {
                    Some(error_response(&id, e.code(), &e.to_string(), Some(e.kind())))
                }
            }
        }
    }

    fn dispatch(&self, method: &str, params: &Value) -> Result<Option<Value>, GatewayError> {
        let extended = self.config.profile.is_extended();

        let result = match method {
            "initialize" => json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": self.capabilities(),
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION,
                }
            }),

            m if m.starts_with("notifications/") => return Ok(None),

            "ping" => json!({}),

            "resources/list" => {
                let resources = resources::list_resources(&self.warehouse, &self.config)?;
                json!({ "resources": resources })
            }

            "resources/read" => {
                let uri = params
                    .get("uri")
                    .and_then(Value::as_str)
                    .ok_or(GatewayError::MissingArgument("uri"))?;
                resources::read_resource(&self.warehouse, &self.config, uri)?
            }

            "tools/list" => json!({ "tools": tools::tool_definitions(&self.config) }),

            "tools/call" => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or(GatewayError::MissingArgument("name"))?;
                let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                log::info!("CALL {} | {}", name, param_summary(name, &args));
                tools::call_tool(&self.warehouse, &self.config, name, &args)?
            }

            "prompts/list" if extended => json!({ "prompts": prompts::prompt_definitions() }),

            "prompts/get" if extended => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or(GatewayError::MissingArgument("name"))?;
                let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                prompts::get_prompt(name, &args)?
            }

            _ => return Err(GatewayError::UnknownOperation(method.to_string())),
        };

        Ok(Some(result))
    }

    /// Serve newline-delimited JSON-RPC until the input closes.
    pub fn run<R: BufRead, O: Write>(&self, input: R, mut output: O) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let msg: Value = match serde_json::from_str(line) {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("JSON parse error: {}", e);
                    send(&mut output, &error_response(&Value::Null, PARSE_ERROR, &format!("Parse error: {}", e), None))?;
                    continue;
                }
            };

            if let Some(reply) = self.handle_message(&msg) {
                send(&mut output, &reply)?;
            }
        }

        log::info!("Input closed, shutting down");
        Ok(())
    }
}

/// Run the server on stdin/stdout. Blocks until stdin closes.
pub fn serve<W: Warehouse>(config: ServerConfig, warehouse: W) -> io::Result<()> {
    log::info!("Starting {} v{}", SERVER_NAME, SERVER_VERSION);
    log::info!("Profile: {:?}", config.profile);

    let server = McpServer::new(config, warehouse);
    let stdin = io::stdin();
    let stdout = io::stdout();
    server.run(stdin.lock(), stdout.lock())
}

// ============================================================================
// TESTS
// ============================================================================
