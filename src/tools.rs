// BigQuery MCP Gateway - Tools
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Exposes: query, listTables
// Every query goes through qualify::qualify (gate + qualifier) first.

use crate::config::{ServerConfig, DEFAULT_MAXIMUM_BYTES_BILLED};
use crate::error::{GatewayError, WarehouseError};
use crate::qualify;
use crate::warehouse::{QueryJob, Warehouse};
use serde::Serialize;
use serde_json::{json, Value};

/// Arguments of the `query` tool
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub sql: String,
    pub maximum_bytes_billed: String,
    pub dataset_hint: Option<String>,
}

impl QueryRequest {
    pub fn from_args(args: &Value) -> Result<Self, GatewayError> {
        let sql = args
            .get("sql")
            .and_then(Value::as_str)
            .ok_or(GatewayError::MissingArgument("sql"))?
            .to_string();

        // Accept "1000000000" or 1000000000
        let maximum_bytes_billed = match args.get("maximumBytesBilled") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => DEFAULT_MAXIMUM_BYTES_BILLED.to_string(),
        };

        let dataset_hint = args
            .get("datasetId")
            .and_then(Value::as_str)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(Self { sql, maximum_bytes_billed, dataset_hint })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableListing {
    pub table_id: String,
    pub full_table_id: String,
}

/// MCP tool definition helper
fn tool_def(name: &str, description: &str, properties: Value, required: Vec<&str>) -> Value {
    json!({
        "name": name,
        "description": description,
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required,
        }
    })
}

/// Return all tool definitions for the active profile
pub fn tool_definitions(config: &ServerConfig) -> Vec<Value> {
    let mut query_props = json!({
        "sql": {"type": "string", "description": "Read-only BigQuery Standard SQL"},
        "maximumBytesBilled": {"type": "string", "description": "Maximum bytes billed (default: 1GB)"}
    });
    if config.profile.is_extended() {
        query_props["datasetId"] = json!({
            "type": "string",
            "description": "Dataset ID to use if not specified in query"
        });
    }

    vec![
        tool_def(
            "query",
            "Run a read-only BigQuery SQL query",
            query_props,
            vec!["sql"],
        ),
        tool_def(
            "listTables",
            "List all tables in a specific dataset",
            json!({
                "datasetId": {"type": "string", "description": "Dataset to list"}
            }),
            vec!["datasetId"],
        ),
    ]
}

/// Tool result wrapper: one text block, not an error
fn text_result(text: String) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": false,
    })
}

fn to_pretty<T: Serialize>(value: &T) -> Result<String, GatewayError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| GatewayError::Warehouse(WarehouseError::Decode(e.to_string())))
}

/// Handle a tool call
pub fn call_tool<W: Warehouse>(
    warehouse: &W,
    config: &ServerConfig,
    name: &str,
    args: &Value,
) -> Result<Value, GatewayError> {
    match name {
        "query" => {
            let request = QueryRequest::from_args(args)?;
            let rows = run_query(warehouse, config, &request)?;
            Ok(text_result(to_pretty(&rows)?))
        }

        "listTables" => {
            let dataset_id = args
                .get("datasetId")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .ok_or(GatewayError::MissingArgument("datasetId"))?;
            let tables = list_tables(warehouse, config, dataset_id)?;
            Ok(text_result(to_pretty(&tables)?))
        }

        _ => Err(GatewayError::UnknownTool(name.to_string())),
    }
}

/// Gate, qualify, run.
pub fn run_query<W: Warehouse>(
    warehouse: &W,
    config: &ServerConfig,
    request: &QueryRequest,
) -> Result<Vec<crate::warehouse::Row>, GatewayError> {
    let identity = &config.identity;
    let hint = config.dataset_hint(request.dataset_hint.as_deref());

    let sql = qualify::qualify(&request.sql, identity.project_id(), hint)?;
    if sql != request.sql {
        log::info!("Qualified query: {}", sql);
    }

    let job = QueryJob {
        sql,
        location: identity.location().to_string(),
        maximum_bytes_billed: request.maximum_bytes_billed.clone(),
    };
    Ok(warehouse.query(&job)?)
}

pub fn list_tables<W: Warehouse>(
    warehouse: &W,
    config: &ServerConfig,
    dataset_id: &str,
) -> Result<Vec<TableListing>, GatewayError> {
    Ok(warehouse
        .list_tables(dataset_id)?
        .into_iter()
        .map(|t| TableListing {
            full_table_id: config.identity.full_table_id(dataset_id, &t.table_id),
            table_id: t.table_id,
        })
        .collect())
}

// ============================================================================
// TESTS
// ============================================================================
