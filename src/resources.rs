// BigQuery MCP Gateway - Dataset Resources
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// One browsable resource per dataset: bigquery://{project}/{dataset}/schema.
// Reading it returns every table's type and field schema as JSON.

use crate::config::ServerConfig;
use crate::error::{GatewayError, WarehouseError};
use crate::warehouse::Warehouse;
use serde::Serialize;
use serde_json::{json, Value};
use url::Url;

pub const SCHEMA_PATH: &str = "schema";
pub const MIME_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub dataset_id: String,
    pub project_id: String,
    pub resource_type: &'static str,
}

/// Entry returned by resources/list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub uri: String,
    pub mime_type: &'static str,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResourceMetadata>,
}

/// Per-table entry in a schema resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    pub table_id: String,
    pub full_table_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_query: Option<String>,
}

/// List one resource per dataset, naming its table/view count.
pub fn list_resources<W: Warehouse>(warehouse: &W, config: &ServerConfig) -> Result<Vec<ResourceEntry>, GatewayError> {
    log::info!("Fetching datasets...");
    let datasets = warehouse.list_datasets()?;
    log::info!("Found {} datasets", datasets.len());

    let identity = &config.identity;
    let mut resources = Vec::with_capacity(datasets.len());
    for dataset_id in datasets {
        let tables = warehouse.list_tables(&dataset_id)?;
        log::debug!("Found {} tables and views in dataset {}", tables.len(), dataset_id);

        let metadata = config.profile.is_extended().then(|| ResourceMetadata {
            dataset_id: dataset_id.clone(),
            project_id: identity.project_id().to_string(),
            resource_type: "dataset",
        });
        resources.push(ResourceEntry {
            uri: identity.schema_uri(&dataset_id),
            mime_type: MIME_TYPE,
            name: format!("Dataset: {} ({} tables/views)", dataset_id, tables.len()),
            metadata,
        });
    }

    log::info!("Total resources found: {}", resources.len());
    Ok(resources)
}

/// Dataset id from `.../<dataset>/schema`.
pub fn parse_schema_uri(uri: &str) -> Result<String, GatewayError> {
    let invalid = || GatewayError::InvalidResourceUri(uri.to_string());
    let url = Url::parse(uri).map_err(|_| invalid())?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.collect())
        .unwrap_or_default();
    match segments.as_slice() {
        [.., dataset, last] if *last == SCHEMA_PATH && !dataset.is_empty() => Ok(dataset.to_string()),
        _ => Err(invalid()),
    }
}

/// Read a dataset schema resource: `{contents: [{uri, mimeType, text}]}`.
pub fn read_resource<W: Warehouse>(warehouse: &W, config: &ServerConfig, uri: &str) -> Result<Value, GatewayError> {
    let dataset_id = parse_schema_uri(uri)?;
    let tables = dataset_schema(warehouse, config, &dataset_id)?;
    let text = serde_json::to_string_pretty(&tables)
        .map_err(|e| WarehouseError::Decode(format!("cannot render schema for {}: {}", dataset_id, e)))?;

    Ok(json!({
        "contents": [{
            "uri": uri,
            "mimeType": MIME_TYPE,
            "text": text,
        }]
    }))
}

/// Schema for every table in a dataset
pub fn dataset_schema<W: Warehouse>(
    warehouse: &W,
    config: &ServerConfig,
    dataset_id: &str,
) -> Result<Vec<TableSchema>, GatewayError> {
    let identity = &config.identity;
    let extended = config.profile.is_extended();

    warehouse
        .list_tables(dataset_id)?
        .into_iter()
        .map(|table| {
            let metadata = warehouse.table_metadata(dataset_id, &table.table_id)?;
            let full_table_id = identity.full_table_id(dataset_id, &table.table_id);
            Ok(TableSchema {
                dataset_id: extended.then(|| dataset_id.to_string()),
                sample_query: extended.then(|| format!("SELECT * FROM `{}` LIMIT 10", full_table_id)),
                table_id: table.table_id,
                full_table_id,
                kind: metadata.kind,
                schema: metadata.fields,
            })
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
