// BigQuery MCP Gateway - Warehouse Seam
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// The external warehouse client as seen by resources and tools.
// `bigquery::BigQueryClient` is the real implementation.

use crate::error::WarehouseError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result row: column name -> value, in schema order
pub type Row = Map<String, Value>;

/// A table or view as listed in a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table_id: String,
}

/// Metadata for a single table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table_id: String,
    /// TABLE, VIEW, MATERIALIZED_VIEW, EXTERNAL, ...
    pub kind: String,
    /// Field list exactly as the warehouse reports it
    pub fields: Value,
}

/// A query ready to run: already gated and qualified
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryJob {
    pub sql: String,
    pub location: String,
    pub maximum_bytes_billed: String,
}

pub trait Warehouse {
    /// Dataset ids in the configured project
    fn list_datasets(&self) -> Result<Vec<String>, WarehouseError>;

    fn list_tables(&self, dataset_id: &str) -> Result<Vec<TableSummary>, WarehouseError>;

    fn table_metadata(&self, dataset_id: &str, table_id: &str) -> Result<TableMetadata, WarehouseError>;

    /// Run a query to completion and return every row
    fn query(&self, job: &QueryJob) -> Result<Vec<Row>, WarehouseError>;
}
