// BigQuery MCP Gateway - Error Taxonomy
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// One enum per layer. Config errors are fatal at startup; everything else
// is returned to the caller as the operation's error result.

use std::path::PathBuf;
use thiserror::Error;

/// Startup configuration failures. All of them abort the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid project ID format: {0:?} (expected lowercase letters, digits and '-')")]
    InvalidProjectId(String),

    #[error("Invalid location format: {0:?} (expected e.g. us-central1)")]
    InvalidLocation(String),

    #[error("Service account key file not accessible: {}", path.display())]
    KeyFileNotAccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Service account key file is not valid JSON: {}", path.display())]
    KeyFileNotJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid service account key file format: {} ({reason})", path.display())]
    InvalidKeyFile { path: PathBuf, reason: &'static str },
}

/// Outcome of the SQL gate and qualifier when the query must not run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QualificationError {
    #[error("Only READ operations are allowed (found {keyword})")]
    ForbiddenStatement { keyword: String },

    #[error("Dataset must be specified when querying INFORMATION_SCHEMA (e.g. dataset.INFORMATION_SCHEMA.TABLES)")]
    MissingDatasetForInformationSchema,
}

/// Failures from the warehouse client. Messages are the warehouse's own.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response; `message` is the API's `error.message` verbatim.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unexpected warehouse response: {0}")]
    Decode(String),
}

/// Errors surfaced to the MCP caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Qualification(#[from] QualificationError),

    #[error("Invalid resource URI: {0}")]
    InvalidResourceUri(String),

    #[error("{0} is required")]
    MissingArgument(&'static str),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Unknown prompt: {0}")]
    UnknownPrompt(String),

    #[error("Unknown method: {0}")]
    UnknownOperation(String),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

/// JSON-RPC error codes
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const PARSE_ERROR: i64 = -32700;

impl GatewayError {
    /// Variant name reported in `error.data.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Qualification(QualificationError::ForbiddenStatement { .. }) => "ForbiddenStatement",
            GatewayError::Qualification(QualificationError::MissingDatasetForInformationSchema) => {
                "MissingDatasetForInformationSchema"
            }
            GatewayError::InvalidResourceUri(_) => "InvalidResourceUri",
            GatewayError::MissingArgument(_) => "MissingArgument",
            GatewayError::UnknownTool(_) => "UnknownTool",
            GatewayError::UnknownPrompt(_) => "UnknownPrompt",
            GatewayError::UnknownOperation(_) => "UnknownOperation",
            GatewayError::Warehouse(_) => "WarehouseError",
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            GatewayError::UnknownOperation(_) => METHOD_NOT_FOUND,
            GatewayError::Warehouse(_) => INTERNAL_ERROR,
            _ => INVALID_PARAMS,
        }
    }
}
