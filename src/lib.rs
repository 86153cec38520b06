// BigQuery MCP Gateway - Library Root
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// All modules exported here for use by the binary and tests.

pub mod config;
pub mod credentials;
pub mod error;
pub mod mcp;
pub mod prompts;
pub mod resources;
pub mod tools;
pub mod warehouse;

// ============================================================================
// SQL GATE
// ============================================================================

/// Forbidden-statement blocklist
pub mod gate;

/// INFORMATION_SCHEMA and bare-table qualification
pub mod qualify;

// ============================================================================
// WAREHOUSE CLIENT
// ============================================================================

/// BigQuery REST v2 implementation of `warehouse::Warehouse`
pub mod bigquery;
