// BigQuery MCP Gateway - BigQuery REST Client
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Blocking client for the BigQuery v2 REST API: datasets, tables, table
// metadata, queries. Errors from the API are passed through with the
// API's own message. No retries.

use crate::config::WarehouseIdentity;
use crate::credentials::{Credentials, TokenSource};
use crate::error::WarehouseError;
use crate::warehouse::{QueryJob, Row, TableMetadata, TableSummary, Warehouse};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

pub const API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// Server-side wait per jobs.query / getQueryResults call
const QUERY_WAIT_MS: u64 = 10_000;
const HTTP_TIMEOUT_SECS: u64 = 60;
const PAGE_SIZE: &str = "1000";

/// BigQuery client bound to one project
pub struct BigQueryClient {
    http: Client,
    tokens: TokenSource,
    project_id: String,
}

impl BigQueryClient {
    pub fn new(identity: &WarehouseIdentity, credentials: Credentials) -> Result<Self, WarehouseError> {
        let http = Client::builder()
            .user_agent(concat!("mcp-server-bigquery/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        let tokens = TokenSource::new(credentials, http.clone());
        Ok(Self {
            http,
            tokens,
            project_id: identity.project_id().to_string(),
        })
    }

    /// `{base}/projects/{project}/{segments...}`, each segment percent-encoded
    fn endpoint(&self, segments: &[&str]) -> Result<Url, WarehouseError> {
        let mut url =
            Url::parse(API_BASE).map_err(|e| WarehouseError::Decode(format!("bad API base {}: {}", API_BASE, e)))?;
        url.path_segments_mut()
            .map_err(|_| WarehouseError::Decode(format!("API base cannot take a path: {}", API_BASE)))?
            .pop_if_empty()
            .extend(["projects", self.project_id.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Value, WarehouseError> {
        let resp = request.bearer_auth(self.tokens.bearer()?).send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| WarehouseError::Decode(format!("invalid JSON response: {}", e)))
    }

    fn get(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Value, WarehouseError> {
        let url = self.endpoint(segments)?;
        log::debug!("GET {}", url);
        self.send(self.http.get(url).query(query))
    }

    fn post(&self, segments: &[&str], body: &Value) -> Result<Value, WarehouseError> {
        let url = self.endpoint(segments)?;
        log::debug!("POST {}", url);
        self.send(self.http.post(url).json(body))
    }

    /// Every entry under `items_key` across all pages of a list call.
    fn list_all(&self, segments: &[&str], items_key: &str) -> Result<Vec<Value>, WarehouseError> {
        collect_pages(items_key, |page_token| {
            let mut query = vec![("maxResults", PAGE_SIZE)];
            if let Some(token) = page_token {
                query.push(("pageToken", token));
            }
            self.get(segments, &query)
        })
    }
}

impl Warehouse for BigQueryClient {
    fn list_datasets(&self) -> Result<Vec<String>, WarehouseError> {
        let entries = self.list_all(&["datasets"], "datasets")?;
        entries
            .iter()
            .map(|d| {
                d.pointer("/datasetReference/datasetId")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| WarehouseError::Decode("dataset entry without datasetId".to_string()))
            })
            .collect()
    }

    fn list_tables(&self, dataset_id: &str) -> Result<Vec<TableSummary>, WarehouseError> {
        let entries = self.list_all(&["datasets", dataset_id, "tables"], "tables")?;
        entries
            .iter()
            .map(|t| {
                t.pointer("/tableReference/tableId")
                    .and_then(Value::as_str)
                    .map(|table_id| TableSummary { table_id: table_id.to_string() })
                    .ok_or_else(|| WarehouseError::Decode("table entry without tableId".to_string()))
            })
            .collect()
    }

    fn table_metadata(&self, dataset_id: &str, table_id: &str) -> Result<TableMetadata, WarehouseError> {
        let table = self.get(&["datasets", dataset_id, "tables", table_id], &[])?;
        Ok(TableMetadata {
            table_id: table_id.to_string(),
            kind: table.get("type").and_then(Value::as_str).unwrap_or("TABLE").to_string(),
            fields: table.pointer("/schema/fields").cloned().unwrap_or_else(|| json!([])),
        })
    }

    fn query(&self, job: &QueryJob) -> Result<Vec<Row>, WarehouseError> {
        let body = json!({
            "query": job.sql,
            "useLegacySql": false,
            "location": job.location,
            "maximumBytesBilled": job.maximum_bytes_billed,
            "timeoutMs": QUERY_WAIT_MS,
            "formatOptions": { "useInt64Timestamp": true },
        });
        let first = self.post(&["queries"], &body)?;

        let location = first
            .pointer("/jobReference/location")
            .and_then(Value::as_str)
            .unwrap_or(job.location.as_str())
            .to_string();
        if let Some(id) = first.pointer("/jobReference/jobId").and_then(Value::as_str) {
            log::info!("Query job {} submitted ({})", id, location);
        }

        let wait = QUERY_WAIT_MS.to_string();
        let rows = drain_query(first, |job_id, page_token| {
            let mut query = vec![
                ("location", location.as_str()),
                ("timeoutMs", wait.as_str()),
                ("maxResults", PAGE_SIZE),
                ("formatOptions.useInt64Timestamp", "true"),
            ];
            if let Some(token) = page_token {
                query.push(("pageToken", token));
            }
            self.get(&["queries", job_id], &query)
        })?;

        log::info!("Query returned {} rows", rows.len());
        Ok(rows)
    }
}

// ============================================================================
// PAGING: list calls follow `nextPageToken`; query results poll until
// `jobComplete` and then follow `pageToken`
// ============================================================================

/// Fetch pages until `nextPageToken` runs out. `fetch` gets the token for
/// the next page (`None` for the first).
fn collect_pages<F>(items_key: &str, mut fetch: F) -> Result<Vec<Value>, WarehouseError>
where
    F: FnMut(Option<&str>) -> Result<Value, WarehouseError>,
{
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = fetch(page_token.as_deref())?;

        if let Some(entries) = page.get(items_key).and_then(Value::as_array) {
            items.extend(entries.iter().cloned());
        }

        match page.get("nextPageToken").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
            _ => break,
        }
    }

    Ok(items)
}

/// Decode rows from a jobs.query response, calling `poll(job_id, page_token)`
/// for getQueryResults while the job is running or more pages remain.
fn drain_query<F>(first: Value, mut poll: F) -> Result<Vec<Row>, WarehouseError>
where
    F: FnMut(&str, Option<&str>) -> Result<Value, WarehouseError>,
{
    let job_id = first
        .pointer("/jobReference/jobId")
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut page = first;
    let mut rows = Vec::new();
    loop {
        let complete = page.get("jobComplete").and_then(Value::as_bool).unwrap_or(true);
        let mut page_token = None;
        if complete {
            let fields = page
                .pointer("/schema/fields")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let page_rows = page.get("rows").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
            rows.extend(decode_rows(fields, page_rows));

            match page.get("pageToken").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => break,
            }
        }

        let id = job_id
            .as_deref()
            .ok_or_else(|| WarehouseError::Decode("incomplete query without jobReference".to_string()))?;
        page = poll(id, page_token.as_deref())?;
    }

    Ok(rows)
}

/// Turn a non-success response into an error carrying the API's message.
fn api_error(status: u16, body: &str) -> WarehouseError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {}", status)
            } else {
                trimmed.to_string()
            }
        });
    WarehouseError::Api { status, message }
}

// ============================================================================
// ROW DECODING: tabledata `f`/`v` form to column-keyed objects
// ============================================================================

/// Decode result rows against the query's schema fields.
pub fn decode_rows(fields: &[Value], rows: &[Value]) -> Vec<Row> {
    rows.iter().map(|record| decode_record(fields, record)).collect()
}

fn decode_record(fields: &[Value], record: &Value) -> Row {
    let cells = record.get("f").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
    fields
        .iter()
        .zip(cells)
        .map(|(field, cell)| {
            let name = field.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            let value = cell.get("v").unwrap_or(&Value::Null);
            (name, decode_field(field, value))
        })
        .collect()
}

fn decode_field(field: &Value, value: &Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    if field.get("mode").and_then(Value::as_str) == Some("REPEATED") {
        let items = value.as_array().map(Vec::as_slice).unwrap_or(&[]);
        return Value::Array(
            items
                .iter()
                .map(|item| match item.get("v") {
                    Some(v) if !v.is_null() => decode_value(field, v),
                    _ => Value::Null,
                })
                .collect(),
        );
    }
    decode_value(field, value)
}

fn decode_value(field: &Value, value: &Value) -> Value {
    let kind = field.get("type").and_then(Value::as_str).unwrap_or("STRING");
    let Some(text) = value.as_str() else {
        // RECORD cells arrive as objects
        if matches!(kind, "RECORD" | "STRUCT") {
            let subfields = field.get("fields").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
            return Value::Object(decode_record(subfields, value));
        }
        return value.clone();
    };

    match kind {
        "INTEGER" | "INT64" => text.parse::<i64>().map(Value::from).unwrap_or_else(|_| value.clone()),
        "FLOAT" | "FLOAT64" => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        "BOOLEAN" | "BOOL" => match text {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => value.clone(),
        },
        "TIMESTAMP" => timestamp_to_rfc3339(text).map(Value::String).unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    }
}

/// TIMESTAMP cells are int64 microseconds, or float seconds on older paths.
fn timestamp_to_rfc3339(text: &str) -> Option<String> {
    let micros = match text.parse::<i64>() {
        Ok(micros) => micros,
        Err(_) => {
            let secs = text.parse::<f64>().ok().filter(|s| s.is_finite())?;
            (secs * 1_000_000.0).round() as i64
        }
    };
    DateTime::<Utc>::from_timestamp_micros(micros).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<Value> {
        json!([
            {"name": "id", "type": "INTEGER", "mode": "REQUIRED"},
            {"name": "score", "type": "FLOAT"},
            {"name": "active", "type": "BOOLEAN"},
            {"name": "name", "type": "STRING"},
            {"name": "created", "type": "TIMESTAMP"},
            {"name": "tags", "type": "STRING", "mode": "REPEATED"},
            {"name": "owner", "type": "RECORD", "fields": [
                {"name": "login", "type": "STRING"},
                {"name": "age", "type": "INT64"}
            ]},
            {"name": "amount", "type": "NUMERIC"}
        ])
        .as_array()
        .cloned()
        .unwrap()
    }

    #[test]
    fn decodes_scalar_nested_and_repeated_cells() {
        let rows = json!([{
            "f": [
                {"v": "42"},
                {"v": "0.5"},
                {"v": "true"},
                {"v": "alice"},
                {"v": "1700000000000000"},
                {"v": [{"v": "a"}, {"v": "b"}]},
                {"v": {"f": [{"v": "octo"}, {"v": "7"}]}},
                {"v": "12.3400"}
            ]
        }]);
        let decoded = decode_rows(&schema(), rows.as_array().unwrap());
        assert_eq!(decoded.len(), 1);
        let row = &decoded[0];
        assert_eq!(row["id"], json!(42));
        assert_eq!(row["score"], json!(0.5));
        assert_eq!(row["active"], json!(true));
        assert_eq!(row["name"], json!("alice"));
        assert_eq!(row["created"], json!("2023-11-14T22:13:20.000000Z"));
        assert_eq!(row["tags"], json!(["a", "b"]));
        assert_eq!(row["owner"], json!({"login": "octo", "age": 7}));
        assert_eq!(row["amount"], json!("12.3400"));

        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys[0], "id");
    }

    #[test]
    fn nulls_stay_null() {
        let rows = json!([{"f": [{"v": null}, {"v": null}, {"v": null}, {"v": null}, {"v": null}, {"v": null}, {"v": null}, {"v": null}]}]);
        let decoded = decode_rows(&schema(), rows.as_array().unwrap());
        assert!(decoded[0].values().all(Value::is_null));
    }

    #[test]
    fn non_finite_float_kept_as_text() {
        let fields = json!([{"name": "x", "type": "FLOAT64"}]);
        let rows = json!([{"f": [{"v": "NaN"}]}, {"f": [{"v": "Infinity"}]}]);
        let decoded = decode_rows(fields.as_array().unwrap(), rows.as_array().unwrap());
        assert_eq!(decoded[0]["x"], json!("NaN"));
        assert_eq!(decoded[1]["x"], json!("Infinity"));
    }

    #[test]
    fn float_seconds_timestamp_supported() {
        assert_eq!(
            timestamp_to_rfc3339("1.7E9").as_deref(),
            Some("2023-11-14T22:13:20.000000Z")
        );
        assert_eq!(timestamp_to_rfc3339("yesterday"), None);
    }

    #[test]
    fn api_error_uses_api_message() {
        let body = r#"{"error":{"code":400,"message":"Syntax error: Unexpected end of script at [1:7]","status":"INVALID_ARGUMENT"}}"#;
        match api_error(400, body) {
            WarehouseError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Syntax error: Unexpected end of script at [1:7]");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(api_error(502, "").to_string(), "HTTP 502");
        assert_eq!(api_error(503, "upstream down\n").to_string(), "upstream down");
    }

    #[test]
    fn list_pages_follow_next_page_token() {
        let mut pages = vec![
            json!({"datasets": [{"datasetReference": {"datasetId": "a"}}], "nextPageToken": "t1"}),
            json!({"datasets": [{"datasetReference": {"datasetId": "b"}}], "nextPageToken": "t2"}),
            json!({"datasets": [{"datasetReference": {"datasetId": "c"}}], "nextPageToken": ""}),
        ]
        .into_iter();
        let mut tokens = Vec::new();

        let items = collect_pages("datasets", |token| {
            tokens.push(token.map(str::to_string));
            Ok(pages.next().unwrap())
        })
        .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[2]["datasetReference"]["datasetId"], "c");
        assert_eq!(tokens, vec![None, Some("t1".to_string()), Some("t2".to_string())]);
    }

    #[test]
    fn list_page_without_items_is_empty() {
        let items = collect_pages("tables", |_| Ok(json!({"kind": "bigquery#tableList"}))).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn query_polls_until_complete_then_pages() {
        let fields = json!([{"name": "n", "type": "INTEGER"}]);
        let first = json!({"jobReference": {"jobId": "job_1", "location": "US"}, "jobComplete": false});
        let mut pages = vec![
            json!({"jobComplete": false}),
            json!({"jobComplete": true, "schema": {"fields": fields}, "rows": [{"f": [{"v": "1"}]}], "pageToken": "p2"}),
            json!({"jobComplete": true, "schema": {"fields": fields}, "rows": [{"f": [{"v": "2"}]}, {"f": [{"v": "3"}]}]}),
        ]
        .into_iter();
        let mut calls = Vec::new();

        let rows = drain_query(first, |job_id, token| {
            calls.push((job_id.to_string(), token.map(str::to_string)));
            Ok(pages.next().unwrap())
        })
        .unwrap();

        let values: Vec<Value> = rows.iter().map(|r| r["n"].clone()).collect();
        assert_eq!(values, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(
            calls,
            vec![
                ("job_1".to_string(), None),
                ("job_1".to_string(), None),
                ("job_1".to_string(), Some("p2".to_string())),
            ]
        );
    }

    #[test]
    fn completed_single_page_query_never_polls() {
        let first = json!({
            "jobReference": {"jobId": "job_2"},
            "jobComplete": true,
            "schema": {"fields": [{"name": "f0_", "type": "INTEGER"}]},
            "rows": [{"f": [{"v": "1"}]}]
        });
        let rows = drain_query(first, |_, _| panic!("no poll expected")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["f0_"], json!(1));
    }

    #[test]
    fn incomplete_query_without_job_reference_fails() {
        let err = drain_query(json!({"jobComplete": false}), |_, _| panic!("no poll expected")).unwrap_err();
        assert!(matches!(err, WarehouseError::Decode(_)));
    }

    #[test]
    fn endpoint_encodes_segments() {
        let identity = WarehouseIdentity::new("proj", "us-central1").unwrap();
        let client = BigQueryClient::new(&identity, Credentials::MetadataServer).unwrap();
        let url = client.endpoint(&["datasets", "sales", "tables", "odd name"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://bigquery.googleapis.com/bigquery/v2/projects/proj/datasets/sales/tables/odd%20name"
        );
    }
}
