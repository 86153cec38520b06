// BigQuery MCP Gateway - Query Qualifier
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Rewrites inbound SQL so it runs unambiguously against the configured
// project. Pattern matching over text, not a parser:
// - dataset.INFORMATION_SCHEMA.TABLES -> `project.dataset.INFORMATION_SCHEMA.TABLES`
// - FROM bare_table -> FROM `project.dataset.bare_table` (only with a dataset hint)
// Only the literal FROM token is looked at. JOIN targets and CTE names are
// left alone, so multi-table statements may come out partially qualified.

use crate::error::QualificationError;
use crate::gate;
use regex::Regex;
use std::sync::OnceLock;

fn information_schema_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bFROM\s+(?:(\w+)\.)?INFORMATION_SCHEMA\.TABLES\b").expect("valid regex")
    })
}

fn bare_table_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bFROM\s+`?(\w[\w-]*)`?").expect("valid regex"))
}

/// Gate, then qualify. The single entry point callers should use.
///
/// `dataset_hint` enables bare-table qualification; INFORMATION_SCHEMA
/// qualification runs whenever the text mentions INFORMATION_SCHEMA.
pub fn qualify(sql: &str, project_id: &str, dataset_hint: Option<&str>) -> Result<String, QualificationError> {
    gate::check(sql)?;

    let mut qualified = match dataset_hint.filter(|d| !d.is_empty()) {
        Some(dataset_id) => qualify_bare_tables(sql, project_id, dataset_id),
        None => sql.to_string(),
    };

    if qualified.to_uppercase().contains("INFORMATION_SCHEMA") {
        qualified = qualify_information_schema(&qualified, project_id)?;
    }

    Ok(qualified)
}

/// Qualify `FROM dataset.INFORMATION_SCHEMA.TABLES` with the project.
///
/// INFORMATION_SCHEMA.TABLES is dataset-scoped, so a reference without a
/// dataset prefix fails the whole query.
pub fn qualify_information_schema(sql: &str, project_id: &str) -> Result<String, QualificationError> {
    let mut out = String::with_capacity(sql.len() + project_id.len() + 4);
    let mut last = 0;

    for caps in information_schema_pattern().captures_iter(sql) {
        let Some(whole) = caps.get(0) else { continue };
        let dataset = caps
            .get(1)
            .ok_or(QualificationError::MissingDatasetForInformationSchema)?;

        out.push_str(&sql[last..whole.start()]);
        out.push_str(&format!(
            "FROM `{}.{}.INFORMATION_SCHEMA.TABLES`",
            project_id,
            dataset.as_str()
        ));
        last = whole.end();
    }

    out.push_str(&sql[last..]);
    Ok(out)
}

/// True when the text right after a FROM target shows it is already dotted
/// (`sales.orders`) or is a function call (`UNNEST(...)`, `UNNEST (...)`).
fn is_qualified_or_call(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        Some('.') => matches!(chars.next(), Some(c) if c != '.' && !c.is_whitespace()),
        _ => rest.trim_start().starts_with('('),
    }
}

/// Qualify every unqualified `FROM table` with project and dataset.
pub fn qualify_bare_tables(sql: &str, project_id: &str, dataset_id: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 2 * (project_id.len() + dataset_id.len()));
    let mut last = 0;

    for caps in bare_table_pattern().captures_iter(sql) {
        let (Some(whole), Some(table)) = (caps.get(0), caps.get(1)) else { continue };
        if is_qualified_or_call(&sql[whole.end()..]) {
            continue;
        }

        out.push_str(&sql[last..whole.start()]);
        out.push_str(&format!("FROM `{}.{}.{}`", project_id, dataset_id, table.as_str()));
        last = whole.end();
    }

    out.push_str(&sql[last..]);
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_one_passes_through_unmodified() {
        assert_eq!(qualify("SELECT 1", "proj", None).unwrap(), "SELECT 1");
    }

    #[test]
    fn forbidden_statement_rejected_before_rewrite() {
        let err = qualify("DROP TABLE orders", "proj", Some("sales")).unwrap_err();
        assert_eq!(err, QualificationError::ForbiddenStatement { keyword: "DROP".to_string() });
    }

    #[test]
    fn information_schema_without_dataset_fails() {
        assert_eq!(
            qualify("FROM INFORMATION_SCHEMA.TABLES", "proj", None),
            Err(QualificationError::MissingDatasetForInformationSchema)
        );
        assert_eq!(
            qualify("select table_name from information_schema.tables", "proj", Some("sales")),
            Err(QualificationError::MissingDatasetForInformationSchema)
        );
    }

    #[test]
    fn information_schema_with_dataset_is_qualified() {
        assert_eq!(
            qualify("FROM sales.INFORMATION_SCHEMA.TABLES", "proj", None).unwrap(),
            "FROM `proj.sales.INFORMATION_SCHEMA.TABLES`"
        );
        assert_eq!(
            qualify("SELECT table_name FROM sales.information_schema.tables WHERE x", "proj", None).unwrap(),
            "SELECT table_name FROM `proj.sales.INFORMATION_SCHEMA.TABLES` WHERE x"
        );
    }

    #[test]
    fn information_schema_qualification_is_idempotent() {
        let once = qualify_information_schema("SELECT * FROM sales.INFORMATION_SCHEMA.TABLES", "proj").unwrap();
        let twice = qualify_information_schema(&once, "proj").unwrap();
        assert_eq!(once, twice);
        assert_eq!(qualify(&once, "proj", None).unwrap(), once);
    }

    #[test]
    fn one_bad_reference_fails_the_whole_query() {
        let sql = "SELECT * FROM a.INFORMATION_SCHEMA.TABLES UNION ALL SELECT * FROM INFORMATION_SCHEMA.TABLES";
        assert_eq!(
            qualify_information_schema(sql, "proj"),
            Err(QualificationError::MissingDatasetForInformationSchema)
        );
    }

    #[test]
    fn other_information_schema_views_untouched() {
        let sql = "SELECT * FROM sales.INFORMATION_SCHEMA.COLUMNS";
        assert_eq!(qualify(sql, "proj", None).unwrap(), sql);
    }

    #[test]
    fn bare_table_is_qualified_with_hint() {
        assert_eq!(
            qualify("SELECT * FROM orders", "proj", Some("sales")).unwrap(),
            "SELECT * FROM `proj.sales.orders`"
        );
        assert_eq!(
            qualify("select id from `orders` where id > 3", "proj", Some("sales")).unwrap(),
            "select id FROM `proj.sales.orders` where id > 3"
        );
    }

    #[test]
    fn bare_table_without_hint_left_alone() {
        assert_eq!(qualify("SELECT * FROM orders", "proj", None).unwrap(), "SELECT * FROM orders");
        assert_eq!(qualify("SELECT * FROM orders", "proj", Some("")).unwrap(), "SELECT * FROM orders");
    }

    #[test]
    fn qualified_references_left_alone() {
        assert_eq!(
            qualify("SELECT * FROM sales.orders", "proj", Some("sales")).unwrap(),
            "SELECT * FROM sales.orders"
        );
        let full = "SELECT * FROM `other-proj.sales.orders` LIMIT 5";
        assert_eq!(qualify(full, "proj", Some("sales")).unwrap(), full);
    }

    #[test]
    fn bare_and_information_schema_rewrites_are_disjoint() {
        assert_eq!(
            qualify("SELECT * FROM sales.INFORMATION_SCHEMA.TABLES", "proj", Some("sales")).unwrap(),
            "SELECT * FROM `proj.sales.INFORMATION_SCHEMA.TABLES`"
        );
    }

    #[test]
    fn comment_after_from_is_not_a_table() {
        let sql = "SELECT * FROM -- pick\n orders";
        assert_eq!(qualify_bare_tables(sql, "proj", "sales"), sql);
        let sql = "SELECT * FROM\n-- pick\norders";
        assert_eq!(qualify_bare_tables(sql, "proj", "sales"), sql);
        assert_eq!(
            qualify_bare_tables("SELECT * FROM `2024_orders`", "proj", "sales"),
            "SELECT * FROM `proj.sales.2024_orders`"
        );
    }

    #[test]
    fn table_function_with_space_before_paren_left_alone() {
        let sql = "SELECT x FROM UNNEST ([1,2]) AS x";
        assert_eq!(qualify_bare_tables(sql, "proj", "sales"), sql);
        let sql = "SELECT x FROM UNNEST\n  ([1,2]) AS x";
        assert_eq!(qualify_bare_tables(sql, "proj", "sales"), sql);
        assert_eq!(
            qualify_bare_tables("SELECT * FROM orders WHERE id = 1", "proj", "sales"),
            "SELECT * FROM `proj.sales.orders` WHERE id = 1"
        );
    }

    #[test]
    fn subquery_from_is_qualified_but_join_is_not() {
        let sql = "SELECT * FROM (SELECT id FROM orders) o JOIN customers c ON o.id = c.id";
        assert_eq!(
            qualify_bare_tables(sql, "proj", "sales"),
            "SELECT * FROM (SELECT id FROM `proj.sales.orders`) o JOIN customers c ON o.id = c.id"
        );
    }

    #[test]
    fn table_functions_left_alone() {
        let sql = "SELECT x FROM UNNEST([1, 2, 3]) AS x";
        assert_eq!(qualify_bare_tables(sql, "proj", "sales"), sql);
    }

    #[test]
    fn from_inside_identifier_not_matched() {
        let sql = "SELECT date_from orders";
        assert_eq!(qualify_bare_tables(sql, "proj", "sales"), sql);
    }
}
