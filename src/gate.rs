// BigQuery MCP Gateway - Gate (Read-Only Enforcement Point)
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Every query passes through here before qualification. A mutating keyword
// anywhere in the text blocks the call: inside string literals and comments
// too. Word boundaries keep identifiers like `dropdown_count` legal.
// Encoded or comment-split keywords are not caught.

use crate::error::QualificationError;
use regex::Regex;
use std::sync::OnceLock;

/// Statements that can change data, schema, permissions or transactions
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER", "MERGE",
    "TRUNCATE", "GRANT", "REVOKE", "EXECUTE", "BEGIN", "COMMIT", "ROLLBACK",
];

fn forbidden_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"(?i)\b({})\b", FORBIDDEN_KEYWORDS.join("|"));
        Regex::new(&pattern).expect("valid regex")
    })
}

/// First forbidden keyword in the text, uppercased.
pub fn forbidden_keyword(sql: &str) -> Option<String> {
    forbidden_pattern()
        .captures(sql)
        .map(|caps| caps[1].to_ascii_uppercase())
}

/// Reject the query if it contains any forbidden keyword.
pub fn check(sql: &str) -> Result<(), QualificationError> {
    match forbidden_keyword(sql) {
        Some(keyword) => {
            log::warn!("Gate blocked query containing {}", keyword);
            Err(QualificationError::ForbiddenStatement { keyword })
        }
        None => Ok(()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
