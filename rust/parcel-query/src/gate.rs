//! SELECT-only gate and row bound applied to every statement before execution.
//!
//! The gate does not parse the statement body. Values spliced into SQL text upstream
//! (borough codes, zoning tokens, thresholds, template strings) are not re-checked here;
//! binding them as parameters is the outstanding hardening work for this service.

use crate::{
    config::ROW_LIMIT_CEILING,
    error::{Result, ServiceError},
};
use once_cell::sync::Lazy;
use regex::Regex;

static TRAILING_LIMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\blimit\s+(\d+|all)(\s+offset\s+\d+)?\s*$").expect("valid limit regex")
});

/// Returns the statement ready for execution, or rejects it when it is not a SELECT.
pub fn gate(sql: &str, max_rows: i64) -> Result<String> {
    let max_rows = max_rows.clamp(1, ROW_LIMIT_CEILING);
    let statement = statement_body(sql);

    if !starts_with_select(statement) {
        return Err(ServiceError::SqlNotSelect {
            sql: sql.trim().to_string(),
        });
    }

    Ok(bound_rows(statement, max_rows))
}

/// Statement without surrounding whitespace, trailing `;` or trailing `--` comments.
fn statement_body(sql: &str) -> &str {
    let mut statement = sql.trim().trim_end_matches(';').trim_end();
    while let Some(start) = trailing_line_comment(statement) {
        statement = statement[..start].trim_end().trim_end_matches(';').trim_end();
    }
    statement
}

/// Start of a `--` comment that runs to the end of the text, skipping quoted literals.
fn trailing_line_comment(sql: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    let mut in_literal = false;
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\'' => in_literal = !in_literal,
            b'-' if !in_literal && bytes.get(idx + 1) == Some(&b'-') => {
                match sql[idx..].find('\n') {
                    Some(newline) => idx += newline,
                    None => return Some(idx),
                }
            }
            _ => {}
        }
        idx += 1;
    }
    None
}

pub fn starts_with_select(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("select"))
}

fn bound_rows(statement: &str, max_rows: i64) -> String {
    let Some(caps) = TRAILING_LIMIT.captures(statement) else {
        return format!("{statement} LIMIT {max_rows}");
    };

    let within_bound = caps[1]
        .parse::<i64>()
        .map(|value| value <= max_rows)
        .unwrap_or(false);
    if within_bound {
        return statement.to_string();
    }

    let whole = caps.get(0).map_or(statement.len(), |m| m.start());
    let offset = caps.get(2).map_or("", |m| m.as_str());
    format!("{}LIMIT {max_rows}{offset}", &statement[..whole])
}

/// Value of the trailing `LIMIT` clause, if any.
pub fn trailing_limit(sql: &str) -> Option<i64> {
    let statement = statement_body(sql);
    TRAILING_LIMIT
        .captures(statement)
        .and_then(|caps| caps[1].parse().ok())
}
