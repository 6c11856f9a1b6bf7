//! Recovers `{sql, explanation}` from free-form model output.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_EXPLANATION: &str = "Generated a query from your description.";

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)```").expect("valid json fence regex"));
static BARE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[a-zA-Z]*\s*(.*?)```").expect("valid fence regex"));
static SQL_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)"sql"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid sql field regex")
});
static EXPLANATION_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)"explanation"\s*:\s*"((?:[^"\\]|\\.)*)""#)
        .expect("valid explanation field regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub sql: String,
    pub explanation: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("model output contained no sql field")]
    NoSql,
}

/// Shapes of model output, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    JsonFence,
    BareFence,
    BraceObject,
}

pub const STRATEGIES: [Strategy; 3] = [Strategy::JsonFence, Strategy::BareFence, Strategy::BraceObject];

trait TryExtract {
    fn try_extract<'a>(&self, text: &'a str) -> Option<&'a str>;
}

impl TryExtract for Strategy {
    fn try_extract<'a>(&self, text: &'a str) -> Option<&'a str> {
        match self {
            Strategy::JsonFence => JSON_FENCE
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim()),
            Strategy::BareFence => BARE_FENCE
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim()),
            Strategy::BraceObject => first_object(text),
        }
        .filter(|candidate| !candidate.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    sql: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

pub fn extract(text: &str) -> Result<Extracted, ExtractError> {
    for strategy in STRATEGIES {
        let Some(candidate) = strategy.try_extract(text) else {
            continue;
        };
        if let Ok(payload) = serde_json::from_str::<Payload>(candidate) {
            if let Some(found) = finish(payload.sql, payload.explanation) {
                return Ok(found);
            }
        }
    }

    let sql = capture_field(&SQL_FIELD, text);
    let explanation = capture_field(&EXPLANATION_FIELD, text);
    finish(sql, explanation).ok_or(ExtractError::NoSql)
}

fn finish(sql: Option<String>, explanation: Option<String>) -> Option<Extracted> {
    let sql = sql.map(|sql| sql.trim().to_string()).filter(|sql| !sql.is_empty())?;
    let explanation = explanation
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());
    Some(Extracted { sql, explanation })
}

fn capture_field(pattern: &Regex, text: &str) -> Option<String> {
    let raw = pattern.captures(text)?.get(1)?.as_str();
    // The capture is the body of a JSON string literal; decode its escapes when possible.
    Some(serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string()))
}

/// First balanced `{ ... }` span, skipping braces inside string literals.
fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape = false;

    for (idx, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escape => escape = false,
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + idx + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
