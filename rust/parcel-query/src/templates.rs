//! Parameter validation and `{{name}}` substitution for query templates.
//!
//! Values are rendered as SQL literals and spliced into the template text; they are not bound
//! parameters. The resolved statement still goes through the gate before execution.

use crate::{
    error::{Result, ServiceError},
    models::{ParamType, ParameterSpec, QueryTemplate},
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid placeholder regex")
});

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTemplate {
    pub sql: String,
    /// Supplied parameters after defaults and type coercion.
    pub parameters: Map<String, Value>,
}

pub fn resolve(template: &QueryTemplate, supplied: &Map<String, Value>) -> Result<ResolvedTemplate> {
    let parameters = validate(&template.parameter_schema, supplied)?;
    let sql = substitute(&template.sql_template, &parameters)?;
    Ok(ResolvedTemplate { sql, parameters })
}

fn validate<'a>(
    schema: impl IntoIterator<Item = (&'a String, &'a ParameterSpec)>,
    supplied: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut values = supplied.clone();

    for (name, spec) in schema {
        let value = match values.get(name).filter(|value| !value.is_null()) {
            Some(value) => coerce(name, spec.param_type, value)?,
            None => match &spec.default {
                Some(default) => default.clone(),
                None if spec.required => {
                    return Err(ServiceError::InvalidRequest(format!(
                        "missing required parameter '{name}'"
                    )));
                }
                None => continue,
            },
        };

        if let Some(allowed) = &spec.allowed {
            if !allowed.contains(&value) {
                return Err(ServiceError::InvalidRequest(format!(
                    "parameter '{name}' must be one of {}",
                    Value::Array(allowed.clone())
                )));
            }
        }

        values.insert(name.clone(), value);
    }

    Ok(values)
}

fn coerce(name: &str, declared: ParamType, value: &Value) -> Result<Value> {
    let mismatch = || {
        ServiceError::InvalidRequest(format!(
            "parameter '{name}' must be a {}",
            match declared {
                ParamType::String => "string",
                ParamType::Number => "number",
                ParamType::Boolean => "boolean",
            }
        ))
    };

    match (declared, value) {
        (ParamType::Number, Value::Number(_))
        | (ParamType::String, Value::String(_))
        | (ParamType::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (ParamType::Number, Value::String(raw)) => parse_number(raw.trim()).ok_or_else(mismatch),
        (ParamType::Boolean, Value::String(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },
        (ParamType::String, Value::Number(number)) => Ok(Value::String(number.to_string())),
        _ => Err(mismatch()),
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn substitute(template: &str, values: &Map<String, Value>) -> Result<String> {
    let mut unresolved: Vec<&str> = Vec::new();
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1).map(|m| m.as_str())) else {
            continue;
        };
        rendered.push_str(&template[last..whole.start()]);
        last = whole.end();

        match values.get(name) {
            Some(value) => rendered.push_str(&literal(name, value)?),
            None => {
                if !unresolved.contains(&name) {
                    unresolved.push(name);
                }
                rendered.push_str(whole.as_str());
            }
        }
    }
    rendered.push_str(&template[last..]);

    if !unresolved.is_empty() {
        return Err(ServiceError::InvalidRequest(format!(
            "unresolved template placeholders: {}",
            unresolved.join(", ")
        )));
    }

    Ok(rendered)
}

/// Renders one value as a SQL literal.
fn literal(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(true) => Ok("TRUE".to_string()),
        Value::Bool(false) => Ok("FALSE".to_string()),
        Value::Number(number) => Ok(number.to_string()),
        Value::String(text) => Ok(format!("'{}'", text.replace('\'', "''"))),
        Value::Array(_) | Value::Object(_) => Err(ServiceError::InvalidRequest(format!(
            "parameter '{name}' must be a scalar value"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn template(sql: &str, schema: Value) -> QueryTemplate {
        QueryTemplate {
            id: "t-1".into(),
            name: "Test".into(),
            description: None,
            category: None,
            sql_template: sql.into(),
            parameter_schema: serde_json::from_value::<BTreeMap<String, ParameterSpec>>(schema)
                .unwrap(),
        }
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn message(err: ServiceError) -> String {
        match err {
            ServiceError::InvalidRequest(message) => message,
            other => panic!("expected invalid request, got {other:?}"),
        }
    }

    #[test]
    fn strings_are_quoted_and_numbers_inlined() {
        let template = template(
            "SELECT * FROM properties WHERE borough_name = {{borough}} AND lotarea > {{min}}",
            json!({}),
        );
        let resolved = resolve(&template, &params(json!({"borough": "brooklyn", "min": 5}))).unwrap();
        assert_eq!(
            resolved.sql,
            "SELECT * FROM properties WHERE borough_name = 'brooklyn' AND lotarea > 5"
        );
    }

    #[test]
    fn single_quotes_are_doubled() {
        let template = template("SELECT * FROM properties WHERE ownernames = {{owner}}", json!({}));
        let resolved = resolve(&template, &params(json!({"owner": "O'Brien"}))).unwrap();
        assert!(resolved.sql.ends_with("= 'O''Brien'"));
    }

    #[test]
    fn booleans_and_nulls_render_as_keywords() {
        let template = template("SELECT {{flag}}, {{nothing}}", json!({}));
        let resolved =
            resolve(&template, &params(json!({"flag": true, "nothing": null}))).unwrap();
        assert_eq!(resolved.sql, "SELECT TRUE, NULL");
    }

    #[test]
    fn placeholders_tolerate_inner_whitespace() {
        let template = template("SELECT * FROM properties LIMIT {{ n }}", json!({}));
        let resolved = resolve(&template, &params(json!({"n": 10}))).unwrap();
        assert_eq!(resolved.sql, "SELECT * FROM properties LIMIT 10");
    }

    #[test]
    fn unresolved_placeholders_are_rejected() {
        let template = template(
            "SELECT * FROM properties WHERE borough = {{borough}} AND zonedist1 = {{zone}} OR x = {{zone}}",
            json!({}),
        );
        let err = resolve(&template, &params(json!({"borough": "BK"}))).unwrap_err();
        assert_eq!(message(err), "unresolved template placeholders: zone");
    }

    #[test]
    fn missing_required_parameter_is_rejected() {
        let template = template(
            "SELECT * FROM properties WHERE borough = {{borough}}",
            json!({"borough": {"type": "string", "required": true}}),
        );
        let err = resolve(&template, &Map::new()).unwrap_err();
        assert_eq!(message(err), "missing required parameter 'borough'");
    }

    #[test]
    fn defaults_fill_absent_parameters() {
        let template = template(
            "SELECT * FROM properties WHERE lotarea > {{min_area}}",
            json!({"min_area": {"type": "number", "required": true, "default": 2500}}),
        );
        let resolved = resolve(&template, &Map::new()).unwrap();
        assert_eq!(resolved.sql, "SELECT * FROM properties WHERE lotarea > 2500");
        assert_eq!(resolved.parameters["min_area"], json!(2500));
    }

    #[test]
    fn enum_violations_are_rejected() {
        let template = template(
            "SELECT * FROM properties WHERE borough = {{borough}}",
            json!({"borough": {"type": "string", "enum": ["BK", "MN"]}}),
        );
        assert!(resolve(&template, &params(json!({"borough": "MN"}))).is_ok());

        let err = resolve(&template, &params(json!({"borough": "QN"}))).unwrap_err();
        assert!(message(err).starts_with("parameter 'borough' must be one of"));
    }

    #[test]
    fn declared_numbers_accept_numeric_strings_only() {
        let template = template(
            "SELECT * FROM properties WHERE lotarea > {{min_area}}",
            json!({"min_area": {"type": "number"}}),
        );
        let resolved = resolve(&template, &params(json!({"min_area": "7500"}))).unwrap();
        assert_eq!(resolved.sql, "SELECT * FROM properties WHERE lotarea > 7500");

        let err = resolve(&template, &params(json!({"min_area": "1; DROP TABLE x"}))).unwrap_err();
        assert_eq!(message(err), "parameter 'min_area' must be a number");
    }

    #[test]
    fn composite_values_are_rejected() {
        let template = template("SELECT * FROM properties WHERE borough IN ({{list}})", json!({}));
        let err = resolve(&template, &params(json!({"list": ["BK", "QN"]}))).unwrap_err();
        assert_eq!(message(err), "parameter 'list' must be a scalar value");
    }
}
