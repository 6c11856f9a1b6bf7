//! Domain and row types shared by the translators, executors and the table store.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub text: String,
    pub caller_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationSource {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationResult {
    pub sql: String,
    pub explanation: String,
    pub source: TranslationSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTemplate {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub sql_template: String,
    pub parameter_schema: BTreeMap<String, ParameterSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpportunityType {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub criteria: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    NaturalLanguage,
    Template,
    Opportunity,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::NaturalLanguage => "natural_language",
            QueryKind::Template => "template",
            QueryKind::Opportunity => "opportunity",
        }
    }
}

/// Audit entry written after a successful execution.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedSearchRecord {
    pub caller_id: Option<String>,
    pub display_name: String,
    pub query_kind: QueryKind,
    pub raw_text: Option<String>,
    pub generated_sql: Option<String>,
    pub parameters: Option<Map<String, Value>>,
    pub result_count: i64,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::query_templates)]
pub struct QueryTemplateRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub sql_template: String,
    pub parameter_schema: Option<Value>,
}

impl QueryTemplateRow {
    pub fn into_template(self) -> Result<QueryTemplate, serde_json::Error> {
        let parameter_schema = match self.parameter_schema {
            Some(Value::Null) | None => BTreeMap::new(),
            Some(value) => serde_json::from_value(value)?,
        };

        Ok(QueryTemplate {
            id: self.id,
            name: self.name,
            description: self.description,
            category: self.category,
            sql_template: self.sql_template,
            parameter_schema,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::opportunity_types)]
pub struct OpportunityTypeRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub criteria: String,
}

impl From<OpportunityTypeRow> for OpportunityType {
    fn from(row: OpportunityTypeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            criteria: row.criteria,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::saved_searches)]
pub struct NewSavedSearchRow {
    pub id: Uuid,
    pub caller_id: Option<String>,
    pub display_name: String,
    pub query_kind: String,
    pub raw_text: Option<String>,
    pub generated_sql: Option<String>,
    pub parameters: Option<Value>,
    pub result_count: i64,
}

impl From<SavedSearchRecord> for NewSavedSearchRow {
    fn from(record: SavedSearchRecord) -> Self {
        Self {
            id: Uuid::new_v4(),
            caller_id: record.caller_id,
            display_name: record.display_name,
            query_kind: record.query_kind.as_str().to_string(),
            raw_text: record.raw_text,
            generated_sql: record.generated_sql,
            parameters: record.parameters.map(Value::Object),
            result_count: record.result_count,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = crate::schema::saved_searches)]
pub struct SavedSearchRow {
    pub id: Uuid,
    pub caller_id: Option<String>,
    pub display_name: String,
    pub query_kind: String,
    pub raw_text: Option<String>,
    pub generated_sql: Option<String>,
    pub parameters: Option<Value>,
    pub result_count: i64,
    pub created_at: DateTime<Utc>,
}
