//! Request pipeline shared by the three query paths: build SQL, gate, execute, record.

use crate::{
    config::AppConfig,
    descriptor::SchemaDescriptor,
    error::{Result, ServiceError},
    gate::gate,
    gateway::QueryExecutor,
    models::{
        OpportunityType, QueryKind, QueryTemplate, SavedSearchRecord, TranslationRequest,
        TranslationSource,
    },
    opportunity, templates,
    recorder::{SavedSearchPage, SearchRecorder},
    store::CatalogStore,
    translate::Translator,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

const DISPLAY_NAME_CHARS: usize = 80;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NaturalLanguageQuery {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NaturalLanguageResponse {
    pub results: Vec<Value>,
    pub count: usize,
    pub explanation: String,
    pub sql: String,
    pub source: TranslationSource,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateExecution {
    pub template_id: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TemplateResponse {
    pub results: Vec<Value>,
    pub count: usize,
    pub sql: String,
    pub template: QueryTemplate,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunitySearch {
    pub opportunity_type_id: String,
    #[serde(default, alias = "region")]
    pub borough: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpportunityResponse {
    pub results: Vec<Value>,
    pub count: usize,
    pub sql: String,
    pub opportunity: OpportunityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub borough: Option<&'static str>,
}

#[derive(Clone)]
pub struct SearchEngine {
    translator: Translator,
    executor: Arc<dyn QueryExecutor>,
    catalog: Arc<dyn CatalogStore>,
    recorder: SearchRecorder,
    descriptor: SchemaDescriptor,
    max_rows: i64,
}

impl SearchEngine {
    pub fn new(
        config: &AppConfig,
        translator: Translator,
        executor: Arc<dyn QueryExecutor>,
        catalog: Arc<dyn CatalogStore>,
        recorder: SearchRecorder,
    ) -> Self {
        Self {
            translator,
            executor,
            catalog,
            recorder,
            descriptor: SchemaDescriptor::properties(),
            max_rows: config.max_rows,
        }
    }

    pub async fn natural_language(
        &self,
        request: NaturalLanguageQuery,
    ) -> Result<NaturalLanguageResponse> {
        let text = request.query.trim();
        if text.is_empty() {
            return Err(ServiceError::InvalidRequest("query must not be empty".into()));
        }

        let translation = self
            .translator
            .translate(&TranslationRequest {
                text: text.to_string(),
                caller_id: request.user_id.clone(),
            })
            .await;
        let sql = self.gated(&translation.sql)?;
        let results = self.run(&sql).await?;
        info!(
            source = ?translation.source,
            rows = results.len(),
            "natural language query executed"
        );

        self.recorder
            .record(SavedSearchRecord {
                caller_id: request.user_id,
                display_name: display_name(text),
                query_kind: QueryKind::NaturalLanguage,
                raw_text: Some(text.to_string()),
                generated_sql: Some(sql.clone()),
                parameters: None,
                result_count: results.len() as i64,
            })
            .await;

        Ok(NaturalLanguageResponse {
            count: results.len(),
            results,
            explanation: translation.explanation,
            sql,
            source: translation.source,
        })
    }

    pub async fn execute_template(&self, request: TemplateExecution) -> Result<TemplateResponse> {
        let template = self
            .catalog
            .template(&request.template_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("template '{}'", request.template_id))
            })?;

        let resolved = templates::resolve(&template, &request.parameters)?;
        let sql = self.gated(&resolved.sql)?;
        let results = self.run(&sql).await?;
        info!(template_id = %template.id, rows = results.len(), "template executed");

        self.recorder
            .record(SavedSearchRecord {
                caller_id: request.user_id,
                display_name: template.name.clone(),
                query_kind: QueryKind::Template,
                raw_text: None,
                generated_sql: Some(sql.clone()),
                parameters: Some(resolved.parameters),
                result_count: results.len() as i64,
            })
            .await;

        Ok(TemplateResponse {
            count: results.len(),
            results,
            sql,
            template,
        })
    }

    pub async fn find_opportunities(
        &self,
        request: OpportunitySearch,
    ) -> Result<OpportunityResponse> {
        let borough = opportunity::resolve_region(request.borough.as_deref())?;
        let found = self
            .catalog
            .opportunity_type(&request.opportunity_type_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "opportunity type '{}'",
                    request.opportunity_type_id
                ))
            })?;

        let sql = self.gated(&opportunity::build_sql(&self.descriptor, &found, borough))?;
        let results = self.run(&sql).await?;
        info!(opportunity_id = %found.id, rows = results.len(), "opportunity search executed");

        let display_name = match borough {
            Some(borough) => format!("{} in {}", found.name, borough.name),
            None => found.name.clone(),
        };
        let parameters = borough.map(|borough| {
            let mut map = Map::new();
            map.insert("borough".into(), Value::String(borough.code.into()));
            map
        });
        self.recorder
            .record(SavedSearchRecord {
                caller_id: request.user_id,
                display_name,
                query_kind: QueryKind::Opportunity,
                raw_text: None,
                generated_sql: Some(sql.clone()),
                parameters,
                result_count: results.len() as i64,
            })
            .await;

        Ok(OpportunityResponse {
            count: results.len(),
            results,
            sql,
            opportunity: found,
            borough: borough.map(|borough| borough.code),
        })
    }

    pub async fn templates(&self) -> Result<Vec<QueryTemplate>> {
        self.catalog.templates().await
    }

    pub async fn opportunity_types(&self) -> Result<Vec<OpportunityType>> {
        self.catalog.opportunity_types().await
    }

    pub async fn saved_searches(
        &self,
        caller_id: &str,
        cursor: Option<&str>,
        limit: Option<i64>,
    ) -> Result<SavedSearchPage> {
        self.recorder.history(caller_id, cursor, limit).await
    }

    fn gated(&self, sql: &str) -> Result<String> {
        gate(sql, self.max_rows).inspect_err(|err| {
            warn!(error = %err, sql = err.sql(), "statement rejected by the SELECT gate");
        })
    }

    async fn run(&self, sql: &str) -> Result<Vec<Value>> {
        self.executor
            .execute(sql)
            .await
            .map_err(|err| ServiceError::Execution {
                message: err.message,
                sql: err.sql,
            })
    }
}

fn display_name(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(DISPLAY_NAME_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
