use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{self, Request, StatusCode},
    Router,
};
use chrono::Utc;
use parcel_query::{
    config::AppConfig,
    descriptor::SchemaDescriptor,
    engine::SearchEngine,
    error::{Result, ServiceError},
    gateway::{ExecutionError, QueryExecutor},
    models::{OpportunityType, QueryTemplate, SavedSearchRecord, SavedSearchRow},
    recorder::SearchRecorder,
    server::Server,
    state::AppState,
    store::{CatalogStore, SearchLog},
    translate::{LanguageModel, LlmError, Translator},
};
use serde::Serialize;
use serde_json::Value;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tower::ServiceExt;
use uuid::Uuid;

/// Executor that records every statement it is asked to run.
#[derive(Default)]
pub struct RecordingExecutor {
    pub calls: Mutex<Vec<String>>,
    rows: Vec<Value>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl RecordingExecutor {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str) -> std::result::Result<Vec<Value>, ExecutionError> {
        self.calls.lock().unwrap().push(sql.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(message) => Err(ExecutionError::new(message.clone(), sql)),
            None => Ok(self.rows.clone()),
        }
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    pub templates: Vec<QueryTemplate>,
    pub opportunities: Vec<OpportunityType>,
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn template(&self, id: &str) -> Result<Option<QueryTemplate>> {
        Ok(self.templates.iter().find(|t| t.id == id).cloned())
    }

    async fn templates(&self) -> Result<Vec<QueryTemplate>> {
        Ok(self.templates.clone())
    }

    async fn opportunity_type(&self, id: &str) -> Result<Option<OpportunityType>> {
        Ok(self.opportunities.iter().find(|o| o.id == id).cloned())
    }

    async fn opportunity_types(&self) -> Result<Vec<OpportunityType>> {
        Ok(self.opportunities.clone())
    }
}

#[derive(Default)]
pub struct MemoryLog {
    pub records: Mutex<Vec<SavedSearchRecord>>,
    fail: bool,
}

impl MemoryLog {
    pub fn records(&self) -> Vec<SavedSearchRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchLog for MemoryLog {
    async fn append(&self, record: SavedSearchRecord) -> Result<()> {
        if self.fail {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "relation \"saved_searches\" does not exist"
            )));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }

    async fn list(&self, caller_id: &str, offset: i64, limit: i64) -> Result<Vec<SavedSearchRow>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .rev()
            .filter(|record| record.caller_id.as_deref() == Some(caller_id))
            .skip(offset as usize)
            .take(limit as usize)
            .map(|record| SavedSearchRow {
                id: Uuid::new_v4(),
                caller_id: record.caller_id.clone(),
                display_name: record.display_name.clone(),
                query_kind: record.query_kind.as_str().to_string(),
                raw_text: record.raw_text.clone(),
                generated_sql: record.generated_sql.clone(),
                parameters: record.parameters.clone().map(Value::Object),
                result_count: record.result_count,
                created_at: Utc::now(),
            })
            .collect())
    }
}

/// Model that replays a fixed answer; `None` behaves like a missing credential.
struct ScriptedModel {
    reply: Option<String>,
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, _system: &str, _user: &str) -> std::result::Result<String, LlmError> {
        self.reply.clone().ok_or(LlmError::MissingCredential)
    }
}

#[derive(Default)]
pub struct HarnessBuilder {
    model_reply: Option<String>,
    rows: Vec<Value>,
    execution_error: Option<String>,
    execution_delay: Option<Duration>,
    request_timeout: Option<Duration>,
    failing_log: bool,
    catalog: MemoryCatalog,
}

impl HarnessBuilder {
    pub fn model_reply(mut self, reply: &str) -> Self {
        self.model_reply = Some(reply.to_string());
        self
    }

    pub fn rows(mut self, rows: Vec<Value>) -> Self {
        self.rows = rows;
        self
    }

    pub fn execution_error(mut self, message: &str) -> Self {
        self.execution_error = Some(message.to_string());
        self
    }

    pub fn execution_delay(mut self, delay: Duration) -> Self {
        self.execution_delay = Some(delay);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn failing_log(mut self) -> Self {
        self.failing_log = true;
        self
    }

    pub fn template(mut self, template: QueryTemplate) -> Self {
        self.catalog.templates.push(template);
        self
    }

    pub fn opportunity(mut self, opportunity: OpportunityType) -> Self {
        self.catalog.opportunities.push(opportunity);
        self
    }

    pub fn build(self) -> TestHarness {
        let mut config = AppConfig::embedded("postgres://unused@localhost/parcels".into());
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = timeout;
        }
        let config = Arc::new(config);
        let executor = Arc::new(RecordingExecutor {
            calls: Mutex::new(Vec::new()),
            rows: self.rows,
            failure: self.execution_error,
            delay: self.execution_delay,
        });
        let log = Arc::new(MemoryLog {
            records: Mutex::new(Vec::new()),
            fail: self.failing_log,
        });
        let translator = Translator::new(
            Arc::new(ScriptedModel {
                reply: self.model_reply,
            }),
            SchemaDescriptor::properties(),
        );
        let engine = SearchEngine::new(
            &config,
            translator,
            executor.clone(),
            Arc::new(self.catalog),
            SearchRecorder::new(log.clone()),
        );
        let router = Server::from_state(AppState::new(config, engine)).router();

        TestHarness {
            router,
            executor,
            log,
        }
    }
}

/// In-process router wired to in-memory executor, catalog and search log.
pub struct TestHarness {
    router: Router,
    pub executor: Arc<RecordingExecutor>,
    pub log: Arc<MemoryLog>,
}

impl TestHarness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    pub async fn post<T>(&self, path: &str, payload: &T) -> http::Response<Body>
    where
        T: Serialize,
    {
        let body = serde_json::to_vec(payload).expect("failed to serialize request payload");
        self.post_raw(path, body).await
    }

    pub async fn post_raw(&self, path: &str, body: impl Into<Body>) -> http::Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .expect("failed to build request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> http::Response<Body> {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("failed to build request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> http::Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should produce a response")
    }
}

pub async fn read_json(response: http::Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("response body should deserialize");
    let value =
        serde_json::from_slice::<Value>(&bytes).expect("response body should be valid JSON");
    (status, value)
}
