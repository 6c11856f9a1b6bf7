use crate::{
    config::AppConfig,
    db,
    descriptor::SchemaDescriptor,
    engine::{
        NaturalLanguageQuery, NaturalLanguageResponse, OpportunityResponse, OpportunitySearch,
        SearchEngine, TemplateExecution, TemplateResponse,
    },
    error::{Result, ServiceError},
    gateway::PgExecutor,
    recorder::{SavedSearchPage, SearchRecorder},
    state::AppState,
    store::PgStore,
    translate::{ChatCompletionsClient, Translator},
};
use axum::{
    error_handling::HandleErrorLayer,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::{timeout::error::Elapsed, BoxError, ServiceBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub struct Server {
    config: Arc<AppConfig>,
    state: AppState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearchParams {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl Server {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect_pool(&config).await?;
        let config = Arc::new(config);

        if config.llm.api_key.is_none() {
            warn!("no language model credential configured; natural language queries use the rule translator");
        }
        let model = Arc::new(ChatCompletionsClient::new(config.llm.clone())?);
        let translator = Translator::new(model, SchemaDescriptor::properties());

        let store = Arc::new(PgStore::new(pool.clone()));
        let executor = Arc::new(PgExecutor::new(pool, config.max_rows));
        let engine = SearchEngine::new(
            &config,
            translator,
            executor,
            store.clone(),
            SearchRecorder::new(store),
        );
        let state = AppState::new(Arc::clone(&config), engine);

        Ok(Self { config, state })
    }

    pub fn from_state(state: AppState) -> Self {
        Self {
            config: Arc::clone(&state.config),
            state,
        }
    }

    pub fn router(&self) -> Router {
        let limit = self.config.request_timeout;
        Router::new()
            .route("/healthz", get(Self::health))
            .route("/api/natural-language-query", post(Self::natural_language))
            .route("/api/templates", get(Self::templates))
            .route("/api/templates/execute", post(Self::execute_template))
            .route("/api/opportunity-types", get(Self::opportunity_types))
            .route("/api/opportunities/find", post(Self::find_opportunities))
            .route("/api/saved-searches", get(Self::saved_searches))
            .with_state(self.state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                        timeout_error(err, limit)
                    }))
                    .timeout(limit),
            )
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.listen_addr;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "parcel query service listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    async fn health() -> Json<Value> {
        Json(json!({ "status": "ok" }))
    }

    async fn natural_language(
        State(state): State<AppState>,
        payload: std::result::Result<Json<NaturalLanguageQuery>, JsonRejection>,
    ) -> Result<Json<NaturalLanguageResponse>> {
        let Json(request) = payload.map_err(invalid_body)?;
        Ok(Json(state.engine.natural_language(request).await?))
    }

    async fn execute_template(
        State(state): State<AppState>,
        payload: std::result::Result<Json<TemplateExecution>, JsonRejection>,
    ) -> Result<Json<TemplateResponse>> {
        let Json(request) = payload.map_err(invalid_body)?;
        Ok(Json(state.engine.execute_template(request).await?))
    }

    async fn find_opportunities(
        State(state): State<AppState>,
        payload: std::result::Result<Json<OpportunitySearch>, JsonRejection>,
    ) -> Result<Json<OpportunityResponse>> {
        let Json(request) = payload.map_err(invalid_body)?;
        Ok(Json(state.engine.find_opportunities(request).await?))
    }

    async fn templates(State(state): State<AppState>) -> Result<Json<Value>> {
        let results = state.engine.templates().await?;
        Ok(Json(json!({ "results": results })))
    }

    async fn opportunity_types(State(state): State<AppState>) -> Result<Json<Value>> {
        let results = state.engine.opportunity_types().await?;
        Ok(Json(json!({ "results": results })))
    }

    async fn saved_searches(
        State(state): State<AppState>,
        params: std::result::Result<Query<SavedSearchParams>, QueryRejection>,
    ) -> Result<Json<SavedSearchPage>> {
        let Query(params) =
            params.map_err(|rejection| ServiceError::InvalidRequest(rejection.body_text()))?;
        let page = state
            .engine
            .saved_searches(
                params.user_id.as_deref().unwrap_or_default(),
                params.cursor.as_deref(),
                params.limit,
            )
            .await?;
        Ok(Json(page))
    }
}

/// An elapsed deadline becomes the usual JSON error body instead of an empty response.
fn timeout_error(err: BoxError, limit: Duration) -> ServiceError {
    if err.is::<Elapsed>() {
        warn!(?limit, "request timed out");
        ServiceError::Timeout(limit)
    } else {
        ServiceError::Internal(anyhow::anyhow!("middleware failure: {err}"))
    }
}

fn invalid_body(rejection: JsonRejection) -> ServiceError {
    ServiceError::InvalidRequest(rejection.body_text())
}
