use crate::{config::AppConfig, engine::SearchEngine};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: SearchEngine,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, engine: SearchEngine) -> Self {
        Self { config, engine }
    }
}
