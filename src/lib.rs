pub mod anagrams;
pub mod api;
pub mod classifier;
pub mod config;
pub mod database;
pub mod errors;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod storage;
pub mod testing;
pub mod translator;

use axum::{
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::anagrams::AnagramFinder;
use crate::config::AppConfig;
use crate::database::WordDatabase;
use crate::llm::SqlGenerator;
use crate::storage::Storage;
use crate::translator::{QueryTranslator, TranslatorSettings};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<Storage>,
    pub translator: Arc<QueryTranslator>,
    pub anagram_finder: Arc<AnagramFinder>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        storage: Arc<Storage>,
        generator: Arc<dyn SqlGenerator>,
        database: Arc<dyn WordDatabase>,
    ) -> Self {
        let translator = Arc::new(QueryTranslator::new(
            generator,
            database.clone(),
            storage.clone(),
            TranslatorSettings::from(config.as_ref()),
        ));
        let anagram_finder = Arc::new(AnagramFinder::new(database));

        Self {
            config,
            storage,
            translator,
            anagram_finder,
        }
    }
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "buscapalabras-backend"
    }))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/natural-to-sql", post(api::natural_to_sql::natural_to_sql))
        .route("/anagrams", post(api::anagrams::find_anagrams))
        .route("/anagrams/grouped", post(api::anagrams::find_grouped_anagrams))
        .route("/word-variations", post(api::anagrams::find_word_variations))
        .route("/search", post(api::search::search))
        .route("/feedback", post(api::curation::submit_feedback))
        .route("/feedback/:query_id", get(api::curation::list_feedback))
        .route(
            "/learning-examples",
            get(api::curation::list_learning_examples).post(api::curation::approve_example),
        )
        .route("/query-history", get(api::curation::list_history))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
