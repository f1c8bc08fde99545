use axum::{
    extract::State,
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::api::ApiJson;
use crate::classifier::{classify, QueryKind};
use crate::errors::ServiceError;
use crate::llm::ChatMessage;
use crate::models::{WordResult, WordVariation};
use crate::AppState;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub previous_messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchResponse {
    Anagram {
        data: Vec<WordResult>,
    },
    Wildcard {
        data: Vec<WordVariation>,
    },
    #[serde(rename_all = "camelCase")]
    Natural {
        sql_query: String,
        data: Vec<WordResult>,
        cached: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        query_id: Option<i64>,
    },
}

/// Single entry point: letters go to the anagram lookup, patterns to the
/// variation lookup, everything else through translation.
pub async fn search(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SearchRequest>,
) -> Result<Json<SearchResponse>, ServiceError> {
    let query = request.query.unwrap_or_default();
    let kind = classify(&query)?;
    log::info!("[search] '{}' classified as {}", kind.as_str(), kind.label());

    let response = match kind {
        QueryKind::LettersOnly(letters) => SearchResponse::Anagram {
            data: state.anagram_finder.find(&letters).await?,
        },
        QueryKind::Wildcarded(pattern) => SearchResponse::Wildcard {
            data: state.anagram_finder.find_variations(&pattern).await?,
        },
        QueryKind::NaturalLanguage(_) => {
            let translation = state
                .translator
                .translate(&query, &request.previous_messages)
                .await?;
            SearchResponse::Natural {
                sql_query: translation.sql_query,
                data: translation.rows,
                cached: translation.cached,
                query_id: translation.history_id,
            }
        }
    };

    Ok(Json(response))
}
