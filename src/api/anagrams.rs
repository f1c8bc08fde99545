use axum::{
    extract::State,
    response::Json,
};
use serde::Deserialize;

use crate::api::{ApiJson, DataResponse};
use crate::errors::ServiceError;
use crate::models::{AnagramResults, WordResult, WordVariation};
use crate::AppState;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnagramRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub include_shorter: Option<bool>,
}

pub async fn find_anagrams(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnagramRequest>,
) -> Result<Json<DataResponse<WordResult>>, ServiceError> {
    let query = request.query.unwrap_or_default();
    let rows = state.anagram_finder.find(&query).await?;
    Ok(Json(DataResponse::new(rows)))
}

pub async fn find_grouped_anagrams(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnagramRequest>,
) -> Result<Json<AnagramResults>, ServiceError> {
    let query = request.query.unwrap_or_default();
    let include_shorter = request.include_shorter.unwrap_or(true);
    let results = state
        .anagram_finder
        .find_grouped(&query, include_shorter)
        .await?;
    Ok(Json(results))
}

pub async fn find_word_variations(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnagramRequest>,
) -> Result<Json<DataResponse<WordVariation>>, ServiceError> {
    let pattern = request.query.unwrap_or_default();
    let rows = state.anagram_finder.find_variations(&pattern).await?;
    Ok(Json(DataResponse::new(rows)))
}
