use axum::{
    extract::State,
    response::Json,
};
use serde::{Deserialize, Serialize};

use crate::api::ApiJson;
use crate::errors::ServiceError;
use crate::llm::ChatMessage;
use crate::models::WordResult;
use crate::translator::Translation;
use crate::AppState;

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NaturalToSqlRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub previous_messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NaturalToSqlResponse {
    pub sql_query: String,
    pub data: Vec<WordResult>,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<i64>,
}

impl From<Translation> for NaturalToSqlResponse {
    fn from(translation: Translation) -> Self {
        Self {
            sql_query: translation.sql_query,
            data: translation.rows,
            cached: translation.cached,
            query_id: translation.history_id,
        }
    }
}

pub async fn natural_to_sql(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NaturalToSqlRequest>,
) -> Result<Json<NaturalToSqlResponse>, ServiceError> {
    let query = request.query.unwrap_or_default();
    log::info!("[natural-to-sql] processing query: '{}'", query);

    let translation = state
        .translator
        .translate(&query, &request.previous_messages)
        .await?;

    Ok(Json(translation.into()))
}
