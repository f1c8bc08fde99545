use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use crate::api::{ApiJson, ApiPath, ApiQuery, DataResponse};
use crate::errors::ServiceError;
use crate::models::{
    FeedbackType, LearningExample, NewFeedback, NewLearningExample, QueryFeedback,
    TranslationRecord,
};
use crate::prompts::check_select_only;
use crate::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;

fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).max(1).min(200)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub query_id: i64,
    pub was_helpful: bool,
    pub feedback_type: FeedbackType,
    #[serde(default)]
    pub user_comment: Option<String>,
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FeedbackRequest>,
) -> Result<(StatusCode, Json<QueryFeedback>), ServiceError> {
    let feedback = state
        .storage
        .add_feedback(NewFeedback {
            query_id: request.query_id,
            was_helpful: request.was_helpful,
            feedback_type: request.feedback_type,
            user_comment: non_blank(request.user_comment),
        })
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("No existe la consulta {}", request.query_id))
        })?;

    log::info!(
        "[feedback] query #{}: {} ({})",
        feedback.query_id,
        feedback.feedback_type.as_str(),
        if feedback.was_helpful { "helpful" } else { "not helpful" }
    );
    Ok((StatusCode::CREATED, Json(feedback)))
}

pub async fn list_feedback(
    State(state): State<AppState>,
    ApiPath(query_id): ApiPath<i64>,
) -> Result<Json<DataResponse<QueryFeedback>>, ServiceError> {
    let feedback = state.storage.feedback_for_query(query_id).await?;
    Ok(Json(DataResponse::new(feedback)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningExampleRequest {
    #[serde(default)]
    pub original_query: String,
    #[serde(default)]
    pub successful_sql: String,
    #[serde(default)]
    pub conversation_context: serde_json::Value,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub approved_by: Option<String>,
}

/// Super-user approval of a translation as a prompt example.
pub async fn approve_example(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LearningExampleRequest>,
) -> Result<(StatusCode, Json<LearningExample>), ServiceError> {
    let original_query = request.original_query.trim().to_string();
    let successful_sql = request.successful_sql.trim().to_string();
    if original_query.is_empty() || successful_sql.is_empty() {
        return Err(ServiceError::BadRequest(
            "originalQuery y successfulSql son obligatorios".to_string(),
        ));
    }
    if state.config.select_only {
        check_select_only(&successful_sql).map_err(ServiceError::InvalidSql)?;
    }

    let conversation_context = match request.conversation_context {
        serde_json::Value::Null => serde_json::json!([]),
        context => context,
    };

    let example = state
        .storage
        .add_learning_example(NewLearningExample {
            original_query,
            successful_sql,
            conversation_context,
            notes: non_blank(request.notes),
            approved_by: non_blank(request.approved_by),
        })
        .await?;

    log::info!("[learning] approved example #{}: '{}'", example.id, example.original_query);
    Ok((StatusCode::CREATED, Json(example)))
}

#[derive(Deserialize, Default)]
pub struct ListParams {
    pub limit: Option<usize>,
    pub successful: Option<bool>,
}

pub async fn list_learning_examples(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<DataResponse<LearningExample>>, ServiceError> {
    let examples = state
        .storage
        .recent_learning_examples(clamp_limit(params.limit))
        .await?;
    Ok(Json(DataResponse::new(examples)))
}

pub async fn list_history(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<DataResponse<TranslationRecord>>, ServiceError> {
    let records = state
        .storage
        .recent_translations(clamp_limit(params.limit), params.successful)
        .await?;
    Ok(Json(DataResponse::new(records)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1000)), 200);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ".to_string())), None);
        assert_eq!(non_blank(Some(" útil ".to_string())), Some("útil".to_string()));
        assert_eq!(non_blank(None), None);
    }
}
