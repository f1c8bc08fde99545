/*!
 * Error types for the word-search service.
 *
 * Upstream failures are split by collaborator (language model, word
 * database); `ServiceError` is what the handlers return and what gets
 * rendered into the JSON error envelope.
 */

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors from the chat-completion API
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Language model API key is not configured")]
    MissingApiKey,

    #[error("Language model request failed: {0}")]
    RequestFailed(String),

    #[error("Language model responded with error: {status_code} - {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Invalid language model response: {0}")]
    InvalidResponse(String),
}

/// Errors from the word database RPC layer
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database request failed: {0}")]
    RequestFailed(String),

    #[error("{message}")]
    Query { message: String, code: Option<String> },

    #[error("{0}")]
    Timeout(String),

    #[error("Failed to decode database response: {0}")]
    Decode(String),
}

/// SQLSTATE for `query_canceled`, raised by Postgres on statement_timeout.
const QUERY_CANCELED: &str = "57014";

impl DatabaseError {
    /// Builds a query error, recognising Postgres statement timeouts.
    pub fn from_query_message(message: impl Into<String>, code: Option<String>) -> Self {
        let message = message.into();
        if code.as_deref() == Some(QUERY_CANCELED)
            || message.to_lowercase().contains("statement timeout")
        {
            DatabaseError::Timeout(message)
        } else {
            DatabaseError::Query { message, code }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DatabaseError::Timeout(_))
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("No se proporcionó una consulta")]
    EmptyQuery,

    #[error("La consulta solo puede contener letras: '{0}'")]
    InvalidCharacters(String),

    #[error("Las consultas de anagramas deben usar el endpoint /anagrams")]
    AnagramQuery,

    #[error("Las búsquedas con comodines deben usar el endpoint /word-variations")]
    WildcardQuery,

    #[error("La petición no es válida")]
    InvalidRequest(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("No se pudo traducir la consulta")]
    Translation(#[from] ProviderError),

    #[error("La consulta generada no es válida")]
    InvalidSql(String),

    #[error("Error al ejecutar la consulta")]
    Execution(DatabaseError),

    #[error("La consulta tardó demasiado. Intenta acotar tu búsqueda.")]
    Timeout(String),

    #[error("Error interno del servidor")]
    Storage(String),
}

impl From<DatabaseError> for ServiceError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::Timeout(message) => ServiceError::Timeout(message),
            other => ServiceError::Execution(other),
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServiceError {
    fn from(rejection: QueryRejection) -> Self {
        ServiceError::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        ServiceError::InvalidRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(error: anyhow::Error) -> Self {
        ServiceError::Storage(format!("{:#}", error))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub details: String,
    pub timestamp: String,
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::EmptyQuery
            | ServiceError::InvalidCharacters(_)
            | ServiceError::AnagramQuery
            | ServiceError::WildcardQuery
            | ServiceError::InvalidRequest(_)
            | ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Translation(_) => StatusCode::BAD_GATEWAY,
            ServiceError::InvalidSql(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Execution(_) | ServiceError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Raw underlying error text for the envelope's `details` field.
    pub fn details(&self) -> String {
        match self {
            ServiceError::Translation(e) => e.to_string(),
            ServiceError::Execution(e) => e.to_string(),
            ServiceError::InvalidSql(reason)
            | ServiceError::InvalidRequest(reason)
            | ServiceError::Timeout(reason)
            | ServiceError::Storage(reason) => reason.clone(),
            other => other.to_string(),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.to_string(),
            details: self.details(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}: {}", self, self.details());
        } else {
            log::debug!("Rejected request: {}", self);
        }
        (status, Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_timeout_is_detected_by_message() {
        let error = DatabaseError::from_query_message(
            "canceling statement due to statement timeout",
            None,
        );
        assert!(error.is_timeout());
    }

    #[test]
    fn test_statement_timeout_is_detected_by_code() {
        let error = DatabaseError::from_query_message("canceled", Some("57014".to_string()));
        assert!(error.is_timeout());
    }

    #[test]
    fn test_plain_query_error_is_not_timeout() {
        let error = DatabaseError::from_query_message(
            "column \"foo\" does not exist",
            Some("42703".to_string()),
        );
        assert!(!error.is_timeout());
        assert_eq!(error.to_string(), "column \"foo\" does not exist");
    }

    #[test]
    fn test_timeout_remapped_to_user_message() {
        let error: ServiceError =
            DatabaseError::Timeout("canceling statement due to statement timeout".to_string()).into();

        assert_eq!(error.status_code(), StatusCode::GATEWAY_TIMEOUT);
        let envelope = error.envelope();
        assert!(envelope.error.contains("tardó demasiado"));
        assert_eq!(envelope.details, "canceling statement due to statement timeout");
        assert!(!envelope.timestamp.is_empty());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ServiceError::EmptyQuery.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServiceError::Translation(ProviderError::MissingApiKey).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::InvalidSql("DROP".to_string()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::from(DatabaseError::RequestFailed("refused".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_request_errors_keep_the_reason_in_details() {
        let error = ServiceError::InvalidRequest("missing field `queryId`".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        let envelope = error.envelope();
        assert_eq!(envelope.error, "La petición no es válida");
        assert_eq!(envelope.details, "missing field `queryId`");

        assert_eq!(ServiceError::WildcardQuery.status_code(), StatusCode::BAD_REQUEST);
        assert!(ServiceError::WildcardQuery.to_string().contains("/word-variations"));
    }

    #[test]
    fn test_translation_details_carry_provider_message() {
        let error = ServiceError::Translation(ProviderError::ApiError {
            status_code: 401,
            message: "bad key".to_string(),
        });
        assert_eq!(error.details(), "Language model responded with error: 401 - bad key");
    }
}
