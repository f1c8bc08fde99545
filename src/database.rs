use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::errors::DatabaseError;
use crate::models::{WordResult, WordVariation};

/// Stored functions exposed by the dictionary database.
#[async_trait]
pub trait WordDatabase: Send + Sync {
    /// Runs a generated SQL statement, or a letters-only anagram lookup.
    async fn execute_natural_query(&self, query_text: &str) -> Result<Vec<WordResult>, DatabaseError>;

    async fn find_exact_anagrams(&self, letters: &str) -> Result<Vec<WordResult>, DatabaseError>;

    async fn find_plus_one_letter(&self, letters: &str) -> Result<Vec<WordResult>, DatabaseError>;

    async fn find_shorter_words(&self, letters: &str) -> Result<Vec<WordResult>, DatabaseError>;

    async fn find_word_variations(&self, pattern: &str) -> Result<Vec<WordVariation>, DatabaseError>;
}

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    message: Option<String>,
    code: Option<String>,
    details: Option<String>,
}

fn rpc_error(status: reqwest::StatusCode, body: &str) -> DatabaseError {
    match serde_json::from_str::<RpcErrorBody>(body) {
        Ok(RpcErrorBody { message: Some(message), code, details }) => {
            let message = match details {
                Some(details) if !details.is_empty() => format!("{} ({})", message, details),
                _ => message,
            };
            DatabaseError::from_query_message(message, code)
        }
        _ => DatabaseError::from_query_message(format!("HTTP {}: {}", status, body), None),
    }
}

/// Calls the database's stored functions through `/rest/v1/rpc/{name}`.
pub struct PostgrestClient {
    client: Client,
    base_url: String,
    service_key: Option<String>,
}

impl PostgrestClient {
    pub fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DatabaseError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_role_key.clone(),
        })
    }

    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        function: &str,
        args: serde_json::Value,
    ) -> Result<Vec<T>, DatabaseError> {
        if self.base_url.is_empty() {
            return Err(DatabaseError::RequestFailed(
                "database url is not configured".to_string(),
            ));
        }

        let mut request = self
            .client
            .post(self.rpc_url(function))
            .header("Content-Type", "application/json")
            .json(&args);
        if let Some(key) = &self.service_key {
            request = request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| DatabaseError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DatabaseError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(rpc_error(status, &body));
        }

        // functions returning no rows may answer with an empty body
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body).map_err(|e| DatabaseError::Decode(e.to_string()))
    }
}

#[async_trait]
impl WordDatabase for PostgrestClient {
    async fn execute_natural_query(&self, query_text: &str) -> Result<Vec<WordResult>, DatabaseError> {
        self.rpc("execute_natural_query", json!({ "query_text": query_text })).await
    }

    async fn find_exact_anagrams(&self, letters: &str) -> Result<Vec<WordResult>, DatabaseError> {
        self.rpc("find_exact_anagrams", json!({ "query_text": letters })).await
    }

    async fn find_plus_one_letter(&self, letters: &str) -> Result<Vec<WordResult>, DatabaseError> {
        let rows: Vec<WordResult> = self
            .rpc("find_plus_one_letter", json!({ "query_text": letters }))
            .await?;
        Ok(rows.into_iter().map(|row| WordResult { is_exact: false, ..row }).collect())
    }

    async fn find_shorter_words(&self, letters: &str) -> Result<Vec<WordResult>, DatabaseError> {
        let rows: Vec<WordResult> = self
            .rpc("find_shorter_words", json!({ "query_text": letters }))
            .await?;
        Ok(rows.into_iter().map(|row| WordResult { is_exact: false, ..row }).collect())
    }

    async fn find_word_variations(&self, pattern: &str) -> Result<Vec<WordVariation>, DatabaseError> {
        self.rpc("find_word_variations", json!({ "input_text": pattern })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_rpc_error_from_postgrest_body() {
        let error = rpc_error(
            StatusCode::BAD_REQUEST,
            r#"{"code":"42703","details":null,"hint":null,"message":"column w.lenght does not exist"}"#,
        );
        match error {
            DatabaseError::Query { message, code } => {
                assert_eq!(message, "column w.lenght does not exist");
                assert_eq!(code.as_deref(), Some("42703"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rpc_error_timeout() {
        let error = rpc_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"code":"57014","message":"canceling statement due to statement timeout"}"#,
        );
        assert!(error.is_timeout());
    }

    #[test]
    fn test_rpc_error_non_json_body() {
        let error = rpc_error(StatusCode::BAD_GATEWAY, "upstream unavailable");
        assert_eq!(error.to_string(), "HTTP 502 Bad Gateway: upstream unavailable");
    }

    #[test]
    fn test_rpc_url() {
        let client = PostgrestClient::new(&DatabaseConfig {
            url: "https://abc.supabase.co/".to_string(),
            ..DatabaseConfig::default()
        })
        .unwrap();
        assert_eq!(
            client.rpc_url("find_exact_anagrams"),
            "https://abc.supabase.co/rest/v1/rpc/find_exact_anagrams"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_url_fails_without_request() {
        let client = PostgrestClient::new(&DatabaseConfig::default()).unwrap();
        let result = client.execute_natural_query("casa").await;
        assert!(matches!(result, Err(DatabaseError::RequestFailed(_))));
    }
}
