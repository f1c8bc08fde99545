use std::sync::Arc;

use crate::classifier::{classify, QueryKind};
use crate::config::{AppConfig, CacheKeyPolicy};
use crate::database::WordDatabase;
use crate::errors::{ProviderError, ServiceError};
use crate::llm::{ChatMessage, SqlGenerator};
use crate::models::WordResult;
use crate::prompts::{build_messages, check_select_only, extract_sql};
use crate::storage::Storage;

#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    pub cache_key_policy: CacheKeyPolicy,
    pub select_only: bool,
    pub learning_examples_in_prompt: usize,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            cache_key_policy: CacheKeyPolicy::Exact,
            select_only: true,
            learning_examples_in_prompt: 5,
        }
    }
}

impl From<&AppConfig> for TranslatorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            cache_key_policy: config.cache_key_policy,
            select_only: config.select_only,
            learning_examples_in_prompt: config.learning_examples_in_prompt,
        }
    }
}

/// A validated translation and the rows it produced.
#[derive(Debug, Clone)]
pub struct Translation {
    pub sql_query: String,
    pub rows: Vec<WordResult>,
    /// Served from the history cache, no model call made
    pub cached: bool,
    /// History row backing this translation, for feedback
    pub history_id: Option<i64>,
}

/// Natural language → validated SQL, reusing earlier successes.
pub struct QueryTranslator {
    generator: Arc<dyn SqlGenerator>,
    database: Arc<dyn WordDatabase>,
    storage: Arc<Storage>,
    settings: TranslatorSettings,
}

impl QueryTranslator {
    pub fn new(
        generator: Arc<dyn SqlGenerator>,
        database: Arc<dyn WordDatabase>,
        storage: Arc<Storage>,
        settings: TranslatorSettings,
    ) -> Self {
        Self {
            generator,
            database,
            storage,
            settings,
        }
    }

    pub fn settings(&self) -> &TranslatorSettings {
        &self.settings
    }

    pub async fn translate(
        &self,
        query: &str,
        previous_messages: &[ChatMessage],
    ) -> Result<Translation, ServiceError> {
        match classify(query)? {
            QueryKind::NaturalLanguage(_) => {}
            QueryKind::LettersOnly(_) => return Err(ServiceError::AnagramQuery),
            QueryKind::Wildcarded(_) => return Err(ServiceError::WildcardQuery),
        }

        let cache_key = self.settings.cache_key_policy.cache_key(query);
        if let Some(record) = self.storage.find_successful_translation(&cache_key).await? {
            log::debug!("[natural-to-sql] cache hit for '{}' (history #{})", cache_key, record.id);
            let rows = self.database.execute_natural_query(&record.sql_query).await?;
            return Ok(Translation {
                sql_query: record.sql_query,
                rows,
                cached: true,
                history_id: Some(record.id),
            });
        }
        log::debug!("[natural-to-sql] cache miss for '{}'", cache_key);

        let learned = self
            .storage
            .recent_learning_examples(self.settings.learning_examples_in_prompt)
            .await?;
        let messages = build_messages(query, previous_messages, &learned);

        let reply = self.generator.generate_sql(&messages).await?;
        let sql = extract_sql(&reply);
        if sql.is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "no SQL statement in model reply: {}",
                reply.trim()
            ))
            .into());
        }
        log::debug!("[natural-to-sql] generated SQL: {}", sql);

        if self.settings.select_only {
            if let Err(reason) = check_select_only(&sql) {
                log::warn!("[natural-to-sql] rejected generated SQL for '{}': {}", query, reason);
                self.record(query, &cache_key, &sql, false, Some(&reason)).await;
                return Err(ServiceError::InvalidSql(reason));
            }
        }

        match self.database.execute_natural_query(&sql).await {
            Ok(rows) => {
                let history_id = self.record(query, &cache_key, &sql, true, None).await;
                log::info!(
                    "[natural-to-sql] '{}' translated, {} rows",
                    query,
                    rows.len()
                );
                Ok(Translation {
                    sql_query: sql,
                    rows,
                    cached: false,
                    history_id,
                })
            }
            Err(error) => {
                let message = error.to_string();
                log::warn!("[natural-to-sql] validation failed for '{}': {}", query, message);
                self.record(query, &cache_key, &sql, false, Some(&message)).await;
                Err(error.into())
            }
        }
    }

    /// Appends to history. A failed write is logged and does not change the
    /// outcome of the translation.
    async fn record(
        &self,
        query: &str,
        cache_key: &str,
        sql: &str,
        successful: bool,
        error_message: Option<&str>,
    ) -> Option<i64> {
        match self
            .storage
            .record_translation(query, cache_key, sql, successful, error_message)
            .await
        {
            Ok(record) => Some(record.id),
            Err(e) => {
                log::error!("[natural-to-sql] failed to write history for '{}': {:#}", query, e);
                None
            }
        }
    }
}
