use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use dirs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache_key_policy: CacheKeyPolicy,
    #[serde(default = "default_select_only")]
    pub select_only: bool,
    #[serde(default = "default_learning_examples_in_prompt")]
    pub learning_examples_in_prompt: usize,
}

/// Chat-completion endpoint used to turn descriptions into SQL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Hosted Postgres reached through its PostgREST RPC interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub service_role_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// How a natural-language query is turned into a history cache key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheKeyPolicy {
    /// The query string exactly as received.
    #[default]
    Exact,
    /// Trimmed, inner whitespace collapsed, lowercased.
    Normalized,
}

impl CacheKeyPolicy {
    pub fn cache_key(&self, query: &str) -> String {
        match self {
            CacheKeyPolicy::Exact => query.to_string(),
            CacheKeyPolicy::Normalized => query
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_data_dir() -> PathBuf {
    AppConfig::config_dir().join("data")
}

fn default_select_only() -> bool {
    true
}

fn default_learning_examples_in_prompt() -> usize {
    5
}

fn default_llm_endpoint() -> String {
    "https://api.perplexity.ai/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "mixtral-8x7b-instruct".to_string()
}

fn default_temperature() -> f32 {
    0.1 // near-deterministic SQL
}

fn default_max_tokens() -> u32 {
    150
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_role_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            data_dir: default_data_dir(),
            llm: LlmConfig::default(),
            database: DatabaseConfig::default(),
            cache_key_policy: CacheKeyPolicy::Exact,
            select_only: default_select_only(),
            learning_examples_in_prompt: default_learning_examples_in_prompt(),
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".buscapalabras")
    }

    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Loads the config at `path`, or the default location when `path` is
    /// `None`. A missing default file is created with default values; a
    /// missing explicit file is an error.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read_from(path).await?,
            None => Self::load_or_default().await?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub async fn load_or_default() -> Result<Self> {
        let config_file = Self::config_file();

        if config_file.exists() {
            Self::read_from(&config_file).await
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    async fn read_from(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub async fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();
        tokio::fs::create_dir_all(&config_dir).await?;

        let config_file = Self::config_file();
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&config_file, content).await?;

        Ok(())
    }

    /// Secrets and deployment endpoints come from the environment when set.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("LLM_API_KEY").or_else(|| lookup("PERPLEXITY_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("SUPABASE_URL") {
            self.database.url = url;
        }
        if let Some(key) = lookup("SUPABASE_SERVICE_ROLE_KEY") {
            self.database.service_role_key = Some(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "llm": { "model": "sonar" }, "select_only": false }"#).unwrap();

        assert_eq!(config.llm.model, "sonar");
        assert_eq!(config.llm.max_tokens, 150);
        assert!((config.llm.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.bind_address, "127.0.0.1:8080");
        assert_eq!(config.cache_key_policy, CacheKeyPolicy::Exact);
        assert!(!config.select_only);
        assert_eq!(config.learning_examples_in_prompt, 5);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "PERPLEXITY_API_KEY" => Some("pplx-123".to_string()),
            "SUPABASE_URL" => Some("https://example.supabase.co".to_string()),
            _ => None,
        });

        assert_eq!(config.llm.api_key.as_deref(), Some("pplx-123"));
        assert_eq!(config.database.url, "https://example.supabase.co");
        assert!(config.database.service_role_key.is_none());
    }

    #[test]
    fn test_llm_api_key_takes_precedence() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            "LLM_API_KEY" => Some("primary".to_string()),
            "PERPLEXITY_API_KEY" => Some("fallback".to_string()),
            _ => None,
        });

        assert_eq!(config.llm.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_cache_key_policy() {
        let query = "  Palabras   con Q ";
        assert_eq!(CacheKeyPolicy::Exact.cache_key(query), query);
        assert_eq!(CacheKeyPolicy::Normalized.cache_key(query), "palabras con q");
    }

    #[tokio::test]
    async fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{ "cache_key_policy": "normalized", "bind_address": "0.0.0.0:9000" }"#)
            .await
            .unwrap();

        let config = AppConfig::read_from(&path).await.unwrap();
        assert_eq!(config.cache_key_policy, CacheKeyPolicy::Normalized);
        assert_eq!(config.bind_address, "0.0.0.0:9000");
    }

    #[tokio::test]
    async fn test_load_missing_explicit_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = AppConfig::read_from(&dir.path().join("missing.json")).await;
        assert!(result.is_err());
    }
}
