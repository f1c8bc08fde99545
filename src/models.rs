use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A dictionary word returned by the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordResult {
    pub word: String,
    #[serde(default = "default_is_exact")]
    pub is_exact: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard_positions: Option<Vec<i32>>,
}

fn default_is_exact() -> bool {
    true
}

impl WordResult {
    pub fn exact(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            is_exact: true,
            wildcard_positions: None,
        }
    }

    pub fn partial(word: impl Into<String>) -> Self {
        Self {
            is_exact: false,
            ..Self::exact(word)
        }
    }

    pub fn len(&self) -> usize {
        self.word.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.word.is_empty()
    }
}

/// Row of `find_word_variations`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordVariation {
    pub word: String,
    pub variation_type: String,
    #[serde(default)]
    pub wildcards_used: i32,
}

/// Words keyed by their length in characters.
pub type WordGroups = BTreeMap<usize, Vec<WordResult>>;

pub fn group_by_length(words: Vec<WordResult>) -> WordGroups {
    let mut groups = WordGroups::new();
    for word in words {
        groups.entry(word.len()).or_default().push(word);
    }
    groups
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnagramResults {
    pub exact: WordGroups,
    pub plus_one: WordGroups,
    pub shorter: WordGroups,
}

/// One natural-language → SQL translation attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranslationRecord {
    pub id: i64,
    pub natural_query: String,
    pub cache_key: String,
    pub sql_query: String,
    pub successful: bool,
    pub error_message: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    TooManyResults,
    TooFewResults,
    NotWhatExpected,
    ExactlyWhatNeeded,
    NeedsClarification,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::TooManyResults => "too_many_results",
            FeedbackType::TooFewResults => "too_few_results",
            FeedbackType::NotWhatExpected => "not_what_expected",
            FeedbackType::ExactlyWhatNeeded => "exactly_what_needed",
            FeedbackType::NeedsClarification => "needs_clarification",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "too_many_results" => Some(FeedbackType::TooManyResults),
            "too_few_results" => Some(FeedbackType::TooFewResults),
            "not_what_expected" => Some(FeedbackType::NotWhatExpected),
            "exactly_what_needed" => Some(FeedbackType::ExactlyWhatNeeded),
            "needs_clarification" => Some(FeedbackType::NeedsClarification),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryFeedback {
    pub id: i64,
    pub query_id: i64,
    pub was_helpful: bool,
    pub feedback_type: FeedbackType,
    pub user_comment: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub query_id: i64,
    pub was_helpful: bool,
    pub feedback_type: FeedbackType,
    pub user_comment: Option<String>,
}

/// A translation a super user approved as a prompt example.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningExample {
    pub id: i64,
    pub original_query: String,
    pub successful_sql: String,
    pub conversation_context: serde_json::Value,
    pub notes: Option<String>,
    pub approved_by: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewLearningExample {
    pub original_query: String,
    pub successful_sql: String,
    pub conversation_context: serde_json::Value,
    pub notes: Option<String>,
    pub approved_by: Option<String>,
}
