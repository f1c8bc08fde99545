/*!
 * In-memory stand-ins for the language model and the word database.
 *
 * - `MockSqlGenerator` answers every conversation with a fixed reply (or a
 *   fixed failure) and counts calls.
 * - `MockWordDatabase` holds a small dictionary, evaluates the `ILIKE` /
 *   `length =` predicates of generated SQL, answers the anagram RPCs, and
 *   records every call.
 */

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::classifier::{is_letters_only, WILDCARD};
use crate::database::WordDatabase;
use crate::errors::{DatabaseError, ProviderError};
use crate::llm::{ChatMessage, SqlGenerator};
use crate::models::{WordResult, WordVariation};

/// What the mock model does when called
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answers with this text
    Text(String),
    /// Responds with a non-2xx status
    ApiError { status_code: u16, message: String },
    /// Responds 200 without usable content
    Malformed,
    /// Cannot be reached
    Unreachable,
}

#[derive(Debug)]
pub struct MockSqlGenerator {
    reply: MockReply,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl MockSqlGenerator {
    pub fn new(reply: MockReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(MockReply::Text(text.into()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SqlGenerator for MockSqlGenerator {
    async fn generate_sql(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_messages.lock() {
            *last = messages.to_vec();
        }

        match &self.reply {
            MockReply::Text(text) => Ok(text.clone()),
            MockReply::ApiError { status_code, message } => Err(ProviderError::ApiError {
                status_code: *status_code,
                message: message.clone(),
            }),
            MockReply::Malformed => Err(ProviderError::InvalidResponse(
                "Respuesta inválida del API".to_string(),
            )),
            MockReply::Unreachable => {
                Err(ProviderError::RequestFailed("connection refused".to_string()))
            }
        }
    }
}

/// One recorded RPC invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RpcCall {
    pub function: &'static str,
    pub argument: String,
}

#[derive(Debug)]
pub struct MockWordDatabase {
    words: Vec<String>,
    failures: Vec<(String, String)>,
    calls: Mutex<Vec<RpcCall>>,
}

static ILIKE_PREDICATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(NOT\s+)?ILIKE\s+'((?:[^']|'')*)'").expect("valid ILIKE regex")
});
static LENGTH_PREDICATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blength\s*=\s*(\d+)").expect("valid length regex"));

/// Translates a SQL `LIKE` pattern into an anchored, case-insensitive regex.
fn like_to_regex(pattern: &str) -> Option<Regex> {
    let mut expr = String::from("(?i)^");
    for c in pattern.replace("''", "'").chars() {
        match c {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).ok()
}

fn letter_counts(word: &str) -> HashMap<char, usize> {
    let mut counts = HashMap::new();
    for c in word.chars().flat_map(char::to_lowercase) {
        if c != WILDCARD {
            *counts.entry(c).or_insert(0) += 1;
        }
    }
    counts
}

/// True when every letter of `part` is available in `whole`.
fn contains_letters(whole: &HashMap<char, usize>, part: &HashMap<char, usize>) -> bool {
    part.iter().all(|(c, n)| whole.get(c).copied().unwrap_or(0) >= *n)
}

impl MockWordDatabase {
    pub fn new(words: &[&str]) -> Self {
        let mut words: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        words.sort();
        Self {
            words,
            failures: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Any natural query containing `fragment` fails with `message`.
    pub fn with_failure(mut self, fragment: &str, message: &str) -> Self {
        self.failures.push((fragment.to_string(), message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<RpcCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, function: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.function == function)
            .map(|call| call.argument)
            .collect()
    }

    fn record(&self, function: &'static str, argument: &str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RpcCall {
                function,
                argument: argument.to_string(),
            });
        }
    }

    fn word_length(word: &str) -> usize {
        word.chars().count()
    }

    fn exact_anagrams(&self, letters: &str) -> Vec<WordResult> {
        let wanted = letter_counts(letters);
        let len = Self::word_length(letters);
        self.words
            .iter()
            .filter(|w| Self::word_length(w) == len && letter_counts(w) == wanted)
            .map(WordResult::exact)
            .collect()
    }

    fn evaluate_sql(&self, sql: &str) -> Vec<WordResult> {
        let mut predicates: Vec<(bool, Regex)> = Vec::new();
        for captures in ILIKE_PREDICATE.captures_iter(sql) {
            let negated = captures.get(1).is_some();
            if let Some(regex) = captures.get(2).and_then(|p| like_to_regex(p.as_str())) {
                predicates.push((negated, regex));
            }
        }
        let length = LENGTH_PREDICATE
            .captures(sql)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok());

        self.words
            .iter()
            .filter(|w| length.map_or(true, |len| Self::word_length(w) == len))
            .filter(|w| predicates.iter().all(|(negated, re)| re.is_match(w) != *negated))
            .map(WordResult::exact)
            .collect()
    }
}

#[async_trait]
impl WordDatabase for MockWordDatabase {
    async fn execute_natural_query(&self, query_text: &str) -> Result<Vec<WordResult>, DatabaseError> {
        self.record("execute_natural_query", query_text);

        if let Some((_, message)) = self
            .failures
            .iter()
            .find(|(fragment, _)| query_text.contains(fragment.as_str()))
        {
            return Err(DatabaseError::from_query_message(message.clone(), None));
        }

        if is_letters_only(query_text) {
            return Ok(self.exact_anagrams(query_text));
        }
        Ok(self.evaluate_sql(query_text))
    }

    async fn find_exact_anagrams(&self, letters: &str) -> Result<Vec<WordResult>, DatabaseError> {
        self.record("find_exact_anagrams", letters);
        Ok(self.exact_anagrams(letters))
    }

    async fn find_plus_one_letter(&self, letters: &str) -> Result<Vec<WordResult>, DatabaseError> {
        self.record("find_plus_one_letter", letters);
        let available = letter_counts(letters);
        let len = Self::word_length(letters);
        Ok(self
            .words
            .iter()
            .filter(|w| Self::word_length(w) == len + 1)
            .filter(|w| contains_letters(&letter_counts(w), &available))
            .map(WordResult::partial)
            .collect())
    }

    async fn find_shorter_words(&self, letters: &str) -> Result<Vec<WordResult>, DatabaseError> {
        self.record("find_shorter_words", letters);
        let available = letter_counts(letters);
        let len = Self::word_length(letters);
        Ok(self
            .words
            .iter()
            .filter(|w| (2..len).contains(&Self::word_length(w)))
            .filter(|w| contains_letters(&available, &letter_counts(w)))
            .map(WordResult::partial)
            .collect())
    }

    async fn find_word_variations(&self, pattern: &str) -> Result<Vec<WordVariation>, DatabaseError> {
        self.record("find_word_variations", pattern);
        let fixed = letter_counts(pattern);
        let wildcards = pattern.chars().filter(|c| *c == WILDCARD).count() as i32;
        let len = Self::word_length(pattern);
        Ok(self
            .words
            .iter()
            .filter(|w| Self::word_length(w) == len)
            .filter(|w| contains_letters(&letter_counts(w), &fixed))
            .map(|w| WordVariation {
                word: w.clone(),
                variation_type: if wildcards == 0 { "exact" } else { "wildcard" }.to_string(),
                wildcards_used: wildcards,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(rows: Vec<WordResult>) -> Vec<String> {
        rows.into_iter().map(|r| r.word).collect()
    }

    fn dictionary() -> MockWordDatabase {
        MockWordDatabase::new(&["casa", "saca", "cosa", "queso", "quorum", "qatar", "casas", "as", "sal"])
    }

    #[tokio::test]
    async fn test_evaluates_ilike_predicates() {
        let db = dictionary();
        let rows = db
            .execute_natural_query(
                "SELECT DISTINCT w.word FROM words w WHERE w.word ILIKE '%q%' AND w.word NOT ILIKE '%e%' AND w.word NOT ILIKE '%i%' ORDER BY w.word LIMIT 100",
            )
            .await
            .unwrap();
        assert_eq!(words(rows), vec!["qatar", "quorum"]);

        let rows = db
            .execute_natural_query("SELECT DISTINCT w.word FROM words w WHERE w.length = 4 AND w.word ILIKE 'c%'")
            .await
            .unwrap();
        assert_eq!(words(rows), vec!["casa", "cosa"]);
    }

    #[tokio::test]
    async fn test_anagram_lookups() {
        let db = dictionary();
        assert_eq!(words(db.execute_natural_query("casa").await.unwrap()), vec!["casa", "saca"]);
        assert_eq!(words(db.find_plus_one_letter("casa").await.unwrap()), vec!["casas"]);
        assert_eq!(words(db.find_shorter_words("casa").await.unwrap()), vec!["as"]);

        let variations = db.find_word_variations("ca*a").await.unwrap();
        assert!(variations.iter().any(|v| v.word == "casa" && v.wildcards_used == 1));
        assert!(!variations.iter().any(|v| v.word == "cosa"));

        assert_eq!(db.calls().len(), 4);
        assert_eq!(db.calls_to("find_plus_one_letter"), vec!["casa"]);
    }

    #[tokio::test]
    async fn test_configured_failure() {
        let db = dictionary().with_failure("w.lenght", "column w.lenght does not exist");
        let err = db
            .execute_natural_query("SELECT w.word FROM words w WHERE w.lenght = 3")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "column w.lenght does not exist");
    }

    #[tokio::test]
    async fn test_mock_generator_counts_calls() {
        let generator = MockSqlGenerator::replying("SELECT 1");
        let reply = generator.generate_sql(&[ChatMessage::user("hola")]).await.unwrap();
        assert_eq!(reply, "SELECT 1");
        assert_eq!(generator.call_count(), 1);
        assert_eq!(generator.last_messages()[0].content, "hola");
    }
}
