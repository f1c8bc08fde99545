use std::sync::Arc;

use crate::classifier::{is_letters_only, is_wildcarded};
use crate::database::WordDatabase;
use crate::errors::ServiceError;
use crate::models::{group_by_length, AnagramResults, WordResult, WordVariation};

/// Letters-only lookups delegated straight to the database.
pub struct AnagramFinder {
    database: Arc<dyn WordDatabase>,
}

fn validate_letters(query: &str) -> Result<(), ServiceError> {
    if query.is_empty() {
        return Err(ServiceError::EmptyQuery);
    }
    if !is_letters_only(query) {
        return Err(ServiceError::InvalidCharacters(query.to_string()));
    }
    Ok(())
}

impl AnagramFinder {
    pub fn new(database: Arc<dyn WordDatabase>) -> Self {
        Self { database }
    }

    /// Rows of `execute_natural_query(query)`, unmodified.
    pub async fn find(&self, query: &str) -> Result<Vec<WordResult>, ServiceError> {
        validate_letters(query)?;

        let rows = self.database.execute_natural_query(query).await?;
        log::info!("[anagrams] '{}': {} results", query, rows.len());
        Ok(rows)
    }

    /// Exact anagrams, one-extra-letter words and optionally shorter words,
    /// each grouped by length.
    pub async fn find_grouped(
        &self,
        query: &str,
        include_shorter: bool,
    ) -> Result<AnagramResults, ServiceError> {
        validate_letters(query)?;

        let shorter = async {
            if include_shorter {
                self.database.find_shorter_words(query).await
            } else {
                Ok(Vec::new())
            }
        };
        let (exact, plus_one, shorter) = tokio::try_join!(
            self.database.find_exact_anagrams(query),
            self.database.find_plus_one_letter(query),
            shorter,
        )?;
        log::info!(
            "[anagrams] '{}': {} exact, {} plus one, {} shorter",
            query,
            exact.len(),
            plus_one.len(),
            shorter.len()
        );

        Ok(AnagramResults {
            exact: group_by_length(exact),
            plus_one: group_by_length(plus_one),
            shorter: group_by_length(shorter),
        })
    }

    /// Words matching a pattern where `*` stands for any letter.
    pub async fn find_variations(&self, pattern: &str) -> Result<Vec<WordVariation>, ServiceError> {
        if pattern.is_empty() {
            return Err(ServiceError::EmptyQuery);
        }
        if !is_wildcarded(pattern) {
            return Err(ServiceError::BadRequest(format!(
                "El patrón debe combinar letras y comodines '*': '{}'",
                pattern
            )));
        }

        let rows = self.database.find_word_variations(pattern).await?;
        log::info!("[anagrams] pattern '{}': {} variations", pattern, rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockWordDatabase;

    fn finder() -> (Arc<MockWordDatabase>, AnagramFinder) {
        let database = Arc::new(MockWordDatabase::new(&[
            "casa", "saca", "cosa", "casas", "cazas", "as", "sal", "asa",
        ]));
        (database.clone(), AnagramFinder::new(database))
    }

    #[tokio::test]
    async fn test_find_returns_rows_verbatim() {
        let (database, finder) = finder();
        let rows = finder.find("casa").await.unwrap();

        assert_eq!(rows, vec![WordResult::exact("casa"), WordResult::exact("saca")]);
        assert_eq!(database.calls_to("execute_natural_query"), vec!["casa"]);
    }

    #[tokio::test]
    async fn test_find_validates_characters() {
        let (database, finder) = finder();

        assert!(matches!(finder.find("").await, Err(ServiceError::EmptyQuery)));
        match finder.find("casa 2").await {
            Err(ServiceError::InvalidCharacters(input)) => assert_eq!(input, "casa 2"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(finder.find("palabras con q").await.is_err());
        assert!(database.calls().is_empty());
    }

    #[tokio::test]
    async fn test_find_accepts_enye() {
        let (database, finder) = finder();
        finder.find("AÑO").await.unwrap();
        assert_eq!(database.calls_to("execute_natural_query"), vec!["AÑO"]);
    }

    #[tokio::test]
    async fn test_find_grouped() {
        let (database, finder) = finder();
        let results = finder.find_grouped("casa", true).await.unwrap();

        assert_eq!(results.exact[&4].len(), 2);
        assert_eq!(
            results.plus_one[&5],
            vec![WordResult::partial("casas"), WordResult::partial("cazas")]
        );
        assert_eq!(results.shorter[&2], vec![WordResult::partial("as")]);
        assert_eq!(results.shorter[&3], vec![WordResult::partial("asa")]);
        assert_eq!(database.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_find_grouped_without_shorter() {
        let (database, finder) = finder();
        let results = finder.find_grouped("casa", false).await.unwrap();

        assert!(results.shorter.is_empty());
        assert!(database.calls_to("find_shorter_words").is_empty());
    }

    #[tokio::test]
    async fn test_find_variations() {
        let (database, finder) = finder();
        let rows = finder.find_variations("ca*as").await.unwrap();

        let words: Vec<&str> = rows.iter().map(|r| r.word.as_str()).collect();
        assert_eq!(words, vec!["casas", "cazas"]);
        assert_eq!(database.calls_to("find_word_variations"), vec!["ca*as"]);

        assert!(matches!(
            finder.find_variations("casa").await,
            Err(ServiceError::BadRequest(_))
        ));
    }
}
