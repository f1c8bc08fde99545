//! Decides which search path a user query takes.
//!
//! Grammar (applied to the trimmed input):
//!
//! ```text
//! letter      = "A".."Z" | "a".."z" | "Ñ" | "ñ"
//! letters     = letter+                          -> LettersOnly
//! wildcarded  = (letter | "*")+, at least one "*" and one letter
//!                                                -> Wildcarded
//! anything else that is not empty                -> NaturalLanguage
//! ```
//!
//! Accented vowels are not letters here, so a single accented word is
//! treated as natural language.

use crate::errors::ServiceError;

pub const WILDCARD: char = '*';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    LettersOnly(String),
    Wildcarded(String),
    NaturalLanguage(String),
}

impl QueryKind {
    pub fn as_str(&self) -> &str {
        match self {
            QueryKind::LettersOnly(q) | QueryKind::Wildcarded(q) | QueryKind::NaturalLanguage(q) => q,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QueryKind::LettersOnly(_) => "anagram",
            QueryKind::Wildcarded(_) => "wildcard",
            QueryKind::NaturalLanguage(_) => "natural",
        }
    }
}

pub fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || c == 'ñ' || c == 'Ñ'
}

/// `^[A-Za-zÑñ]+$`
pub fn is_letters_only(input: &str) -> bool {
    !input.is_empty() && input.chars().all(is_letter)
}

pub fn is_wildcarded(input: &str) -> bool {
    let mut has_letter = false;
    let mut has_wildcard = false;
    for c in input.chars() {
        if is_letter(c) {
            has_letter = true;
        } else if c == WILDCARD {
            has_wildcard = true;
        } else {
            return false;
        }
    }
    has_letter && has_wildcard
}

pub fn classify(input: &str) -> Result<QueryKind, ServiceError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::EmptyQuery);
    }

    let kind = if is_letters_only(trimmed) {
        QueryKind::LettersOnly(trimmed.to_string())
    } else if is_wildcarded(trimmed) {
        QueryKind::Wildcarded(trimmed.to_string())
    } else {
        QueryKind::NaturalLanguage(trimmed.to_string())
    };
    Ok(kind)
}
