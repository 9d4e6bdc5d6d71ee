//! Keyword normalization and validation.
//!
//! A [`Keyword`] is the operator-supplied text that defines which chat messages
//! qualify. It is trimmed on write and never empty; the matcher compiles from its
//! normalized form.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Canonical apostrophe every variant is mapped to.
pub const APOSTROPHE: char = '\'';

/// Default upper bound on keyword length, in characters.
pub const DEFAULT_MAX_KEYWORD_LEN: usize = 256;

/// Returns true for characters treated as an apostrophe.
#[must_use]
pub const fn is_apostrophe(c: char) -> bool {
    matches!(
        c,
        '\'' | '\u{2019}' | '\u{2018}' | '\u{02BC}' | '\u{FF07}' | '`' | '\u{00B4}'
    )
}

/// Maps every apostrophe variant to [`APOSTROPHE`].
///
/// Borrows the input when it contains no non-canonical apostrophe.
#[must_use]
pub fn canonicalize_apostrophes(text: &str) -> Cow<'_, str> {
    if text.chars().any(|c| c != APOSTROPHE && is_apostrophe(c)) {
        Cow::Owned(
            text.chars()
                .map(|c| if is_apostrophe(c) { APOSTROPHE } else { c })
                .collect(),
        )
    } else {
        Cow::Borrowed(text)
    }
}

/// Lowercases, canonicalizes apostrophes, collapses whitespace runs and trims.
///
/// Characters whose lowercase form expands to several code points are kept as
/// they are; matching is case-insensitive anyway and this keeps the keyword
/// matching its own spelling.
///
/// # Examples
///
/// ```
/// use chatkey::keyword::normalize_text;
///
/// assert_eq!(normalize_text("  Don\u{2019}t \t STOP  "), "don't stop");
/// ```
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let lowered: String = canonicalize_apostrophes(text).chars().map(lower_char).collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn lower_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// A validated, trimmed keyword or phrase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Keyword {
    raw: String,
    normalized: String,
}

impl Keyword {
    /// Parses operator input using [`DEFAULT_MAX_KEYWORD_LEN`].
    ///
    /// # Errors
    ///
    /// See [`Keyword::parse_with_limit`].
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        Self::parse_with_limit(raw, DEFAULT_MAX_KEYWORD_LEN)
    }

    /// Parses operator input, trimming it.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyKeyword` for empty or whitespace-only input
    /// and `ValidationError::KeywordTooLong` when the trimmed text exceeds
    /// `max_len` characters.
    pub fn parse_with_limit(raw: &str, max_len: usize) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyKeyword);
        }

        let actual = trimmed.chars().count();
        if actual > max_len {
            return Err(ValidationError::KeywordTooLong {
                actual,
                max_length: max_len,
            });
        }

        let normalized = normalize_text(trimmed);
        // Apostrophes alone normalize to something, but nothing to match on.
        if !normalized.chars().any(|c| !is_apostrophe(c) && !c.is_whitespace()) {
            return Err(ValidationError::EmptyKeyword);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            normalized,
        })
    }

    /// The trimmed operator text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lowercased, whitespace-collapsed form.
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Normalized word tokens.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.normalized.split(' ')
    }

    /// True when the keyword has more than one word.
    #[must_use]
    pub fn is_phrase(&self) -> bool {
        self.normalized.contains(' ')
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for Keyword {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Keyword> for String {
    fn from(value: Keyword) -> Self {
        value.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_unicode_whitespace() {
        assert_eq!(normalize_text("Happy\u{3000}\u{00A0} Birthday\n"), "happy birthday");
    }

    #[test]
    fn normalize_maps_apostrophes() {
        assert_eq!(normalize_text("DON\u{2018}T"), "don't");
        assert_eq!(normalize_text("rock\u{02BC}n\u{FF07}roll"), "rock'n'roll");
    }

    #[test]
    fn canonicalize_borrows_when_clean() {
        assert!(matches!(canonicalize_apostrophes("cat's"), Cow::Borrowed(_)));
        assert_eq!(canonicalize_apostrophes("cat\u{2019}s"), "cat's");
    }

    #[test]
    fn parse_trims_and_keeps_raw_case() {
        let kw = Keyword::parse("  Happy Birthday ").unwrap();
        assert_eq!(kw.as_str(), "Happy Birthday");
        assert_eq!(kw.normalized(), "happy birthday");
        assert!(kw.is_phrase());
        assert_eq!(kw.words().collect::<Vec<_>>(), vec!["happy", "birthday"]);
    }

    #[test]
    fn parse_rejects_blank() {
        assert!(matches!(Keyword::parse(""), Err(ValidationError::EmptyKeyword)));
        assert!(matches!(Keyword::parse(" \t\n "), Err(ValidationError::EmptyKeyword)));
        assert!(matches!(Keyword::parse(" ' \u{2019} "), Err(ValidationError::EmptyKeyword)));
    }

    #[test]
    fn parse_enforces_limit() {
        let err = Keyword::parse_with_limit("abcdef", 5).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::KeywordTooLong {
                actual: 6,
                max_length: 5
            }
        ));
        assert!(Keyword::parse_with_limit("abcde", 5).is_ok());
    }

    #[test]
    fn serde_goes_through_validation() {
        let kw: Keyword = serde_json::from_str("\" yes \"").unwrap();
        assert_eq!(kw.as_str(), "yes");
        assert!(serde_json::from_str::<Keyword>("\"   \"").is_err());
        assert_eq!(serde_json::to_string(&kw).unwrap(), "\"yes\"");
    }
}
