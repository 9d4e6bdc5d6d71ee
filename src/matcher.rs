//! Keyword matcher compilation.
//!
//! A [`KeywordMatcher`] is compiled once per keyword and then tested against every
//! chat message. It accepts the lexical variants people actually type in live
//! chat and rejects near-misses:
//!
//! - plurals and possessives (`cat` matches `cats`, `cat's`)
//! - letter elongation for single words (`happy` matches `happyyyy`, `happpy`)
//! - trailing `!`, `.`, `?` and emoji (`yes` matches `yes!!! 🎉`)
//! - an `@` mention prefix, unless the message is nothing but the mention
//! - arbitrary whitespace and apostrophes between the words of a phrase
//!
//! A keyword embedded in a longer word never matches (`cat` vs `category`).

use std::fmt::Write as _;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::keyword::{canonicalize_apostrophes, is_apostrophe, Keyword, DEFAULT_MAX_KEYWORD_LEN};

/// Trailing decoration allowed after the keyword, as regex class members.
const DECORATION: &str = r"!.?\p{Extended_Pictographic}\p{Emoji_Modifier}\x{FE0F}\x{200D}";

/// Optional plural / possessive suffix.
const PLURAL: &str = "(?:'s|s)?";

/// Separator between the words of a phrase.
const WORD_GAP: &str = r"[\s']+";

/// Default compiled-program size limit, in bytes.
pub const DEFAULT_PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// How much of the message the keyword has to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// The keyword may appear anywhere, as a whole token.
    #[default]
    Tolerant,
    /// The keyword (plus trailing decoration) must be the entire message.
    Anchored,
}

/// Matcher construction options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherOptions {
    /// Tolerant search or whole-message anchoring.
    pub mode: MatchMode,
    /// Maximum keyword length in characters.
    pub max_keyword_len: usize,
    /// Upper bound on the compiled regex size.
    pub pattern_size_limit: usize,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            mode: MatchMode::Tolerant,
            max_keyword_len: DEFAULT_MAX_KEYWORD_LEN,
            pattern_size_limit: DEFAULT_PATTERN_SIZE_LIMIT,
        }
    }
}

impl MatcherOptions {
    /// Options for whole-message matching.
    #[must_use]
    pub fn anchored() -> Self {
        Self {
            mode: MatchMode::Anchored,
            ..Self::default()
        }
    }
}

/// Compiled, immutable predicate over message text for one keyword.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keyword: Keyword,
    mode: MatchMode,
    pattern: Regex,
    /// Rejects messages that are only `@keyword`. Tolerant mode only.
    bare_mention: Option<Regex>,
}

impl KeywordMatcher {
    /// Compiles a matcher with default options.
    ///
    /// # Errors
    ///
    /// See [`KeywordMatcher::compile_with`].
    pub fn compile(keyword: &Keyword) -> Result<Self, ValidationError> {
        Self::compile_with(keyword, &MatcherOptions::default())
    }

    /// Compiles a matcher for `keyword`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPattern` if the generated regex cannot be
    /// built within `options.pattern_size_limit`.
    pub fn compile_with(keyword: &Keyword, options: &MatcherOptions) -> Result<Self, ValidationError> {
        let core = keyword_core(keyword);

        let (pattern, bare_mention) = match options.mode {
            MatchMode::Tolerant => (
                format!(r"(?:^|[\s@]){core}[{DECORATION}]*(?:\s|$)"),
                Some(format!(r"^\s*@{core}[\s{DECORATION}]*$")),
            ),
            MatchMode::Anchored => (format!(r"^\s*{core}[\s{DECORATION}]*$"), None),
        };

        let pattern = build_regex(keyword, &pattern, options.pattern_size_limit)?;
        let bare_mention = bare_mention
            .map(|p| build_regex(keyword, &p, options.pattern_size_limit))
            .transpose()?;

        Ok(Self {
            keyword: keyword.clone(),
            mode: options.mode,
            pattern,
            bare_mention,
        })
    }

    /// Parses and compiles raw operator text in one step.
    ///
    /// # Errors
    ///
    /// Propagates keyword validation and pattern construction errors.
    pub fn from_text(text: &str, options: &MatcherOptions) -> Result<Self, ValidationError> {
        let keyword = Keyword::parse_with_limit(text, options.max_keyword_len)?;
        Self::compile_with(&keyword, options)
    }

    /// Tests a chat message.
    #[must_use]
    pub fn test(&self, message: &str) -> bool {
        if message.is_empty() {
            return false;
        }

        let message = canonicalize_apostrophes(message);
        if !self.pattern.is_match(&message) {
            return false;
        }

        match &self.bare_mention {
            Some(bare) => !bare.is_match(&message),
            None => true,
        }
    }

    /// The keyword this matcher was compiled from.
    #[must_use]
    pub const fn keyword(&self) -> &Keyword {
        &self.keyword
    }

    /// The match mode this matcher was compiled with.
    #[must_use]
    pub const fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Generated regex source, for diagnostics.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

fn build_regex(keyword: &Keyword, pattern: &str, size_limit: usize) -> Result<Regex, ValidationError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .unicode(true)
        .size_limit(size_limit)
        .build()
        .map_err(|e| ValidationError::InvalidPattern {
            keyword: keyword.as_str().to_string(),
            reason: e.to_string(),
        })
}

/// The keyword body, without boundaries.
fn keyword_core(keyword: &Keyword) -> String {
    let words: Vec<&str> = keyword.words().collect();

    if let [word] = words.as_slice() {
        format!("(?:{}|{}){PLURAL}", literal_word(word), elongated_word(word))
    } else {
        let parts: Vec<String> = words
            .iter()
            .map(|w| format!("{}{PLURAL}", literal_word(w)))
            .collect();
        parts.join(WORD_GAP)
    }
}

/// Escaped base form. Apostrophes in the keyword become optional.
fn literal_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len() * 2);
    let mut after_apostrophe = false;
    for c in word.chars() {
        if is_apostrophe(c) {
            if !after_apostrophe {
                out.push_str("'?");
            }
            after_apostrophe = true;
            continue;
        }
        after_apostrophe = false;
        push_escaped(&mut out, c);
    }
    out
}

/// Base form with emphatic repetition.
///
/// A run of `n >= 2` equal ASCII letters accepts `n` or more. A single final
/// letter accepts one, or three or more. Other single letters stay fixed, so
/// `god` rejects `good` and `to` rejects `too`. `happy` becomes `hap{2,}y(?:yy+)?`.
fn elongated_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len() * 3);
    let mut chars = word.chars().peekable();
    let mut after_apostrophe = false;

    while let Some(c) = chars.next() {
        if is_apostrophe(c) {
            if !after_apostrophe {
                out.push_str("'?");
            }
            after_apostrophe = true;
            continue;
        }
        after_apostrophe = false;

        if !c.is_ascii_alphabetic() {
            push_escaped(&mut out, c);
            continue;
        }

        let mut run = 1usize;
        while chars.next_if_eq(&c).is_some() {
            run += 1;
        }
        out.push(c);
        if run > 1 {
            let _ = write!(out, "{{{run},}}");
        } else if chars.peek().is_none() {
            let _ = write!(out, "(?:{c}{c}+)?");
        }
    }
    out
}

fn push_escaped(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(keyword: &str) -> KeywordMatcher {
        KeywordMatcher::from_text(keyword, &MatcherOptions::default()).unwrap()
    }

    fn anchored(keyword: &str) -> KeywordMatcher {
        KeywordMatcher::from_text(keyword, &MatcherOptions::anchored()).unwrap()
    }

    #[test]
    fn keyword_matches_itself() {
        for k in [
            "yes", "Yes", "cat", "don't", "happy birthday", "c++", "a.b", "🎉", "@yes",
            "rock'n'roll", "100%", "(x)", "yes!", "İstanbul", "naïve café",
        ] {
            assert!(matcher(k).test(k), "tolerant {k:?} must match itself");
            assert!(anchored(k).test(k), "anchored {k:?} must match itself");
        }
    }

    #[test]
    fn pluralization() {
        let m = matcher("cat");
        assert!(m.test("cats"));
        assert!(m.test("cat's"));
        assert!(m.test("cat\u{2019}s"));
        assert!(!m.test("category"));
        assert!(!m.test("concat"));
        assert!(!m.test("catss's"));
    }

    #[test]
    fn elongation() {
        let m = matcher("happy");
        assert!(m.test("happyyyy"));
        assert!(m.test("happpyyy"));
        assert!(m.test("happyyys"));
        assert!(m.test("HAPPYYY!!"));
        assert!(!m.test("happiness"));
        assert!(!m.test("hapy"));
        assert!(!m.test("unhappy"));
        assert!(!m.test("haaappy"));
    }

    #[test]
    fn elongation_keeps_distinct_words_apart() {
        for (keyword, other) in [
            ("god", "good"),
            ("to", "too"),
            ("of", "off"),
            ("bet", "beet"),
            ("fed", "feed"),
            ("pop", "poop"),
            ("good", "god"),
        ] {
            assert!(!matcher(keyword).test(other), "{keyword:?} must reject {other:?}");
        }
        assert!(matcher("good").test("goooood"));
        assert!(matcher("no").test("nooooo"));
    }

    #[test]
    fn elongation_pattern_shape() {
        assert_eq!(elongated_word("happy"), "hap{2,}y(?:yy+)?");
        assert_eq!(elongated_word("don't"), "don'?t(?:tt+)?");
        assert_eq!(elongated_word("gg"), "g{2,}");
        assert_eq!(elongated_word("a1"), "a1");
    }

    #[test]
    fn phrases_do_not_elongate() {
        let m = matcher("happy birthday");
        assert!(!m.test("happyyy birthday"));
    }

    #[test]
    fn decoration_tolerance() {
        let m = matcher("yes");
        assert!(m.test("yes!!! 🎉"));
        assert!(m.test("yes?!..."));
        assert!(m.test("yes🎉🎉"));
        assert!(m.test("yes 👍🏽"));
        assert!(m.test("so yes."));
        assert!(!m.test("yes-man"));
        assert!(!m.test("yesterday"));
    }

    #[test]
    fn mention_boundary() {
        let m = matcher("yes");
        assert!(!m.test("@yes"));
        assert!(!m.test("  @yes!! "));
        assert!(m.test("@yes I agree"));
        assert!(m.test("hey @yes"));
    }

    #[test]
    fn phrase_matching() {
        let m = matcher("happy birthday");
        assert!(m.test("happy   birthday!!"));
        assert!(m.test("Happy Birthdays"));
        assert!(m.test("well happy birthday to you"));
        assert!(!m.test("birthday happy"));
        assert!(!m.test("happybirthday"));
    }

    #[test]
    fn apostrophes_in_keyword_are_optional() {
        let m = matcher("don't stop");
        assert!(m.test("dont stop"));
        assert!(m.test("don\u{2019}t stop!"));
        assert!(!m.test("do not stop"));
    }

    #[test]
    fn case_insensitive() {
        assert!(matcher("Yes").test("YES"));
        assert!(matcher("YES").test("yes"));
    }

    #[test]
    fn empty_message_never_matches() {
        assert!(!matcher("yes").test(""));
        assert!(!anchored("yes").test(""));
    }

    #[test]
    fn special_characters_are_literal() {
        let m = matcher("a.b");
        assert!(m.test("a.b"));
        assert!(!m.test("axb"));
    }

    #[test]
    fn anchored_requires_whole_message() {
        let m = anchored("yes");
        assert!(m.test("yes"));
        assert!(m.test(" Yesss!! 🎉 "));
        assert!(!m.test("yes I agree"));
        assert!(!m.test("@yes"));
        assert_eq!(m.mode(), MatchMode::Anchored);
    }

    #[test]
    fn pattern_size_limit_is_reported() {
        let keyword = Keyword::parse("supercalifragilistic").unwrap();
        let options = MatcherOptions {
            pattern_size_limit: 16,
            ..MatcherOptions::default()
        };
        let err = KeywordMatcher::compile_with(&keyword, &options).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPattern { .. }));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: MatcherOptions = serde_json::from_str(r#"{"mode":"anchored"}"#).unwrap();
        assert_eq!(opts.mode, MatchMode::Anchored);
        assert_eq!(opts.max_keyword_len, DEFAULT_MAX_KEYWORD_LEN);
    }
}
