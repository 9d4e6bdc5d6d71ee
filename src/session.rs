//! Keyword generation state.
//!
//! A [`KeywordSession`] pairs the active keyword, its compiled matcher and the
//! matched-set under one generation counter. Every keyword write (set or clear)
//! bumps the generation, swaps the matcher and empties the matched-set in a single
//! `&mut self` call, so no observation can see a new keyword with an old matched-set
//! or the other way around.

use tracing::{debug, info};

use crate::error::ValidationError;
use crate::event::{ChatEvent, MatchEvent, ParticipantId};
use crate::keyword::Keyword;
use crate::matcher::{KeywordMatcher, MatcherOptions};
use crate::tracker::DedupTracker;

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Active keyword, if any.
    pub keyword: Option<String>,
    /// Current generation.
    pub generation: u64,
    /// Matched participants in first-match order.
    pub matched: Vec<ParticipantId>,
}

/// Active keyword, matcher and matched-set.
#[derive(Debug, Default)]
pub struct KeywordSession {
    options: MatcherOptions,
    matcher: Option<KeywordMatcher>,
    tracker: DedupTracker,
    generation: u64,
}

impl KeywordSession {
    /// Creates a session with no active keyword.
    #[must_use]
    pub fn new(options: MatcherOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Validates and compiles `text` without touching the session.
    ///
    /// # Errors
    ///
    /// Returns the keyword or pattern validation error.
    pub fn prepare(&self, text: &str) -> Result<KeywordMatcher, ValidationError> {
        KeywordMatcher::from_text(text, &self.options)
    }

    /// Replaces the active keyword.
    ///
    /// # Errors
    ///
    /// Returns a validation error for blank, oversized or uncompilable input; the
    /// session is left unchanged in that case.
    pub fn set_keyword(&mut self, text: &str) -> Result<u64, ValidationError> {
        let matcher = self.prepare(text)?;
        Ok(self.install(matcher))
    }

    /// Installs an already compiled matcher as the active keyword.
    pub fn install(&mut self, matcher: KeywordMatcher) -> u64 {
        self.generation += 1;
        self.tracker.reset();
        info!(
            keyword = matcher.keyword().as_str(),
            mode = ?matcher.mode(),
            generation = self.generation,
            "keyword set"
        );
        self.matcher = Some(matcher);
        self.generation
    }

    /// Disables matching and empties the matched-set.
    pub fn clear_keyword(&mut self) -> u64 {
        self.generation += 1;
        self.tracker.reset();
        self.matcher = None;
        info!(generation = self.generation, "keyword cleared");
        self.generation
    }

    /// Tests a chat event, returning a match event on a participant's first match.
    ///
    /// Malformed events and events arriving with no active keyword never match.
    pub fn observe(&mut self, event: &ChatEvent) -> Option<MatchEvent> {
        let (participant, message) = event.parts()?;
        debug!(participant = participant.as_str(), text = message, "chat");

        let matcher = self.matcher.as_ref()?;
        if !self.tracker.observe(participant, message, matcher) {
            return None;
        }

        debug!(participant = participant.as_str(), generation = self.generation, "first match");
        Some(MatchEvent::new(
            participant.clone(),
            matcher.keyword().as_str(),
            self.generation,
        ))
    }

    /// The active keyword.
    #[must_use]
    pub fn keyword(&self) -> Option<&Keyword> {
        self.matcher.as_ref().map(KeywordMatcher::keyword)
    }

    /// The active matcher.
    #[must_use]
    pub const fn matcher(&self) -> Option<&KeywordMatcher> {
        self.matcher.as_ref()
    }

    /// Current generation; bumped by every set or clear.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Matched participants in first-match order.
    #[must_use]
    pub fn matched(&self) -> &[ParticipantId] {
        self.tracker.participants()
    }

    /// Options used to compile keywords.
    #[must_use]
    pub const fn options(&self) -> &MatcherOptions {
        &self.options
    }

    /// Copies out the keyword, generation and matched-set.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            keyword: self.keyword().map(|k| k.as_str().to_string()),
            generation: self.generation,
            matched: self.matched().to_vec(),
        }
    }
}
