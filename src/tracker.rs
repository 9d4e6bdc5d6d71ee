//! First-match deduplication.
//!
//! The tracker remembers which participants already matched under the current
//! keyword so each of them is reported at most once per generation.

use std::collections::HashSet;

use crate::event::ParticipantId;
use crate::matcher::KeywordMatcher;

/// Matched-set for one keyword generation.
#[derive(Debug, Default, Clone)]
pub struct DedupTracker {
    seen: HashSet<ParticipantId>,
    // First-match order, for roster export.
    order: Vec<ParticipantId>,
}

impl DedupTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time `participant` sends a matching message.
    ///
    /// Participants already in the matched-set short-circuit without running the
    /// matcher.
    pub fn observe(&mut self, participant: &ParticipantId, message: &str, matcher: &KeywordMatcher) -> bool {
        if self.seen.contains(participant) {
            return false;
        }
        if !matcher.test(message) {
            return false;
        }

        self.seen.insert(participant.clone());
        self.order.push(participant.clone());
        true
    }

    /// Empties the matched-set.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.order.clear();
    }

    /// Whether `participant` already matched.
    #[must_use]
    pub fn contains(&self, participant: &ParticipantId) -> bool {
        self.seen.contains(participant)
    }

    /// Number of matched participants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True if nobody matched yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Matched participants in first-match order.
    #[must_use]
    pub fn participants(&self) -> &[ParticipantId] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatcherOptions;

    fn yes() -> KeywordMatcher {
        KeywordMatcher::from_text("yes", &MatcherOptions::default()).unwrap()
    }

    #[test]
    fn first_match_only() {
        let m = yes();
        let mut tracker = DedupTracker::new();
        let ann = ParticipantId::from("ann");

        assert!(tracker.observe(&ann, "yes!", &m));
        assert!(!tracker.observe(&ann, "yes", &m));
        assert!(!tracker.observe(&ann, "unrelated", &m));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn non_matching_message_does_not_record() {
        let m = yes();
        let mut tracker = DedupTracker::new();
        let ann = ParticipantId::from("ann");

        assert!(!tracker.observe(&ann, "no", &m));
        assert!(!tracker.contains(&ann));
        assert!(tracker.observe(&ann, "YES", &m));
    }

    #[test]
    fn reset_allows_rematch() {
        let m = yes();
        let mut tracker = DedupTracker::new();
        let ann = ParticipantId::from("ann");

        assert!(tracker.observe(&ann, "yes", &m));
        tracker.reset();
        assert!(tracker.is_empty());
        assert!(tracker.observe(&ann, "yes", &m));
    }

    #[test]
    fn participants_are_case_sensitive_and_ordered() {
        let m = yes();
        let mut tracker = DedupTracker::new();

        for name in ["bob", "Ann", "ann", "bob"] {
            tracker.observe(&ParticipantId::from(name), "yes", &m);
        }

        let names: Vec<&str> = tracker.participants().iter().map(ParticipantId::as_str).collect();
        assert_eq!(names, vec!["bob", "Ann", "ann"]);
    }
}
