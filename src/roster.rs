//! Matched-name export.
//!
//! Operators copy the list of matched participants out of the tool, usually to
//! announce winners. Display names in live chat are full of decorative symbols, so
//! besides the raw list there are two cleaned-up renderings.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::event::ParticipantId;

/// Separator used by [`Roster::join`].
pub const ROSTER_SEPARATOR: &str = ", ";

/// How participant names are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterStyle {
    /// Names exactly as received.
    #[default]
    Raw,
    /// Letters and spaces only, capitalized, deduplicated.
    Sanitized,
    /// First word of the sanitized name, capitalized, deduplicated.
    FirstWord,
}

/// Renders matched participants.
#[derive(Debug, Clone, Copy, Default)]
pub struct Roster;

impl Roster {
    /// Renders names in order, dropping blanks and (for cleaned styles) duplicates.
    #[must_use]
    pub fn render(participants: &[ParticipantId], style: RosterStyle) -> Vec<String> {
        match style {
            RosterStyle::Raw => participants.iter().map(|p| p.as_str().to_string()).collect(),
            RosterStyle::Sanitized => dedup(participants.iter().map(|p| capitalize(&sanitize_name(p.as_str())))),
            RosterStyle::FirstWord => dedup(participants.iter().map(|p| {
                let cleaned = sanitize_name(p.as_str());
                capitalize(cleaned.split(' ').next().unwrap_or_default())
            })),
        }
    }

    /// Renders names as one comma-separated line.
    #[must_use]
    pub fn join(participants: &[ParticipantId], style: RosterStyle) -> String {
        Self::render(participants, style).join(ROSTER_SEPARATOR)
    }
}

/// Keeps letters and whitespace (after NFKD), collapses whitespace, trims.
///
/// Combining marks are dropped, so accented letters keep their base letter.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_alphabetic() || c.is_whitespace() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-cases the first character and lower-cases the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn dedup(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ParticipantId> {
        names.iter().copied().map(ParticipantId::from).collect()
    }

    #[test]
    fn sanitize_strips_symbols_and_accents() {
        assert_eq!(sanitize_name("✨ J\u{00F6}rg_99 ✨"), "Jorg");
        assert_eq!(sanitize_name("  anna   maria "), "anna maria");
        assert_eq!(sanitize_name("🔥🔥"), "");
    }

    #[test]
    fn raw_keeps_everything() {
        let names = ids(&["✨Ann✨", "bob", "bob"]);
        assert_eq!(Roster::render(&names, RosterStyle::Raw), vec!["✨Ann✨", "bob", "bob"]);
    }

    #[test]
    fn sanitized_capitalizes_and_dedups() {
        let names = ids(&["✨ANN✨", "ann", "🔥🔥", "anna maria"]);
        assert_eq!(
            Roster::join(&names, RosterStyle::Sanitized),
            "Ann, Anna maria"
        );
    }

    #[test]
    fn first_word_dedups_after_split() {
        let names = ids(&["anna maria", "Anna_B", "joe.k"]);
        assert_eq!(
            Roster::render(&names, RosterStyle::FirstWord),
            vec!["Anna", "Joe"]
        );
    }
}
