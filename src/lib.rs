//! # chatkey - keyword matching for live chat
//!
//! chatkey watches a live chat stream and reports every participant whose message
//! matches an operator-chosen keyword, once per participant per keyword.
//!
//! ## Core Concepts
//!
//! - **Keyword**: trimmed operator text; a single word or a phrase
//! - **KeywordMatcher**: compiled predicate tolerant of plurals, elongation,
//!   trailing punctuation/emoji and `@` mentions
//! - **DedupTracker**: the matched-set for the current keyword generation
//! - **KeywordSession**: keyword, matcher and matched-set under one generation
//! - **ChatWatcher**: threaded host fanning matches out to `MatchStream`s
//!
//! ## Usage
//!
//! ```rust
//! use chatkey::{ChatEvent, KeywordSession, MatcherOptions};
//!
//! let mut session = KeywordSession::new(MatcherOptions::default());
//! session.set_keyword("happy birthday")?;
//!
//! let first = session.observe(&ChatEvent::new("ann", "Happy   birthday!! 🎉"));
//! assert!(first.is_some());
//!
//! // Same participant again: already matched under this keyword.
//! assert!(session.observe(&ChatEvent::new("ann", "happy birthday")).is_none());
//! # Ok::<(), chatkey::ValidationError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod event;
pub mod keyword;
pub mod matcher;
pub mod roster;
pub mod session;
pub mod tracker;
pub mod watch;

// Re-export primary types at crate root for convenience
pub use error::{ChatKeyError, ChatKeyResult, ExecutionError, ValidationError};
pub use event::{ChatEvent, Delivery, MatchEvent, ParticipantId};
pub use keyword::{normalize_text, Keyword};
pub use matcher::{KeywordMatcher, MatchMode, MatcherOptions};
pub use roster::{Roster, RosterStyle};
pub use session::{KeywordSession, SessionSnapshot};
pub use tracker::DedupTracker;
pub use watch::{ChatWatcher, MatchStream, SubscriptionId, WatcherConfig};
