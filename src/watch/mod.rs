//! Concurrent host for the keyword session.
//!
//! The watcher runs the session on its own thread so the chat transport, the
//! operator controls and the subscribers never share mutable state. A future
//! network front end can layer on top of `ChatWatcher` and `MatchStream`.

/// Session worker and event dispatch.
pub mod dispatcher;
/// Subscriber stream handle.
pub mod stream;

pub use dispatcher::{ChatWatcher, WatcherConfig};
pub use stream::{MatchStream, SubscriptionId};
