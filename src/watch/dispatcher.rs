//! Watcher worker.
//!
//! This module owns the keyword session on a dedicated thread and fans match
//! deliveries out to per-subscription streams. Chat ingestion enqueues events on a
//! bounded channel and never blocks the transport.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, never, select, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ChatKeyError, ChatKeyResult, ExecutionError, ValidationError};
use crate::event::{ChatEvent, Delivery};
use crate::matcher::{KeywordMatcher, MatcherOptions};
use crate::session::{KeywordSession, SessionSnapshot};

use super::stream::{MatchStream, SubscriptionId};

/// Watcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Matcher construction options applied to every keyword.
    pub matcher: MatcherOptions,
    /// Max queued chat events before new ones are dropped.
    pub event_queue_capacity: usize,
    /// Max queued control messages (keyword changes, subscriptions).
    pub control_queue_capacity: usize,
    /// Per-subscription stream buffer capacity.
    pub stream_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherOptions::default(),
            event_queue_capacity: 4096,
            control_queue_capacity: 64,
            stream_capacity: 1024,
        }
    }
}

impl WatcherConfig {
    /// Parses a JSON configuration; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` on malformed JSON.
    pub fn from_json_str(json: &str) -> ChatKeyResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            ChatKeyError::Validation(ValidationError::InvalidConfig {
                reason: e.to_string(),
            })
        })
    }

    /// Reads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidConfig` if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> ChatKeyResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ChatKeyError::Validation(ValidationError::InvalidConfig {
                reason: format!("{}: {e}", path.display()),
            })
        })?;
        Self::from_json_str(&json)
    }
}

#[derive(Debug)]
pub(crate) enum ControlMsg {
    SetKeyword {
        matcher: KeywordMatcher,
        reply: Sender<u64>,
    },
    ClearKeyword {
        reply: Sender<u64>,
    },
    Subscribe {
        subscription_id: SubscriptionId,
        stream_tx: Sender<Delivery>,
        reply: Sender<()>,
    },
    Unsubscribe {
        subscription_id: SubscriptionId,
    },
    Snapshot {
        reply: Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: Sender<()>,
    },
}

/// Live-chat keyword watcher: owns the keyword session and dispatches matches.
///
/// All session mutation happens on one worker thread. A keyword change is a
/// barrier: events queued before it are evaluated under the old keyword, and the
/// worker acknowledges before `set_keyword` / `clear_keyword` return, so every
/// event ingested afterwards sees the new keyword and an empty matched-set.
#[derive(Debug)]
pub struct ChatWatcher {
    cfg: WatcherConfig,
    control_tx: Sender<ControlMsg>,
    event_tx: Sender<ChatEvent>,
    dropped_events: AtomicU64,
    dropped_deliveries: Arc<AtomicU64>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl ChatWatcher {
    /// Starts the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the worker thread cannot be spawned.
    pub fn new(cfg: WatcherConfig) -> ChatKeyResult<Self> {
        let (control_tx, control_rx) = bounded::<ControlMsg>(cfg.control_queue_capacity.max(1));
        let (event_tx, event_rx) = bounded::<ChatEvent>(cfg.event_queue_capacity.max(1));

        let dropped_deliveries = Arc::new(AtomicU64::new(0));
        let session = KeywordSession::new(cfg.matcher.clone());

        let thread_dropped = Arc::clone(&dropped_deliveries);
        let join = thread::Builder::new()
            .name("chatkey-watch".to_string())
            .spawn(move || worker_loop(session, thread_dropped, control_rx, event_rx))
            .map_err(|e| ChatKeyError::internal(format!("failed to spawn watcher worker: {e}")))?;

        Ok(Self {
            cfg,
            control_tx,
            event_tx,
            dropped_events: AtomicU64::new(0),
            dropped_deliveries,
            join: Mutex::new(Some(join)),
        })
    }

    /// Configuration the watcher was started with.
    #[must_use]
    pub const fn config(&self) -> &WatcherConfig {
        &self.cfg
    }

    /// Validates, compiles and activates a keyword.
    ///
    /// Compilation happens on the calling thread; on error the active keyword and
    /// matched-set are untouched. Returns the new generation.
    pub fn set_keyword(&self, text: &str) -> ChatKeyResult<u64> {
        let matcher = KeywordMatcher::from_text(text, &self.cfg.matcher)?;
        let (reply_tx, reply_rx) = bounded::<u64>(1);
        self.send_control(ControlMsg::SetKeyword {
            matcher,
            reply: reply_tx,
        })?;
        reply_rx.recv().map_err(|_| ChatKeyError::disconnected("watch_control"))
    }

    /// Disables matching, empties the matched-set and notifies subscribers.
    pub fn clear_keyword(&self) -> ChatKeyResult<u64> {
        let (reply_tx, reply_rx) = bounded::<u64>(1);
        self.send_control(ControlMsg::ClearKeyword { reply: reply_tx })?;
        reply_rx.recv().map_err(|_| ChatKeyError::disconnected("watch_control"))
    }

    /// Opens a delivery stream.
    pub fn subscribe(&self) -> ChatKeyResult<MatchStream> {
        let subscription_id = SubscriptionId::new();
        let (stream_tx, stream_rx) = bounded::<Delivery>(self.cfg.stream_capacity.max(1));
        let stream = MatchStream::new(subscription_id, stream_rx, self.control_tx.clone());

        let (reply_tx, reply_rx) = bounded::<()>(1);
        self.send_control(ControlMsg::Subscribe {
            subscription_id,
            stream_tx,
            reply: reply_tx,
        })?;

        // Wait for ack so no delivery after this call is missed.
        reply_rx.recv().map_err(|_| ChatKeyError::disconnected("watch_control"))?;
        Ok(stream)
    }

    /// Current keyword, generation and matched participants.
    pub fn snapshot(&self) -> ChatKeyResult<SessionSnapshot> {
        let (reply_tx, reply_rx) = bounded::<SessionSnapshot>(1);
        self.send_control(ControlMsg::Snapshot { reply: reply_tx })?;
        reply_rx.recv().map_err(|_| ChatKeyError::disconnected("watch_control"))
    }

    /// Non-blocking chat event enqueue. A full queue drops and counts the event.
    pub fn ingest(&self, event: ChatEvent) {
        if let Err(e) = self.try_ingest(event) {
            let dropped = self.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(dropped, error = %e, "chat event dropped");
        }
    }

    /// Non-blocking chat event enqueue that reports a full queue to the caller.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::QueueFull` when the event queue is at capacity and
    /// `ExecutionError::Disconnected` once the worker has stopped.
    pub fn try_ingest(&self, event: ChatEvent) -> ChatKeyResult<()> {
        enqueue(&self.event_tx, event)
    }

    /// Blocking chat event enqueue, for sources that can wait (files, stdin).
    pub fn ingest_blocking(&self, event: ChatEvent) -> ChatKeyResult<()> {
        self.event_tx
            .send(event)
            .map_err(|_| ChatKeyError::disconnected("watch_events"))
    }

    /// Processes every event already queued, closes all streams and joins the
    /// worker.
    pub fn shutdown(self) -> ChatKeyResult<()> {
        let (reply_tx, reply_rx) = bounded::<()>(1);
        self.send_control(ControlMsg::Shutdown { reply: reply_tx })?;
        reply_rx.recv().map_err(|_| ChatKeyError::disconnected("watch_control"))?;

        let handle = self.join.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| ChatKeyError::internal("watcher worker panicked"))?;
        }
        Ok(())
    }

    /// Chat events dropped by [`ChatWatcher::ingest`] on a full queue.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Deliveries lost to full or closed subscriber streams.
    #[must_use]
    pub fn dropped_deliveries(&self) -> u64 {
        self.dropped_deliveries.load(Ordering::Relaxed)
    }

    fn send_control(&self, msg: ControlMsg) -> ChatKeyResult<()> {
        self.control_tx
            .send(msg)
            .map_err(|_| ChatKeyError::disconnected("watch_control"))
    }
}

impl Drop for ChatWatcher {
    fn drop(&mut self) {
        // Close our senders so the worker can terminate once streams are gone too.
        let (dummy_control_tx, _) = bounded::<ControlMsg>(1);
        drop(std::mem::replace(&mut self.control_tx, dummy_control_tx));

        let (dummy_event_tx, _) = bounded::<ChatEvent>(1);
        drop(std::mem::replace(&mut self.event_tx, dummy_event_tx));

        // Detach rather than join: a live `MatchStream` holds a control sender and
        // would keep the worker (and this drop) waiting.
        if let Ok(mut guard) = self.join.lock() {
            drop(guard.take());
        }
    }
}

fn enqueue(tx: &Sender<ChatEvent>, event: ChatEvent) -> ChatKeyResult<()> {
    tx.try_send(event).map_err(|e| match e {
        TrySendError::Full(_) => ExecutionError::QueueFull {
            path: "watch_events".to_string(),
        }
        .into(),
        TrySendError::Disconnected(_) => ChatKeyError::disconnected("watch_events"),
    })
}

fn dispatch(
    subs: &mut HashMap<SubscriptionId, Sender<Delivery>>,
    delivery: &Delivery,
    dropped: &AtomicU64,
) {
    subs.retain(|id, tx| match tx.try_send(delivery.clone()) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            // Never block the worker on a slow subscriber.
            dropped.fetch_add(1, Ordering::Relaxed);
            warn!(subscription = %id, "delivery dropped, subscriber is full");
            true
        }
        Err(TrySendError::Disconnected(_)) => {
            dropped.fetch_add(1, Ordering::Relaxed);
            debug!(subscription = %id, "subscriber gone");
            false
        }
    });
}

fn process_event(
    session: &mut KeywordSession,
    subs: &mut HashMap<SubscriptionId, Sender<Delivery>>,
    event: &ChatEvent,
    dropped: &AtomicU64,
) {
    if let Some(matched) = session.observe(event) {
        dispatch(subs, &Delivery::Matched(matched), dropped);
    }
}

/// Processes every queued event under the current keyword.
fn drain_events(
    event_rx: &Receiver<ChatEvent>,
    session: &mut KeywordSession,
    subs: &mut HashMap<SubscriptionId, Sender<Delivery>>,
    dropped: &AtomicU64,
) {
    while let Ok(event) = event_rx.try_recv() {
        process_event(session, subs, &event, dropped);
    }
}

fn worker_loop(
    mut session: KeywordSession,
    dropped_deliveries: Arc<AtomicU64>,
    control_rx: Receiver<ControlMsg>,
    event_rx: Receiver<ChatEvent>,
) {
    let mut subs: HashMap<SubscriptionId, Sender<Delivery>> = HashMap::new();

    let mut control_rx = control_rx;
    let mut event_rx = event_rx;
    let mut control_closed = false;
    let mut events_closed = false;
    let mut shutting_down = false;

    loop {
        select! {
            recv(control_rx) -> msg => {
                // Events enqueued before a control message are evaluated under the
                // state that was current when they arrived.
                if matches!(
                    msg,
                    Ok(ControlMsg::SetKeyword { .. }
                        | ControlMsg::ClearKeyword { .. }
                        | ControlMsg::Snapshot { .. }
                        | ControlMsg::Shutdown { .. })
                ) {
                    drain_events(&event_rx, &mut session, &mut subs, &dropped_deliveries);
                }

                match msg {
                    Ok(ControlMsg::SetKeyword { matcher, reply }) => {
                        let generation = session.install(matcher);
                        let _ = reply.send(generation);
                    }
                    Ok(ControlMsg::ClearKeyword { reply }) => {
                        let generation = session.clear_keyword();
                        dispatch(&mut subs, &Delivery::Cleared { generation }, &dropped_deliveries);
                        let _ = reply.send(generation);
                    }
                    Ok(ControlMsg::Subscribe { subscription_id, stream_tx, reply }) => {
                        subs.insert(subscription_id, stream_tx);
                        debug!(subscription = %subscription_id, "subscribed");
                        let _ = reply.send(());
                    }
                    Ok(ControlMsg::Unsubscribe { subscription_id }) => {
                        subs.remove(&subscription_id);
                        debug!(subscription = %subscription_id, "unsubscribed");
                    }
                    Ok(ControlMsg::Snapshot { reply }) => {
                        let _ = reply.send(session.snapshot());
                    }
                    Ok(ControlMsg::Shutdown { reply }) => {
                        let _ = reply.send(());
                        shutting_down = true;
                    }
                    Err(_) => {
                        control_closed = true;
                    }
                }
            }
            recv(event_rx) -> msg => {
                match msg {
                    Ok(event) => process_event(&mut session, &mut subs, &event, &dropped_deliveries),
                    Err(_) => {
                        events_closed = true;
                    }
                }
            }
        }

        if shutting_down || (control_closed && events_closed) {
            break;
        }
        // A closed channel is always ready; park it so select waits on the other.
        if control_closed {
            control_rx = never();
        }
        if events_closed {
            event_rx = never();
        }
    }

    debug!("watcher worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::event::ParticipantId;
    use crate::matcher::MatchMode;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg = WatcherConfig::from_json_str(r#"{"matcher":{"mode":"anchored"},"stream_capacity":8}"#).unwrap();
        assert_eq!(cfg.matcher.mode, MatchMode::Anchored);
        assert_eq!(cfg.stream_capacity, 8);
        assert_eq!(cfg.event_queue_capacity, WatcherConfig::default().event_queue_capacity);
    }

    #[test]
    fn config_rejects_malformed_json() {
        let err = WatcherConfig::from_json_str("{not json").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn set_keyword_rejects_blank_without_state_change() {
        let watcher = ChatWatcher::new(WatcherConfig::default()).unwrap();
        assert_eq!(watcher.set_keyword("yes").unwrap(), 1);

        let err = watcher.set_keyword("  ").unwrap_err();
        assert!(err.is_validation());

        let snap = watcher.snapshot().unwrap();
        assert_eq!(snap.keyword.as_deref(), Some("yes"));
        assert_eq!(snap.generation, 1);
    }

    #[test]
    fn enqueue_reports_full_queue() {
        let (tx, rx) = bounded::<ChatEvent>(1);
        enqueue(&tx, ChatEvent::new("ann", "yes")).unwrap();

        let err = enqueue(&tx, ChatEvent::new("bob", "yes")).unwrap_err();
        assert!(matches!(err, ChatKeyError::Execution(ExecutionError::QueueFull { .. })));
        assert!(err.is_retryable());

        drop(rx);
        let err = enqueue(&tx, ChatEvent::new("eve", "yes")).unwrap_err();
        assert!(matches!(err, ChatKeyError::Execution(ExecutionError::Disconnected { .. })));
    }

    #[test]
    fn try_ingest_accepts_while_worker_runs() {
        let watcher = ChatWatcher::new(WatcherConfig::default()).unwrap();
        watcher.set_keyword("yes").unwrap();
        watcher.try_ingest(ChatEvent::new("ann", "yes")).unwrap();

        assert_eq!(watcher.snapshot().unwrap().matched, vec![ParticipantId::from("ann")]);
        assert_eq!(watcher.dropped_events(), 0);
    }

    #[test]
    fn full_subscriber_counts_dropped_deliveries() {
        let cfg = WatcherConfig {
            stream_capacity: 1,
            ..WatcherConfig::default()
        };
        let watcher = ChatWatcher::new(cfg).unwrap();
        let stream = watcher.subscribe().unwrap();
        watcher.set_keyword("yes").unwrap();

        watcher.ingest_blocking(ChatEvent::new("ann", "yes")).unwrap();
        watcher.ingest_blocking(ChatEvent::new("bob", "yes")).unwrap();

        // Snapshot drains queued events first.
        let snap = watcher.snapshot().unwrap();
        assert_eq!(snap.matched.len(), 2);
        assert_eq!(watcher.dropped_deliveries(), 1);

        let first = stream.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.participant().map(|p| p.as_str()), Some("ann"));
    }
}
