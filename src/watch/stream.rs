use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChatKeyError, ChatKeyResult, ExecutionError};
use crate::event::Delivery;

use super::dispatcher::ControlMsg;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A subscriber's view of the delivery channel.
///
/// Deliveries arrive in first-match order. Dropping this stream attempts
/// best-effort unregistration.
#[derive(Debug)]
pub struct MatchStream {
    subscription_id: SubscriptionId,
    rx: Receiver<Delivery>,
    control_tx: Sender<ControlMsg>,
    unregistered: AtomicBool,
}

impl MatchStream {
    pub(crate) fn new(
        subscription_id: SubscriptionId,
        rx: Receiver<Delivery>,
        control_tx: Sender<ControlMsg>,
    ) -> Self {
        Self {
            subscription_id,
            rx,
            control_tx,
            unregistered: AtomicBool::new(false),
        }
    }

    /// The subscription id backing this stream.
    #[must_use]
    pub const fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Best-effort explicit unregistration.
    ///
    /// Non-blocking and idempotent. Deliveries already buffered can still be
    /// received; afterwards the stream reports disconnection.
    pub fn unsubscribe(&self) {
        if self.unregistered.swap(true, Ordering::AcqRel) {
            return;
        }

        let _ = self.control_tx.try_send(ControlMsg::Unsubscribe {
            subscription_id: self.subscription_id,
        });
    }

    /// Receive the next delivery (blocking).
    ///
    /// Returns an error once the worker stops after [`ChatWatcher::shutdown`]. A
    /// watcher dropped without `shutdown` keeps its worker alive for as long as any
    /// stream exists, so this call would block indefinitely; prefer `recv_timeout`
    /// in that case.
    ///
    /// [`ChatWatcher::shutdown`]: super::ChatWatcher::shutdown
    pub fn recv(&self) -> ChatKeyResult<Delivery> {
        self.rx.recv().map_err(|_| ChatKeyError::disconnected("match_stream"))
    }

    /// Receive the next delivery with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> ChatKeyResult<Delivery> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => ChatKeyError::Execution(ExecutionError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            RecvTimeoutError::Disconnected => ChatKeyError::disconnected("match_stream"),
        })
    }

    /// Receive a delivery if one is buffered.
    pub fn try_recv(&self) -> ChatKeyResult<Option<Delivery>> {
        match self.rx.try_recv() {
            Ok(d) => Ok(Some(d)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(ChatKeyError::disconnected("match_stream")),
        }
    }
}

impl Drop for MatchStream {
    fn drop(&mut self) {
        // Best-effort: do not block on shutdown.
        self.unsubscribe();
    }
}
