//! Subscription types for the state container.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// Unique identifier for a subscription. Ids grow monotonically, so
/// ordering by id is subscription order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Configuration for a channel watcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Max buffered snapshots before the watcher is dropped.
    /// Default: 1000
    pub buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

/// Why a channel watcher stopped receiving snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Receiver went away.
    Disconnected,
    /// Explicitly unsubscribed.
    Unsubscribed,
    /// The container was disposed or dropped.
    Disposed,
}

/// Removal side of a container, erased over the value type.
pub(crate) trait Unsubscribe: Send + Sync {
    fn remove(&self, id: SubscriptionId) -> bool;
    fn contains(&self, id: SubscriptionId) -> bool;
}

/// Handle to an active subscription.
///
/// Dropping the handle unsubscribes. A handle returned by a disposed
/// container is inert from the start.
pub struct Subscription {
    id: SubscriptionId,
    target: Option<Weak<dyn Unsubscribe>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, target: Weak<dyn Unsubscribe>) -> Self {
        Self {
            id,
            target: Some(target),
        }
    }

    pub(crate) fn inert(id: SubscriptionId) -> Self {
        Self { id, target: None }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Whether the container still delivers to this subscription.
    pub fn is_active(&self) -> bool {
        self.target
            .as_ref()
            .and_then(Weak::upgrade)
            .map_or(false, |target| target.contains(self.id))
    }

    /// Stop receiving values.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(target) = self.target.take().and_then(|weak| weak.upgrade()) {
            target.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Snapshots delivered over a bounded channel.
pub struct ChannelSubscription<T> {
    pub(crate) subscription: Subscription,
    /// Channel to receive snapshots.
    pub receiver: crossbeam_channel::Receiver<Arc<T>>,
    pub(crate) dropped: Arc<Mutex<Option<DropReason>>>,
}

impl<T> ChannelSubscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    /// Receive the next snapshot (blocking).
    pub fn recv(&self) -> Result<Arc<T>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a snapshot (non-blocking).
    pub fn try_recv(&self) -> Result<Arc<T>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Arc<T>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Why the container stopped delivering, if it did.
    pub fn drop_reason(&self) -> Option<DropReason> {
        self.dropped.lock().clone()
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }

    /// Stop receiving snapshots. Already buffered snapshots stay readable.
    pub fn unsubscribe(&mut self) {
        self.dropped.lock().get_or_insert(DropReason::Unsubscribed);
        self.subscription.release();
    }
}
