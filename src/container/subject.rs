//! The state container: current snapshot plus an ordered subscriber list.

use crate::error::{Result, StateError};
use crossbeam_channel::{bounded, TrySendError};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

use super::types::{
    ChannelConfig, ChannelSubscription, DropReason, Subscription, SubscriptionId, Unsubscribe,
};

type Callback<T> = Arc<dyn Fn(&Arc<T>) + Send + Sync>;

/// Internal container state.
struct ContainerInner<T> {
    /// Current snapshot.
    value: RwLock<Arc<T>>,
    /// Number of published updates. Only changes under `commit_lock`.
    version: AtomicU64,
    /// Serializes read-derive-write of the snapshot.
    commit_lock: ReentrantMutex<()>,
    /// Serializes deliveries; holds the last version handed to subscribers.
    delivered: ReentrantMutex<Cell<u64>>,
    /// Active subscribers, iterated in id (subscription) order.
    subscribers: Mutex<BTreeMap<SubscriptionId, Callback<T>>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    disposed: AtomicBool,
}

impl<T: Send + Sync + 'static> Unsubscribe for ContainerInner<T> {
    fn remove(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            debug!(subscription = id.0, "unsubscribed");
        }
        removed
    }

    fn contains(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }
}

/// A snapshot stored by [`StateContainer::commit`] but not yet delivered.
pub(crate) struct Committed<T> {
    pub(crate) previous: Arc<T>,
    pub(crate) next: Arc<T>,
    pub(crate) version: u64,
}

/// Records [`DropReason::Disposed`] when a channel watcher's callback is
/// released without another reason set first.
struct WatcherStatus(Arc<Mutex<Option<DropReason>>>);

impl WatcherStatus {
    fn set(&self, reason: DropReason) {
        self.0.lock().get_or_insert(reason);
    }
}

impl Drop for WatcherStatus {
    fn drop(&mut self) {
        self.set(DropReason::Disposed);
    }
}

/// A reactive holder of the current state snapshot.
///
/// Every published snapshot is delivered synchronously to all current
/// subscribers, in subscription order, before `next` returns. New
/// subscribers immediately receive the current snapshot.
///
/// Cloning a container yields another handle to the same state.
///
/// # Concurrency
///
/// Deriving and storing a snapshot is atomic with respect to other
/// publishers, so concurrent updates never overwrite each other. Deliveries
/// from different threads are serialized; a thread whose snapshot was
/// already superseded by a delivered newer one skips its delivery, so
/// subscribers never move backwards across threads. Publishing from inside
/// a callback on the same thread is delivered depth-first.
pub struct StateContainer<T> {
    inner: Arc<ContainerInner<T>>,
}

impl<T> Clone for StateContainer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StateContainer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateContainer")
            .field("value", &*self.inner.value.read())
            .field("version", &self.inner.version.load(Ordering::SeqCst))
            .field("subscriber_count", &self.inner.subscribers.lock().len())
            .field("disposed", &self.inner.disposed.load(Ordering::SeqCst))
            .finish()
    }
}

impl<T: Send + Sync + 'static> StateContainer<T> {
    /// Create a container holding `initial`.
    pub fn new(initial: T) -> Self {
        Self::from_snapshot(Arc::new(initial))
    }

    /// Create a container from an existing snapshot.
    pub fn from_snapshot(initial: Arc<T>) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                value: RwLock::new(initial),
                version: AtomicU64::new(0),
                commit_lock: ReentrantMutex::new(()),
                delivered: ReentrantMutex::new(Cell::new(0)),
                subscribers: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(1),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Current snapshot.
    pub fn value(&self) -> Arc<T> {
        Arc::clone(&self.inner.value.read())
    }

    /// Number of snapshots published since creation.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Publish a new snapshot and notify every subscriber.
    pub fn next(&self, value: Arc<T>) -> Result<()> {
        let committed = self.commit(|_| Ok(value))?;
        self.deliver(&committed);
        Ok(())
    }

    /// Derive the next snapshot from the current one and publish it.
    ///
    /// `derive` runs while other publishers wait, so the snapshot it sees is
    /// the one it replaces. On `Err` nothing is published.
    pub fn update<F>(&self, derive: F) -> Result<()>
    where
        F: FnOnce(&Arc<T>) -> Result<Arc<T>>,
    {
        let committed = self.commit(derive)?;
        self.deliver(&committed);
        Ok(())
    }

    /// Atomically derive and store the next snapshot without notifying.
    pub(crate) fn commit<F>(&self, derive: F) -> Result<Committed<T>>
    where
        F: FnOnce(&Arc<T>) -> Result<Arc<T>>,
    {
        let _commit = self.inner.commit_lock.lock();
        if self.is_disposed() {
            return Err(StateError::Disposed);
        }

        let previous = self.value();
        let next = derive(&previous)?;

        *self.inner.value.write() = Arc::clone(&next);
        let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;

        Ok(Committed {
            previous,
            next,
            version,
        })
    }

    /// Notify subscribers of a committed snapshot.
    pub(crate) fn deliver(&self, committed: &Committed<T>) {
        self.notify(committed.version, &committed.next);
    }

    /// Subscribe to every published snapshot.
    ///
    /// `next` is called with the current snapshot before this returns.
    pub fn subscribe<F>(&self, next: F) -> Subscription
    where
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(next);
        self.subscribe_with(|_| callback)
    }

    /// Subscribe, skipping a snapshot when `is_same(previous, next)` is true.
    ///
    /// `previous` is the last snapshot delivered to this subscriber, not the
    /// last one published. The first snapshot is always delivered.
    pub fn subscribe_distinct<C, F>(&self, is_same: C, next: F) -> Subscription
    where
        C: Fn(&Arc<T>, &Arc<T>) -> bool + Send + Sync + 'static,
        F: Fn(&Arc<T>) + Send + Sync + 'static,
    {
        let last: Mutex<Option<Arc<T>>> = Mutex::new(None);

        self.subscribe(move |value| {
            let deliver = {
                let mut last = last.lock();
                let deliver = match last.as_ref() {
                    Some(previous) => !is_same(previous, value),
                    None => true,
                };
                if deliver {
                    *last = Some(Arc::clone(value));
                }
                deliver
            };

            if deliver {
                next(value);
            }
        })
    }

    /// Deliver snapshots over a bounded channel.
    ///
    /// The current snapshot is queued first. A watcher whose buffer is full
    /// is dropped and its handle records [`DropReason::BufferOverflow`]. A
    /// watcher removed by [`dispose`](Self::dispose) records
    /// [`DropReason::Disposed`].
    pub fn watch(&self, config: ChannelConfig) -> ChannelSubscription<T> {
        let (sender, receiver) = bounded(config.buffer_size.max(1));
        let dropped = Arc::new(Mutex::new(None));
        let status = Arc::clone(&dropped);
        let weak: Weak<ContainerInner<T>> = Arc::downgrade(&self.inner);

        let status = WatcherStatus(status);

        let subscription = self.subscribe_with(move |id| -> Callback<T> {
            Arc::new(move |value: &Arc<T>| {
                let reason = match sender.try_send(Arc::clone(value)) {
                    Ok(()) => return,
                    Err(TrySendError::Full(_)) => DropReason::BufferOverflow,
                    Err(TrySendError::Disconnected(_)) => DropReason::Disconnected,
                };

                warn!(subscription = id.0, ?reason, "dropping channel watcher");
                status.set(reason);
                if let Some(inner) = weak.upgrade() {
                    inner.remove(id);
                }
            })
        });

        ChannelSubscription {
            subscription,
            receiver,
            dropped,
        }
    }

    /// Unsubscribe everything and reject further publishes.
    ///
    /// The last snapshot stays readable through [`value`](Self::value).
    pub fn dispose(&self) {
        let _commit = self.inner.commit_lock.lock();
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let removed = std::mem::take(&mut *self.inner.subscribers.lock());
        debug!(subscribers = removed.len(), "state container disposed");
    }

    /// Register a callback built from its own id, then replay the current
    /// snapshot to it.
    fn subscribe_with<B>(&self, build: B) -> Subscription
    where
        B: FnOnce(SubscriptionId) -> Callback<T>,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        if self.is_disposed() {
            return Subscription::inert(id);
        }

        let callback = build(id);

        // Register and replay under the delivery lock so a concurrent
        // publish cannot reach this subscriber ahead of the replay.
        let _delivery = self.inner.delivered.lock();
        self.inner.subscribers.lock().insert(id, Arc::clone(&callback));
        debug!(subscription = id.0, "subscribed");

        let current = self.value();
        callback(&current);

        let target: Weak<dyn Unsubscribe> = Arc::downgrade(&self.inner) as Weak<dyn Unsubscribe>;
        Subscription::new(id, target)
    }

    /// Call subscribers outside the subscriber lock so they may read or
    /// publish.
    fn notify(&self, version: u64, value: &Arc<T>) {
        let delivered = self.inner.delivered.lock();
        if version <= delivered.get() {
            trace!(version, "snapshot superseded before delivery");
            return;
        }
        delivered.set(version);

        let callbacks: Vec<(SubscriptionId, Callback<T>)> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        trace!(version, subscribers = callbacks.len(), "publishing snapshot");

        for (id, callback) in callbacks {
            // Skip subscribers removed by an earlier callback in this pass.
            if !self.inner.contains(id) {
                continue;
            }
            callback(value);
        }
    }
}
