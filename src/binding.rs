//! Per-component bindings to a state container.
//!
//! A [`Binding`] belongs to one component instance. Calling
//! [`Binding::use_state`] during each render keeps a filtered subscription
//! alive and returns the snapshot the component should draw. When a
//! delivered snapshot changes a watched field, the binding asks its
//! [`RenderHost`] for a re-render and raises its dirty flag.

use crate::container::{StateContainer, Subscription, SubscriptionId};
use crate::fields::WatchFields;
use crate::types::ResubscribePolicy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// The hosting framework's re-render trigger.
pub trait RenderHost: Send + Sync {
    fn request_render(&self);
}

impl<F> RenderHost for F
where
    F: Fn() + Send + Sync,
{
    fn request_render(&self) {
        self()
    }
}

/// State shared between a binding and its subscription callback.
struct BindingShared<T> {
    /// Snapshot the component renders with.
    current: Mutex<Arc<T>>,
    dirty: AtomicBool,
    render_requests: AtomicU64,
    host: Option<Arc<dyn RenderHost>>,
}

impl<T> BindingShared<T> {
    /// Store a delivered snapshot. Re-delivering the held snapshot is a no-op.
    fn deliver(&self, value: &Arc<T>) {
        {
            let mut current = self.current.lock();
            if Arc::ptr_eq(&current, value) {
                return;
            }
            *current = Arc::clone(value);
        }

        self.dirty.store(true, Ordering::SeqCst);
        self.render_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(host) = &self.host {
            host.request_render();
        }
    }
}

/// One component instance's view of a state container.
///
/// Dropping the binding (or calling [`unmount`](Self::unmount)) tears its
/// subscription down.
pub struct Binding<T> {
    container: StateContainer<T>,
    policy: ResubscribePolicy,
    shared: Arc<BindingShared<T>>,
    subscription: Option<Subscription>,
    /// Keys in effect for the live subscription.
    watched: Option<Vec<String>>,
}

impl<T> Binding<T>
where
    T: WatchFields + Send + Sync + 'static,
{
    pub(crate) fn new(
        container: StateContainer<T>,
        policy: ResubscribePolicy,
        host: Option<Arc<dyn RenderHost>>,
    ) -> Self {
        let current = container.value();
        Self {
            container,
            policy,
            shared: Arc::new(BindingShared {
                current: Mutex::new(current),
                dirty: AtomicBool::new(false),
                render_requests: AtomicU64::new(0),
                host,
            }),
            subscription: None,
            watched: None,
        }
    }

    /// Subscribe if needed and return the snapshot to render.
    ///
    /// An empty `keys` slice re-renders on every published snapshot.
    pub fn use_state<K: AsRef<str>>(&mut self, keys: &[K]) -> Arc<T> {
        if self.watched.is_none() && self.render_requests() == 0 {
            // First render: start from the latest snapshot so the replay on
            // subscribe is not mistaken for a change.
            *self.shared.current.lock() = self.container.value();
        }
        if self.needs_subscribe(keys) {
            self.resubscribe(keys);
        }
        self.current()
    }

    /// Most recently delivered snapshot.
    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.shared.current.lock())
    }

    /// Tear the subscription down. A later `use_state` subscribes afresh.
    pub fn unmount(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.watched = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .as_ref()
            .map_or(false, Subscription::is_active)
    }

    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.subscription.as_ref().map(Subscription::id)
    }

    /// Keys the live subscription filters on.
    pub fn watched_keys(&self) -> Option<&[String]> {
        self.watched.as_deref()
    }

    /// Number of re-renders requested so far.
    pub fn render_requests(&self) -> u64 {
        self.shared.render_requests.load(Ordering::SeqCst)
    }

    /// Clear and return the dirty flag.
    pub fn take_dirty(&self) -> bool {
        self.shared.dirty.swap(false, Ordering::SeqCst)
    }

    fn needs_subscribe<K: AsRef<str>>(&self, keys: &[K]) -> bool {
        let Some(watched) = &self.watched else {
            return true;
        };

        match self.policy {
            ResubscribePolicy::KeyCount => watched.len() != keys.len(),
            ResubscribePolicy::KeySequence => watched
                .iter()
                .map(String::as_str)
                .ne(keys.iter().map(AsRef::as_ref)),
        }
    }

    fn resubscribe<K: AsRef<str>>(&mut self, keys: &[K]) {
        if let Some(previous) = self.subscription.take() {
            previous.unsubscribe();
        }

        let watched: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let filter_keys = watched.clone();
        let shared = Arc::clone(&self.shared);

        let subscription = self.container.subscribe_distinct(
            move |previous, next| !filter_keys.is_empty() && previous.fields_eq(next, &filter_keys),
            move |value| shared.deliver(value),
        );

        debug!(
            subscription = subscription.id().0,
            keys = ?watched,
            "binding subscribed"
        );
        self.subscription = Some(subscription);
        self.watched = Some(watched);
    }
}

impl<T> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("policy", &self.policy)
            .field("subscription", &self.subscription)
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}
