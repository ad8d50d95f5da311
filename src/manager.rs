//! The state manager: one container, its bindings, and draft updates.

use crate::binding::{Binding, RenderHost};
use crate::container::StateContainer;
use crate::draft::{produce, try_produce, Draft};
use crate::error::{CallbackError, Result, StateError};
use crate::fields::WatchFields;
use crate::types::{ResubscribePolicy, StateManagerConfig, UpdateHook};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace};

/// Settings shared by every handle to one manager.
struct ManagerShared<T> {
    resubscribe: ResubscribePolicy,
    on_update: RwLock<Option<UpdateHook<T>>>,
}

/// Binds a state container to component renders and updates it through
/// drafts.
///
/// Provides:
/// - [`use_state_manager`](Self::use_state_manager) for components
/// - [`update_state`](Self::update_state) to derive and publish a new snapshot
/// - [`state`](Self::state) for direct access to the container
///
/// Cloning yields another handle to the same container.
pub struct StateManager<T> {
    state: StateContainer<T>,
    shared: Arc<ManagerShared<T>>,
}

impl<T> Clone for StateManager<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for StateManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("state", &self.state)
            .field("resubscribe", &self.shared.resubscribe)
            .finish_non_exhaustive()
    }
}

/// Create a state manager holding `initial`.
pub fn rx_state_manager<T>(initial: T) -> StateManager<T>
where
    T: Clone + Send + Sync + 'static,
{
    StateManager::new(initial)
}

impl<T> StateManager<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a manager with default configuration.
    pub fn new(initial: T) -> Self {
        Self::with_config(initial, StateManagerConfig::default())
    }

    /// Create a manager with the given configuration.
    pub fn with_config(initial: T, config: StateManagerConfig<T>) -> Self {
        Self {
            state: StateContainer::new(initial),
            shared: Arc::new(ManagerShared {
                resubscribe: config.resubscribe,
                on_update: RwLock::new(config.on_update),
            }),
        }
    }

    /// The underlying container, for direct reads or composition.
    pub fn state(&self) -> &StateContainer<T> {
        &self.state
    }

    /// Current snapshot.
    pub fn value(&self) -> Arc<T> {
        self.state.value()
    }

    pub fn resubscribe_policy(&self) -> ResubscribePolicy {
        self.shared.resubscribe
    }

    /// Install (or clear) the update hook.
    pub fn on_update(&self, hook: Option<UpdateHook<T>>) {
        *self.shared.on_update.write() = hook;
    }

    /// Apply `recipe` to a draft of the current snapshot and publish the
    /// result.
    ///
    /// Always publishes, even if nothing changed; bindings do the filtering.
    /// Other publishers wait while `recipe` runs, so concurrent updates
    /// never overwrite each other. If `recipe` panics, nothing is published.
    pub fn update_state<F>(&self, recipe: F) -> Result<()>
    where
        F: FnOnce(&mut Draft<T>),
    {
        self.publish(|base| Ok(produce(&**base, recipe)))
    }

    /// Fallible [`update_state`](Self::update_state).
    ///
    /// On `Err` nothing is published and the error is returned as
    /// [`StateError::Callback`].
    pub fn try_update_state<E, F>(&self, recipe: F) -> Result<()>
    where
        E: Into<CallbackError>,
        F: FnOnce(&mut Draft<T>) -> std::result::Result<(), E>,
    {
        self.publish(|base| try_produce(&**base, recipe).map_err(StateError::callback))
    }

    /// Publish `value` as the next snapshot.
    pub fn set_state(&self, value: T) -> Result<()> {
        self.publish(|_| Ok(Arc::new(value)))
    }

    /// Unsubscribe every binding and watcher and reject further updates.
    pub fn dispose(&self) {
        debug!("disposing state manager");
        self.state.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// Commit the derived snapshot, run the update hook, then notify.
    fn publish<F>(&self, derive: F) -> Result<()>
    where
        F: FnOnce(&Arc<T>) -> Result<Arc<T>>,
    {
        let committed = self.state.commit(derive)?;

        let hook = self.shared.on_update.read().clone();
        if let Some(hook) = hook {
            hook(&*committed.previous, &*committed.next);
        }

        trace!(version = committed.version, "update committed");
        self.state.deliver(&committed);
        Ok(())
    }
}

impl<T> StateManager<T>
where
    T: Clone + WatchFields + Send + Sync + 'static,
{
    /// A new, not yet subscribed binding for one component instance.
    pub fn binding(&self) -> Binding<T> {
        Binding::new(self.state.clone(), self.shared.resubscribe, None)
    }

    /// A binding that calls `host` whenever it needs a re-render.
    pub fn binding_with_host<H>(&self, host: H) -> Binding<T>
    where
        H: RenderHost + 'static,
    {
        let host: Arc<dyn RenderHost> = Arc::new(host);
        Binding::new(self.state.clone(), self.shared.resubscribe, Some(host))
    }

    /// Hook-style entry point for a component render.
    ///
    /// `slot` is the component instance's binding storage. The first call
    /// creates and subscribes the binding; later calls resubscribe only as
    /// the resubscribe policy dictates. Dropping the slot's binding on
    /// component removal unsubscribes it.
    pub fn use_state_manager<K: AsRef<str>>(
        &self,
        slot: &mut Option<Binding<T>>,
        keys: &[K],
    ) -> Arc<T> {
        slot.get_or_insert_with(|| self.binding()).use_state(keys)
    }
}
