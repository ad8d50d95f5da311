//! Configuration types for the state manager.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// When a binding tears down and re-establishes its subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResubscribePolicy {
    /// Resubscribe only when the number of watched keys changes.
    ///
    /// Swapping `["a"]` for `["b"]` keeps filtering on `"a"`. This matches
    /// the historical behaviour and is the default.
    #[default]
    KeyCount,
    /// Resubscribe whenever the watched key sequence differs.
    KeySequence,
}

/// Instrumentation hook called with `(previous, next)` before a snapshot
/// is published.
pub type UpdateHook<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

/// State manager configuration.
pub struct StateManagerConfig<T> {
    /// Binding resubscription policy.
    /// Default: `KeyCount`
    pub resubscribe: ResubscribePolicy,

    /// Optional hook observing every update.
    pub on_update: Option<UpdateHook<T>>,
}

impl<T> Default for StateManagerConfig<T> {
    fn default() -> Self {
        Self {
            resubscribe: ResubscribePolicy::default(),
            on_update: None,
        }
    }
}

impl<T> Clone for StateManagerConfig<T> {
    fn clone(&self) -> Self {
        Self {
            resubscribe: self.resubscribe,
            on_update: self.on_update.clone(),
        }
    }
}

impl<T> std::fmt::Debug for StateManagerConfig<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManagerConfig")
            .field("resubscribe", &self.resubscribe)
            .field("on_update", &self.on_update.is_some())
            .finish()
    }
}
