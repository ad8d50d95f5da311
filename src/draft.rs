//! Draft-based production of immutable snapshots.
//!
//! A recipe receives a [`Draft`] over a private copy of the base value and
//! mutates it freely. The base snapshot is never touched, so a recipe that
//! fails or panics leaves nothing half-updated behind.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// Temporary mutable view over a copy of the current value.
#[derive(Debug)]
pub struct Draft<T> {
    value: T,
    modified: bool,
}

impl<T> Draft<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            modified: false,
        }
    }

    /// Replace the whole value, returning the previous draft contents.
    pub fn replace(&mut self, value: T) -> T {
        self.modified = true;
        std::mem::replace(&mut self.value, value)
    }

    /// Whether the draft was mutably accessed or replaced.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    fn finish(self) -> Arc<T> {
        Arc::new(self.value)
    }
}

impl<T> Deref for Draft<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for Draft<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.modified = true;
        &mut self.value
    }
}

/// Produce a new snapshot by applying `recipe` to a draft of `base`.
///
/// Always returns a fresh snapshot, even if the recipe changed nothing.
pub fn produce<T, F>(base: &T, recipe: F) -> Arc<T>
where
    T: Clone,
    F: FnOnce(&mut Draft<T>),
{
    let mut draft = Draft::new(base.clone());
    recipe(&mut draft);
    draft.finish()
}

/// Fallible [`produce`]. On `Err` the draft is discarded.
pub fn try_produce<T, E, F>(base: &T, recipe: F) -> Result<Arc<T>, E>
where
    T: Clone,
    F: FnOnce(&mut Draft<T>) -> Result<(), E>,
{
    let mut draft = Draft::new(base.clone());
    recipe(&mut draft)?;
    Ok(draft.finish())
}
