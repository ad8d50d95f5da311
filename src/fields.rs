//! Named-field comparison used by binding filters.
//!
//! Bindings watch fields by name. A state type opts in by implementing
//! [`WatchFields`], usually through the [`watch_fields!`](crate::watch_fields)
//! macro. Keys that name no field compare as equal, so a binding watching
//! only unknown keys never re-renders after its first delivery.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

/// Field-level equality between two snapshots of the same state type.
pub trait WatchFields {
    /// Whether the field named `key` holds the same value in `self` and `other`.
    fn field_eq(&self, other: &Self, key: &str) -> bool;

    /// Whether every field in `keys` is unchanged between `self` and `other`.
    fn fields_eq<K: AsRef<str>>(&self, other: &Self, keys: &[K]) -> bool {
        keys.iter().all(|key| self.field_eq(other, key.as_ref()))
    }
}

impl<T: WatchFields + ?Sized> WatchFields for std::sync::Arc<T> {
    fn field_eq(&self, other: &Self, key: &str) -> bool {
        (**self).field_eq(other, key)
    }
}

impl<K, V> WatchFields for BTreeMap<K, V>
where
    K: std::borrow::Borrow<str> + Ord,
    V: PartialEq,
{
    fn field_eq(&self, other: &Self, key: &str) -> bool {
        self.get(key) == other.get(key)
    }
}

impl<K, V, S> WatchFields for HashMap<K, V, S>
where
    K: std::borrow::Borrow<str> + Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn field_eq(&self, other: &Self, key: &str) -> bool {
        self.get(key) == other.get(key)
    }
}

/// Implement [`WatchFields`] for a struct by listing its watchable fields.
///
/// Listed fields are compared with `PartialEq`. Any other key compares equal.
///
/// ```
/// use rxstate::{watch_fields, WatchFields};
///
/// #[derive(Clone)]
/// struct Counter {
///     a: i32,
///     b: i32,
/// }
///
/// watch_fields!(Counter { a, b });
///
/// let before = Counter { a: 1, b: 2 };
/// let after = Counter { a: 1, b: 3 };
/// assert!(before.field_eq(&after, "a"));
/// assert!(!before.field_eq(&after, "b"));
/// ```
#[macro_export]
macro_rules! watch_fields {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::WatchFields for $ty {
            fn field_eq(&self, other: &Self, key: &str) -> bool {
                match key {
                    $(stringify!($field) => self.$field == other.$field,)*
                    _ => true,
                }
            }
        }
    };
}
