//! Reactive state container.
//!
//! The container holds the current snapshot and fans every published
//! snapshot out to its subscribers:
//! - Callback subscriptions, delivered synchronously in subscription order
//! - Distinct subscriptions that skip snapshots a comparator calls "same"
//! - Channel watchers for consumers on other threads
//!
//! # Example
//!
//! ```
//! use rxstate::StateContainer;
//! use std::sync::Arc;
//!
//! let container = StateContainer::new(1);
//! let sub = container.subscribe(|value| println!("now {}", value));
//! container.next(Arc::new(2)).unwrap();
//! sub.unsubscribe();
//! ```

mod subject;
mod types;

pub use subject::StateContainer;
pub use types::{ChannelConfig, ChannelSubscription, DropReason, Subscription, SubscriptionId};
