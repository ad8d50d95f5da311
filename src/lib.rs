//! # rxstate
//!
//! A reactive state container bound to component render cycles, with
//! draft-based immutable updates.
//!
//! ## Core Concepts
//!
//! - **Container**: Holds the current immutable snapshot and broadcasts every
//!   new one to its subscribers, synchronously and in subscription order
//! - **Bindings**: One per component instance; re-render only when a watched
//!   field changes
//! - **Drafts**: Updates mutate a private copy that becomes the next snapshot
//!
//! ## Example
//!
//! ```
//! use rxstate::{rx_state_manager, watch_fields};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Counter {
//!     a: i32,
//!     b: i32,
//! }
//!
//! watch_fields!(Counter { a, b });
//!
//! let manager = rx_state_manager(Counter { a: 1, b: 2 });
//!
//! // Inside a component render
//! let mut slot = None;
//! let state = manager.use_state_manager(&mut slot, &["a"]);
//! assert_eq!(state.a, 1);
//!
//! // Elsewhere
//! manager.update_state(|draft| draft.b = 3).unwrap();
//! assert_eq!(slot.as_ref().unwrap().render_requests(), 0);
//!
//! manager.update_state(|draft| draft.a = 5).unwrap();
//! assert_eq!(slot.as_ref().unwrap().render_requests(), 1);
//! ```

pub mod binding;
pub mod container;
pub mod draft;
pub mod error;
pub mod fields;
pub mod manager;
pub mod types;

// Re-exports
pub use binding::{Binding, RenderHost};
pub use container::{
    ChannelConfig, ChannelSubscription, DropReason, StateContainer, Subscription, SubscriptionId,
};
pub use draft::{produce, try_produce, Draft};
pub use error::{CallbackError, Result, StateError};
pub use fields::WatchFields;
pub use manager::{rx_state_manager, StateManager};
pub use types::{ResubscribePolicy, StateManagerConfig, UpdateHook};
