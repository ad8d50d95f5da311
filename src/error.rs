//! Error types for the state manager.

use thiserror::Error;

/// Boxed error returned by a fallible update callback.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for state operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("State container has been disposed")]
    Disposed,

    #[error("Update callback failed: {0}")]
    Callback(#[source] CallbackError),
}

impl StateError {
    /// Wrap a callback failure.
    pub fn callback<E>(err: E) -> Self
    where
        E: Into<CallbackError>,
    {
        StateError::Callback(err.into())
    }

    /// Borrow the callback error, if this is one.
    pub fn as_callback(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            StateError::Callback(err) => Some(err.as_ref()),
            StateError::Disposed => None,
        }
    }
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;
