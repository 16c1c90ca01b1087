//! Error types for pool operations
use std::fmt;

use thiserror::Error;

use crate::lease::LeaseId;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Pool configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// No permit became available before the deadline
    #[error("Borrow from pool '{pool}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The pool name
        pool: String,
        /// The timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// Every item is checked out and the caller asked not to wait
    #[error("Pool '{pool}' exhausted: {capacity}/{capacity} in use, {waiters} waiting")]
    Exhausted {
        /// The pool name
        pool: String,
        /// Fixed pool capacity
        capacity: usize,
        /// Number of borrowers waiting for a permit
        waiters: usize,
    },

    /// The caller's cancellation token fired while waiting
    #[error("Borrow from pool '{pool}' was cancelled")]
    Cancelled {
        /// The pool name
        pool: String,
    },

    /// An item was returned that this pool does not have on loan
    #[error("Invalid return to pool '{pool}': lease {lease} is not outstanding")]
    InvalidReturn {
        /// The pool name
        pool: String,
        /// The rejected lease
        lease: LeaseId,
    },

    /// The pool was closed
    #[error("Pool '{pool}' is closed")]
    PoolClosed {
        /// The pool name
        pool: String,
    },

    /// Internal invariant broken
    #[error("Internal error in pool '{pool}': {message}")]
    Internal {
        /// The pool name
        pool: String,
        /// The error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn timeout(pool: &str, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            pool: pool.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub(crate) fn closed(pool: &str) -> Self {
        Self::PoolClosed {
            pool: pool.to_string(),
        }
    }

    pub(crate) fn cancelled(pool: &str) -> Self {
        Self::Cancelled {
            pool: pool.to_string(),
        }
    }

    pub(crate) fn invalid_return(pool: &str, lease: LeaseId) -> Self {
        Self::InvalidReturn {
            pool: pool.to_string(),
            lease,
        }
    }

    pub(crate) fn internal<S: Into<String>>(pool: &str, message: S) -> Self {
        Self::Internal {
            pool: pool.to_string(),
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Exhausted { .. })
    }

    /// Get the pool name associated with this error (if any)
    #[must_use]
    pub fn pool(&self) -> Option<&str> {
        match self {
            Self::Configuration { .. } => None,
            Self::Timeout { pool, .. }
            | Self::Exhausted { pool, .. }
            | Self::Cancelled { pool }
            | Self::InvalidReturn { pool, .. }
            | Self::PoolClosed { pool }
            | Self::Internal { pool, .. } => Some(pool),
        }
    }
}

/// A raw item handed back to the caller because the pool refused it.
///
/// Returned by [`Pool::return_item`](crate::Pool::return_item) so a rejected
/// item is never silently dropped.
pub struct Rejected<T> {
    item: T,
    error: Error,
}

impl<T> Rejected<T> {
    pub(crate) fn new(item: T, error: Error) -> Self {
        Self { item, error }
    }

    /// Why the item was refused.
    #[must_use]
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// Take the item back.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.item
    }

    /// Split into the item and the error.
    #[must_use]
    pub fn into_parts(self) -> (T, Error) {
        (self.item, self.error)
    }
}

impl<T> fmt::Debug for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for Rejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<T> std::error::Error for Rejected<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl<T> From<Rejected<T>> for Error {
    fn from(rejected: Rejected<T>) -> Self {
        rejected.error
    }
}
