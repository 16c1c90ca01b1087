//! Pool configuration types

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Order in which idle items are handed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Strategy {
    /// Oldest returned item first. Spreads wear evenly across items.
    #[default]
    Fifo,
    /// Most recently returned item first.
    Lifo,
}

/// Configuration for a [`Pool`](super::Pool)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Name used in logs, events and errors
    pub name: String,
    /// Deadline for [`Pool::borrow`](super::Pool::borrow). `None` waits forever.
    pub acquire_timeout: Option<Duration>,
    /// Hand-out order for idle items
    pub strategy: Strategy,
    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "pool".to_string(),
            acquire_timeout: None,
            strategy: Strategy::Fifo,
            event_buffer: 1024,
        }
    }
}

impl PoolConfig {
    /// Create a default config with the given pool name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the default borrow deadline.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Set the hand-out order.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Validate pool configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::configuration("name must not be empty"));
        }
        if self.acquire_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::configuration(
                "acquire_timeout must be greater than zero",
            ));
        }
        if self.event_buffer == 0 {
            return Err(Error::configuration(
                "event_buffer must be greater than zero",
            ));
        }
        Ok(())
    }
}
