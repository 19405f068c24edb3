//! Socket configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Default connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;

/// Default pause between input/output loop cycles in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default number of buffers the output queue holds before `enqueue` blocks
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Default number of released buffers kept for reuse
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Socket configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketConfig {
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Sleep between loop cycles in milliseconds
    pub poll_interval_ms: u64,
    /// Output queue capacity in buffers
    pub queue_capacity: usize,
    /// Buffer pool capacity in buffers
    pub pool_capacity: usize,
    /// TCP keep-alive interval in seconds (0 = disabled)
    pub keepalive_secs: u64,
    /// Disable Nagle's algorithm
    pub nodelay: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            keepalive_secs: 0,
            nodelay: true,
        }
    }
}

impl SocketConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(TransportError::InvalidConfig(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(TransportError::InvalidConfig(
                "poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
