//! Run flag shared by the input and output loops of one connection

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Cooperative stop signal.
///
/// Created alive by `connect`, handed to both loops when they are spawned,
/// and flipped exactly once by `close`. A socket that never connected holds
/// a [`stopped`](Self::stopped) one.
#[derive(Debug)]
pub struct KeepAlive {
    alive: AtomicBool,
    notify: Notify,
}

impl KeepAlive {
    pub fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            notify: Notify::new(),
        }
    }

    /// A token that is already stopped
    pub fn stopped() -> Self {
        Self {
            alive: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stop the connection. Returns `false` if it was already stopped.
    pub fn cancel(&self) -> bool {
        let was_alive = self.alive.swap(false, Ordering::SeqCst);
        if was_alive {
            self.notify.notify_waiters();
        }
        was_alive
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_alive() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep between loop cycles. Returns whether the loop should go on.
    pub async fn pause(&self, interval: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(interval) => self.is_alive(),
            _ = self.cancelled() => false,
        }
    }
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self::new()
    }
}
