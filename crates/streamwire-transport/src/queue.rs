//! Bounded FIFO of outbound buffers
//!
//! A slot is taken when a buffer is pushed and given back only once the
//! writer is done with it (written or discarded), so a full queue blocks
//! producers until the writer catches up.
//!
//! Queued bytes cover every buffer not yet confirmed written: the buffers
//! waiting in the queue plus the one the writer has taken and is writing.
//!
//! Each connection gets its own queue. Closing it turns away new pushes and
//! wakes producers waiting for a slot.

use bytes::BytesMut;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Semaphore, TryAcquireError};
use tracing::debug;

use crate::error::{Result, TransportError};

#[derive(Debug)]
pub struct OutputQueue {
    items: Mutex<VecDeque<BytesMut>>,
    slots: Semaphore,
    queued_bytes: AtomicU64,
    capacity: usize,
}

/// Logs an enqueue that was dropped while waiting for a slot
struct PendingEnqueue {
    len: usize,
    done: bool,
}

impl Drop for PendingEnqueue {
    fn drop(&mut self) {
        if !self.done {
            debug!("Enqueue of {} bytes abandoned while waiting for queue space", self.len);
        }
    }
}

impl OutputQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            slots: Semaphore::new(capacity),
            queued_bytes: AtomicU64::new(0),
            capacity,
        }
    }

    /// Append a buffer, waiting for a free slot if the queue is full.
    ///
    /// Cancel safe: a future dropped while waiting queues nothing.
    pub async fn push(&self, buffer: BytesMut) -> Result<()> {
        let mut pending = PendingEnqueue {
            len: buffer.len(),
            done: false,
        };
        let permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| TransportError::EnqueueAbandoned)?;
        permit.forget();

        self.append(buffer)?;
        pending.done = true;
        Ok(())
    }

    /// Append a buffer if a slot is free
    pub fn try_push(&self, buffer: BytesMut) -> Result<()> {
        match self.slots.try_acquire() {
            Ok(permit) => permit.forget(),
            Err(TryAcquireError::NoPermits) => return Err(TransportError::BufferFull),
            Err(TryAcquireError::Closed) => return Err(TransportError::EnqueueAbandoned),
        }
        self.append(buffer)
    }

    fn append(&self, buffer: BytesMut) -> Result<()> {
        let mut items = self.items.lock();
        // Closed between taking the slot and getting here
        if self.slots.is_closed() {
            drop(items);
            self.slots.add_permits(1);
            return Err(TransportError::EnqueueAbandoned);
        }
        self.queued_bytes
            .fetch_add(buffer.len() as u64, Ordering::SeqCst);
        items.push_back(buffer);
        Ok(())
    }

    /// Take the oldest buffer for writing. Its bytes stay counted until the
    /// caller reports it with [`finish`](Self::finish).
    pub fn pop_front(&self) -> Option<BytesMut> {
        self.items.lock().pop_front()
    }

    /// Release the slot and byte count of a buffer taken by `pop_front`
    pub fn finish(&self, len: usize) {
        self.queued_bytes.fetch_sub(len as u64, Ordering::SeqCst);
        self.slots.add_permits(1);
    }

    /// Refuse further pushes and wake producers waiting for a slot
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Drop every queued buffer. Returns how many were discarded.
    pub fn clear(&self) -> usize {
        let drained: Vec<BytesMut> = self.items.lock().drain(..).collect();
        for buffer in &drained {
            self.finish(buffer.len());
        }
        drained.len()
    }

    /// Bytes pushed and not yet finished, in-flight buffer included
    pub fn queued_bytes(&self) -> u64 {
        self.queued_bytes.load(Ordering::SeqCst)
    }

    /// Buffers currently waiting in the queue
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
