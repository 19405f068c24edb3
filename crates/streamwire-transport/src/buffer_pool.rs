//! Reusable output buffers
//!
//! Producers acquire a buffer, encode into it and hand it to the output
//! queue. Once the writer has flushed it, the buffer comes back here.

use bytes::BytesMut;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Bounded cache of byte buffers
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<BytesMut>>,
    max_pooled: usize,
    allocations: AtomicU64,
}

impl BufferPool {
    pub fn new(max_pooled: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            max_pooled,
            allocations: AtomicU64::new(0),
        }
    }

    /// Get an empty buffer with room for `capacity` bytes.
    ///
    /// A pooled buffer of exactly `capacity` is reused; otherwise a new one
    /// is allocated.
    pub fn acquire(&self, capacity: usize) -> BytesMut {
        {
            let mut buffers = self.buffers.lock();
            if let Some(idx) = buffers.iter().rposition(|b| b.capacity() == capacity) {
                let mut buffer = buffers.swap_remove(idx);
                buffer.clear();
                return buffer;
            }
        }

        self.allocations.fetch_add(1, Ordering::Relaxed);
        BytesMut::with_capacity(capacity)
    }

    /// Return a consumed buffer. Dropped when the pool is full.
    pub fn release(&self, buffer: BytesMut) {
        let mut buffers = self.buffers.lock();
        if buffers.len() >= self.max_pooled {
            trace!("Buffer pool full, dropping {} byte buffer", buffer.capacity());
            return;
        }
        buffers.push(buffer);
    }

    /// Number of buffers waiting for reuse
    pub fn len(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffers allocated by `acquire` since creation
    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_POOL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn test_release_then_acquire_same_capacity() {
        let pool = BufferPool::new(4);
        let mut buffer = pool.acquire(64);
        assert_eq!(pool.allocations(), 1);

        buffer.put_slice(b"written payload");
        let ptr = buffer.as_ptr();
        pool.release(buffer);
        assert_eq!(pool.len(), 1);

        let reused = pool.acquire(64);
        assert!(reused.is_empty());
        assert_eq!(reused.as_ptr(), ptr);
        assert_eq!(pool.allocations(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_different_capacity_allocates() {
        let pool = BufferPool::new(4);
        pool.release(BytesMut::with_capacity(32));

        let buffer = pool.acquire(48);
        assert!(buffer.capacity() >= 48);
        assert_eq!(pool.allocations(), 1);
        // The mismatched buffer stays pooled
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_full_pool_drops_release() {
        let pool = BufferPool::new(2);
        for _ in 0..3 {
            pool.release(BytesMut::with_capacity(16));
        }
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_exact_match_preferred() {
        let pool = BufferPool::new(4);
        pool.release(BytesMut::with_capacity(16));
        pool.release(BytesMut::with_capacity(128));
        pool.release(BytesMut::with_capacity(32));

        let buffer = pool.acquire(128);
        assert_eq!(buffer.capacity(), 128);
        assert_eq!(pool.allocations(), 0);
        assert_eq!(pool.len(), 2);
    }
}
