use crate::Buffer;

use std::sync::Mutex;

/// A freelist of session buffers. Buffers are handed out on accept and
/// returned when a session closes, capping the allocation churn from
/// short-lived connections. A buffer which grew beyond the target size is
/// dropped on release rather than retained.
pub struct BufferPool {
    buffers: Mutex<Vec<Buffer>>,
    target_size: usize,
    max_retained: usize,
}

impl BufferPool {
    pub fn new(target_size: usize, max_retained: usize) -> Self {
        // buffers round their capacity up to a power of two; the pool must
        // use the same size or it would consider every buffer oversized
        let target_size = std::cmp::max(1, target_size).next_power_of_two();
        Self {
            buffers: Mutex::new(Vec::new()),
            target_size,
            max_retained,
        }
    }

    /// Take a buffer from the pool, or allocate a new one if the pool is
    /// empty.
    pub fn acquire(&self) -> Buffer {
        let mut buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        buffers
            .pop()
            .unwrap_or_else(|| Buffer::new(self.target_size))
    }

    /// Return a buffer to the pool. Oversized buffers are dropped so that one
    /// large request does not pin memory for the lifetime of the process, and
    /// the pool never retains more than its configured limit.
    pub fn release(&self, mut buffer: Buffer) {
        if buffer.capacity() > self.target_size {
            return;
        }
        buffer.clear();
        let mut buffers = self.buffers.lock().unwrap_or_else(|e| e.into_inner());
        if buffers.len() < self.max_retained {
            buffers.push(buffer);
        }
    }

    /// The number of buffers currently retained.
    pub fn retained(&self) -> usize {
        self.buffers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn acquire_release_cycle() {
        let pool = BufferPool::new(1024, 4);
        let buffer = pool.acquire();
        assert_eq!(pool.retained(), 0);
        pool.release(buffer);
        assert_eq!(pool.retained(), 1);
        let _ = pool.acquire();
        assert_eq!(pool.retained(), 0);
    }

    #[test]
    fn released_buffers_are_cleared() {
        let pool = BufferPool::new(1024, 4);
        let mut buffer = pool.acquire();
        buffer.put_slice(b"stale");
        pool.release(buffer);
        let buffer = pool.acquire();
        assert_eq!(bytes::Buf::remaining(&buffer), 0);
    }

    #[test]
    fn retain_limit_is_enforced() {
        let pool = BufferPool::new(1024, 2);
        let a = pool.acquire();
        let b = pool.acquire();
        let c = pool.acquire();
        pool.release(a);
        pool.release(b);
        pool.release(c);
        assert_eq!(pool.retained(), 2);
    }

    #[test]
    fn oversized_buffers_are_dropped() {
        let pool = BufferPool::new(16, 4);
        let mut buffer = pool.acquire();
        // grow well past the target size
        buffer.put_slice(&[0; 4096]);
        pool.release(buffer);
        assert_eq!(pool.retained(), 0);
    }
}
