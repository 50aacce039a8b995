//! Bounded, thread-safe byte FIFO.
//!
//! Producers never stall: a put into a full channel drops the byte. Consumers
//! get non-blocking `try_take`s plus one blocking take that waits on a condvar
//! until a producer pushes something.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Bounded FIFO of entropy bytes.
pub struct ByteChannel {
    queue: Mutex<VecDeque<u8>>,
    not_empty: Condvar,
    capacity: usize,
}

impl ByteChannel {
    /// Create an empty channel holding at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u8>> {
        // Poisoning ignored: the queue only holds plain bytes.
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Maximum number of bytes held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Push one byte. Returns `false` if the channel was full and the byte was dropped.
    pub fn try_put(&self, byte: u8) -> bool {
        let mut q = self.lock();
        if q.len() >= self.capacity {
            return false;
        }
        q.push_back(byte);
        drop(q);
        self.not_empty.notify_one();
        true
    }

    /// Push as many bytes as fit; returns how many were accepted.
    pub fn put_many<I: IntoIterator<Item = u8>>(&self, bytes: I) -> usize {
        let mut q = self.lock();
        let mut accepted = 0;
        for byte in bytes {
            if q.len() >= self.capacity {
                break;
            }
            q.push_back(byte);
            accepted += 1;
        }
        drop(q);
        if accepted > 0 {
            self.not_empty.notify_all();
        }
        accepted
    }

    /// Pop the oldest byte, if any.
    pub fn try_take(&self) -> Option<u8> {
        self.lock().pop_front()
    }

    /// Pop exactly `N` bytes in one critical section, or nothing.
    pub fn try_take_array<const N: usize>(&self) -> Option<[u8; N]> {
        let mut q = self.lock();
        if q.len() < N {
            return None;
        }
        let mut out = [0u8; N];
        for slot in &mut out {
            *slot = q.pop_front()?;
        }
        Some(out)
    }

    /// Pop the oldest byte, waiting for a producer while the channel is empty.
    ///
    /// There is no timeout; a channel nobody feeds blocks forever.
    pub fn take_blocking(&self) -> u8 {
        let mut q = self.lock();
        loop {
            if let Some(byte) = q.pop_front() {
                return byte;
            }
            q = self
                .not_empty
                .wait(q)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Remove every byte. Returns how many were discarded.
    pub fn clear(&self) -> usize {
        let mut q = self.lock();
        let n = q.len();
        q.clear();
        n
    }
}

impl std::fmt::Debug for ByteChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteChannel")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
