//! Two-channel entropy pool with a de-duplication watermark.
//!
//! Architecture:
//! 1. **Primary** holds ledger bytes only. Every byte is single-use.
//! 2. **Spare** holds ledger bytes, stretched bytes and fallback bytes. It is
//!    a ring that recycled consumers drain and refill.
//! 3. The **watermark** is the timestamp of the newest batch accepted so far.
//!    Only [`EntropyPool::accept_batch`] moves it, and only forward.
//! 4. Puts never block: a full channel drops the byte.
//! 5. Thread-safe for concurrent access through `Arc<EntropyPool>`.

use std::sync::{Mutex, PoisonError};

use crate::channel::ByteChannel;

/// Default capacity of each channel, in bytes.
pub const DEFAULT_CAPACITY: usize = 5000;

/// Shared entropy state: Primary channel, Spare channel, watermark.
pub struct EntropyPool {
    primary: ByteChannel,
    spare: ByteChannel,
    watermark: Mutex<u64>,
}

impl EntropyPool {
    /// Create an empty pool whose channels each hold `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            primary: ByteChannel::new(capacity),
            spare: ByteChannel::new(capacity),
            watermark: Mutex::new(0),
        }
    }

    /// Channel capacity (same for Primary and Spare).
    pub fn capacity(&self) -> usize {
        self.primary.capacity()
    }

    pub fn primary_len(&self) -> usize {
        self.primary.len()
    }

    pub fn spare_len(&self) -> usize {
        self.spare.len()
    }

    /// Timestamp of the newest accepted batch, `0` before the first one.
    pub fn watermark(&self) -> u64 {
        *self.watermark.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn try_take_primary(&self) -> Option<u8> {
        self.primary.try_take()
    }

    pub fn try_take_spare(&self) -> Option<u8> {
        self.spare.try_take()
    }

    /// Pop four Spare bytes together, or none if fewer than four are held.
    pub fn try_take_spare_block(&self) -> Option<[u8; 4]> {
        self.spare.try_take_array::<4>()
    }

    /// Wait until Primary holds a byte, then pop it.
    pub fn take_primary_blocking(&self) -> u8 {
        self.primary.take_blocking()
    }

    /// Best-effort put into Primary. Only ledger bytes belong here.
    pub fn try_put_primary(&self, byte: u8) -> bool {
        self.primary.try_put(byte)
    }

    /// Best-effort put into Spare.
    pub fn try_put_spare(&self, byte: u8) -> bool {
        self.spare.try_put(byte)
    }

    /// Best-effort bulk put into Spare; returns how many bytes fit.
    pub fn put_spare(&self, bytes: &[u8]) -> usize {
        self.spare.put_many(bytes.iter().copied())
    }

    /// Ingest a batch of ledger bytes whose newest record has timestamp `recency`.
    ///
    /// Stale batches (`recency <= watermark`) are ignored and `false` is
    /// returned. Otherwise the watermark advances to `recency` and the bytes
    /// are pushed last-to-first into both channels.
    pub fn accept_batch(&self, raw: &[u8], recency: u64) -> bool {
        {
            let mut mark = self.watermark.lock().unwrap_or_else(PoisonError::into_inner);
            if recency <= *mark {
                return false;
            }
            *mark = recency;
        }
        self.primary.put_many(raw.iter().rev().copied());
        self.spare.put_many(raw.iter().rev().copied());
        true
    }

    /// Snapshot of channel fill levels and the watermark.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            primary_len: self.primary_len(),
            spare_len: self.spare_len(),
            capacity: self.capacity(),
            watermark: self.watermark(),
        }
    }

    /// Drop everything held in both channels. The watermark is kept.
    pub fn drain(&self) -> usize {
        self.primary.clear() + self.spare.clear()
    }
}

impl Default for EntropyPool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EntropyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntropyPool")
            .field("primary", &self.primary)
            .field("spare", &self.spare)
            .field("watermark", &self.watermark())
            .finish()
    }
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Bytes waiting in Primary.
    pub primary_len: usize,
    /// Bytes waiting in Spare.
    pub spare_len: usize,
    /// Capacity of each channel.
    pub capacity: usize,
    /// Newest accepted batch timestamp.
    pub watermark: u64,
}
