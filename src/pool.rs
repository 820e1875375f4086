//! Reusable grayscale frame pool.
//!
//! The pool pre-allocates every output frame when the converter prepares,
//! so rendering never touches the heap. The retained-count ceiling bounds
//! how many frames may be in flight at once: checkout is `try`-only and
//! signals exhaustion instead of blocking or growing, which is the
//! converter's backpressure signal.
//!
//! # Design
//!
//! - Fixed capacity: every frame in a pool has the same dimensions
//! - RAII: [`GrayFrame`] returns its storage to the pool on drop
//! - Any-thread hand-back: the free list is lock-protected, so a frame may
//!   be released from a different thread than the one that rendered it
//! - Statistics: acquisition and exhaustion counters for monitoring

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A fixed-capacity pool of single-channel 8-bit frames.
pub struct FramePool {
    inner: Arc<PoolInner>,
}

/// Shared pool state, referenced by the pool and by outstanding frames.
struct PoolInner {
    width: u32,
    height: u32,
    bytes_per_row: usize,
    capacity: usize,
    /// Idle frame storage. Frames push themselves back here on drop.
    free: Mutex<Vec<Vec<u8>>>,
    in_use: AtomicUsize,
    acquisitions: AtomicU64,
    exhaustions: AtomicU64,
}

/// Statistics about pool usage.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Total frames in the pool.
    pub capacity: usize,
    /// Currently idle frames.
    pub available: usize,
    /// Currently in-flight frames.
    pub in_use: usize,
    /// Total successful acquisitions.
    pub acquisitions: u64,
    /// Acquisitions denied because the pool was empty.
    pub exhaustions: u64,
}

impl FramePool {
    /// Create a pool of `capacity` frames of `width` x `height` samples.
    ///
    /// All frame storage is allocated up front; rendering only recycles it.
    /// Fails with [`Error::AllocationFailed`] on a zero capacity, zero
    /// dimensions, or when the allocator cannot satisfy the request.
    pub fn new(width: u32, height: u32, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::AllocationFailed(
                "retained frame count must be > 0".into(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(Error::AllocationFailed(format!(
                "zero frame dimensions: {width}x{height}"
            )));
        }

        // Output rows are tightly packed, one byte per sample.
        let bytes_per_row = width as usize;
        let frame_size = bytes_per_row
            .checked_mul(height as usize)
            .ok_or_else(|| Error::AllocationFailed("frame size overflows".into()))?;

        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            let mut storage: Vec<u8> = Vec::new();
            storage
                .try_reserve_exact(frame_size)
                .map_err(|e| Error::AllocationFailed(e.to_string()))?;
            storage.resize(frame_size, 0);
            free.push(storage);
        }

        Ok(Self {
            inner: Arc::new(PoolInner {
                width,
                height,
                bytes_per_row,
                capacity,
                free: Mutex::new(free),
                in_use: AtomicUsize::new(0),
                acquisitions: AtomicU64::new(0),
                exhaustions: AtomicU64::new(0),
            }),
        })
    }

    /// Acquire an idle frame without blocking.
    ///
    /// Returns `None` when every frame is in flight. The pool never grows
    /// and never waits; the caller decides how to react.
    pub fn try_acquire(&self) -> Option<GrayFrame> {
        let storage = self.inner.free.lock().unwrap().pop();
        match storage {
            Some(storage) => {
                self.inner.acquisitions.fetch_add(1, Ordering::Relaxed);
                self.inner.in_use.fetch_add(1, Ordering::Relaxed);
                Some(GrayFrame {
                    storage: Some(storage),
                    pool: Arc::clone(&self.inner),
                })
            }
            None => {
                self.inner.exhaustions.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Total number of frames in the pool.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of currently idle frames.
    pub fn available(&self) -> usize {
        self.inner.free.lock().unwrap().len()
    }

    /// Frame width in samples.
    pub fn frame_width(&self) -> u32 {
        self.inner.width
    }

    /// Frame height in rows.
    pub fn frame_height(&self) -> u32 {
        self.inner.height
    }

    /// Get pool statistics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.inner.capacity,
            available: self.available(),
            in_use: self.inner.in_use.load(Ordering::Relaxed),
            acquisitions: self.inner.acquisitions.load(Ordering::Relaxed),
            exhaustions: self.inner.exhaustions.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for FramePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePool")
            .field("width", &self.inner.width)
            .field("height", &self.inner.height)
            .field("capacity", &self.inner.capacity)
            .field("available", &self.available())
            .finish()
    }
}

/// A grayscale output frame borrowed from a pool.
///
/// One byte per sample, rows tightly packed. The storage automatically
/// returns to its pool when the frame is dropped, from any thread. A frame
/// outlives a converter reset: it keeps the pool storage alive until the
/// caller releases it.
pub struct GrayFrame {
    /// Taken in `drop` when the storage goes back to the pool.
    storage: Option<Vec<u8>>,
    pool: Arc<PoolInner>,
}

impl GrayFrame {
    /// Frame width in samples.
    #[inline]
    pub fn width(&self) -> u32 {
        self.pool.width
    }

    /// Frame height in rows.
    #[inline]
    pub fn height(&self) -> u32 {
        self.pool.height
    }

    /// Bytes from the start of one row to the start of the next.
    #[inline]
    pub fn bytes_per_row(&self) -> usize {
        self.pool.bytes_per_row
    }

    /// The frame's pixel data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.storage.as_deref().unwrap_or(&[])
    }

    /// The frame's pixel data, mutably.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.storage.as_deref_mut().unwrap_or(&mut [])
    }

    /// One row of pixel data.
    ///
    /// # Panics
    ///
    /// Panics if `y >= self.height()`.
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(y < self.pool.height, "row {y} out of bounds");
        &self.data()[y as usize * self.pool.bytes_per_row..][..self.pool.width as usize]
    }
}

impl Drop for GrayFrame {
    fn drop(&mut self) {
        if let Some(storage) = self.storage.take() {
            self.pool.in_use.fetch_sub(1, Ordering::Relaxed);
            if let Ok(mut free) = self.pool.free.lock() {
                free.push(storage);
            }
        }
    }
}

impl std::fmt::Debug for GrayFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrayFrame")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
