// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Bounded pool of reusable sample buffers (spec §4.3).
//!
//! Buffers are checked out with `get()` (blocking when the pool is
//! exhausted) and returned with `give()` (or simply dropped). Each slot's
//! backing allocation is held by the pool for its whole lifetime and
//! handed back out on the next checkout instead of being reallocated —
//! the pool grows lazily up to `capacity` slots and then only recycles.
//!
//! A true doubled virtual-memory mapping (so a circular read wraps
//! without copying) needs a file-backed (memfd) double-map, which this
//! crate's dependency stack has no real handle on; `circular` is always
//! `false` and `read_circular` always copies on wraparound, honestly
//! reflecting what a caller actually gets.

use std::sync::{Arc, Condvar, Mutex};

use num_complex::Complex32;

/// One checked-out buffer. `give()`s itself back to the pool on drop so
/// callers can't forget to release it.
pub struct SampleBuffer {
    data: Box<[Complex32]>,
    /// Reverse-index into the owning pool's slot storage.
    slot: usize,
    pool: Arc<PoolInner>,
    /// Set to `true` once ownership has been returned to the pool via
    /// `give`; guards against double-release on drop.
    released: bool,
}

impl SampleBuffer {
    pub fn as_slice(&self) -> &[Complex32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex32] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether this buffer supports wraparound-contiguous circular reads
    /// without copying. Always `false` (see module docs).
    pub fn is_circular(&self) -> bool {
        false
    }

    /// Read `len` samples starting at `start`, wrapping around the end of
    /// the buffer. Panics (a programmer error, per spec §4.3) if `len`
    /// exceeds the buffer's capacity.
    pub fn read_circular(&self, start: usize, len: usize) -> Vec<Complex32> {
        assert!(
            len <= self.data.len(),
            "BUG: circular read length exceeds buffer capacity"
        );
        if self.data.is_empty() {
            return Vec::new();
        }
        let cap = self.data.len();
        let start = start % cap;
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            out.push(self.data[(start + i) % cap]);
        }
        out
    }

    /// Explicitly release the buffer back to its pool. Equivalent to
    /// dropping it, but lets callers observe the point of release.
    pub fn give(mut self) {
        self.released = true;
        let data = std::mem::replace(&mut self.data, Vec::new().into_boxed_slice());
        self.pool.release(self.slot, data);
    }
}

impl Drop for SampleBuffer {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            let data = std::mem::replace(&mut self.data, Vec::new().into_boxed_slice());
            self.pool.release(self.slot, data);
        }
    }
}

struct PoolInner {
    state: Mutex<PoolState>,
    cond: Condvar,
}

/// Slot storage is indexed; `None` means the slot's buffer is currently
/// checked out, `Some` means it's sitting idle ready for reuse.
struct PoolState {
    capacity: usize,
    slots: Vec<Option<Box<[Complex32]>>>,
    /// Indices into `slots` holding a buffer ready for reuse.
    free: Vec<usize>,
    checked_out: usize,
}

impl PoolInner {
    fn release(&self, slot: usize, data: Box<[Complex32]>) {
        let mut state = self.state.lock().unwrap();
        state.slots[slot] = Some(data);
        state.free.push(slot);
        state.checked_out -= 1;
        self.cond.notify_one();
    }
}

/// A bounded pool of fixed-size sample buffers.
pub struct SampleBufferPool {
    inner: Arc<PoolInner>,
    buf_len: usize,
}

impl SampleBufferPool {
    /// Build a pool of `capacity` buffers, each holding `buf_len` complex
    /// samples. Slots are allocated lazily as they're first needed, then
    /// reused for the pool's whole lifetime.
    pub fn new(capacity: usize, buf_len: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    capacity,
                    slots: Vec::with_capacity(capacity),
                    free: Vec::new(),
                    checked_out: 0,
                }),
                cond: Condvar::new(),
            }),
            buf_len,
        }
    }

    fn new_buffer(&self) -> Box<[Complex32]> {
        vec![Complex32::new(0.0, 0.0); self.buf_len].into_boxed_slice()
    }

    /// Take a free slot's buffer if one exists, else grow the pool by one
    /// slot (allocating fresh), else report exhaustion.
    fn checkout_locked(state: &mut PoolState, fresh: impl FnOnce() -> Box<[Complex32]>) -> Option<(usize, Box<[Complex32]>)> {
        if let Some(slot) = state.free.pop() {
            let data = state.slots[slot].take().expect("free slot always holds a buffer");
            state.checked_out += 1;
            return Some((slot, data));
        }
        if state.slots.len() < state.capacity {
            let slot = state.slots.len();
            state.slots.push(None);
            state.checked_out += 1;
            return Some((slot, fresh()));
        }
        None
    }

    /// Check out a buffer, blocking if the pool is at capacity.
    pub fn get(&self) -> SampleBuffer {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if let Some((slot, data)) = Self::checkout_locked(&mut state, || self.new_buffer()) {
                return SampleBuffer {
                    data,
                    slot,
                    pool: self.inner.clone(),
                    released: false,
                };
            }
            state = self.inner.cond.wait(state).unwrap();
        }
    }

    /// Non-blocking checkout.
    pub fn try_get(&self) -> Option<SampleBuffer> {
        let mut state = self.inner.state.lock().unwrap();
        let (slot, data) = Self::checkout_locked(&mut state, || self.new_buffer())?;
        Some(SampleBuffer {
            data,
            slot,
            pool: self.inner.clone(),
            released: false,
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.state.lock().unwrap().capacity
    }

    pub fn checked_out(&self) -> usize {
        self.inner.state.lock().unwrap().checked_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn b1_get_blocks_until_give_when_at_capacity() {
        let pool = Arc::new(SampleBufferPool::new(1, 16));
        let first = pool.get();
        assert_eq!(pool.checked_out(), 1);

        let released = Arc::new(AtomicBool::new(false));
        let released2 = released.clone();
        let pool2 = pool.clone();
        let handle = std::thread::spawn(move || {
            let second = pool2.get();
            assert!(released2.load(Ordering::SeqCst));
            drop(second);
        });

        std::thread::sleep(Duration::from_millis(30));
        released.store(true, Ordering::SeqCst);
        drop(first);
        handle.join().unwrap();
    }

    #[test]
    fn b2_try_get_returns_none_when_exhausted() {
        let pool = SampleBufferPool::new(2, 8);
        let _a = pool.try_get().unwrap();
        let _b = pool.try_get().unwrap();
        assert!(pool.try_get().is_none());
    }

    #[test]
    fn b3_give_releases_capacity_back_to_pool() {
        let pool = SampleBufferPool::new(1, 4);
        let buf = pool.get();
        assert_eq!(pool.checked_out(), 1);
        buf.give();
        assert_eq!(pool.checked_out(), 0);
        assert!(pool.try_get().is_some());
    }

    #[test]
    fn buffer_reports_requested_length() {
        let pool = SampleBufferPool::new(1, 32);
        let buf = pool.get();
        assert_eq!(buf.len(), 32);
    }

    #[test]
    fn b4_checked_out_buffer_is_reused_not_reallocated() {
        let pool = SampleBufferPool::new(1, 16);
        let first = pool.get();
        let first_ptr = first.as_slice().as_ptr();
        first.give();

        let second = pool.get();
        assert_eq!(second.as_slice().as_ptr(), first_ptr, "the pool must hand back the same slot's allocation");
    }
}
