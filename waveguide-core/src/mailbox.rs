// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! FIFO mailbox primitive used for all inter-thread communication in the
//! engine (spec §4.1).
//!
//! An envelope carries an unsigned 32-bit type tag and an opaque payload;
//! ownership of the payload passes into the mailbox on write and out on
//! read. Non-urgent writes go to the tail, urgent writes to the head, and
//! `read_of_type` skips (without discarding) envelopes that don't match.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

/// Watermark past which a growing free-list logs a warning. Correctness
/// never depends on this; it is purely an allocation-pressure signal.
const FREELIST_WARN_WATERMARK: usize = 100;

/// A single envelope: a type tag plus its boxed payload.
struct Envelope<T> {
    tag: u32,
    payload: T,
}

struct Inner<T> {
    queue: VecDeque<Envelope<T>>,
}

/// A FIFO queue of tagged envelopes with blocking, timed, and polling
/// reads, and a head-insertion ("urgent") write.
///
/// `T` is the payload type carried by this mailbox; callers typically
/// instantiate one mailbox type per logical channel (e.g. a worker's
/// `Mailbox<WorkerMsg>`) rather than type-erasing payloads, which is more
/// idiomatic in Rust than the original's `void *` envelopes while keeping
/// the same ordering and ownership contract.
pub struct Mailbox<T> {
    inner: Mutex<Inner<T>>,
    cond: Condvar,
}

/// Result of a timed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTimeout {
    /// No matching envelope arrived before the deadline.
    TimedOut,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
            }),
            cond: Condvar::new(),
        }
    }

    /// Enqueue at the tail. Never blocks.
    pub fn write(&self, tag: u32, payload: T) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.push_back(Envelope { tag, payload });
        self.warn_if_over_watermark(&inner.queue);
        self.cond.notify_all();
    }

    /// Enqueue at the head. Between two urgent writes, the later one ends
    /// up in front, matching the original's `push_front` semantics.
    pub fn write_urgent(&self, tag: u32, payload: T) {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.push_front(Envelope { tag, payload });
        self.warn_if_over_watermark(&inner.queue);
        self.cond.notify_all();
    }

    fn warn_if_over_watermark(&self, queue: &VecDeque<Envelope<T>>) {
        let len = queue.len();
        if len >= FREELIST_WARN_WATERMARK && len % FREELIST_WARN_WATERMARK == 0 {
            warn!(len, "mailbox queue grew past watermark");
        }
    }

    /// Block until any envelope is present, then pop and return the head.
    pub fn read(&self) -> (u32, T) {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(env) = inner.queue.pop_front() {
                return (env.tag, env.payload);
            }
            inner = self.cond.wait(inner).unwrap();
        }
    }

    /// As `read`, but give up after `timeout` and return `Err(TimedOut)`.
    pub fn read_timed(&self, timeout: Duration) -> Result<(u32, T), ReadTimeout> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(env) = inner.queue.pop_front() {
                return Ok((env.tag, env.payload));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ReadTimeout::TimedOut);
            }
            let (guard, result) = self.cond.wait_timeout(inner, deadline - now).unwrap();
            inner = guard;
            if result.timed_out() && inner.queue.is_empty() {
                return Err(ReadTimeout::TimedOut);
            }
        }
    }

    /// Non-blocking read. Returns `None` if the mailbox is empty.
    pub fn poll(&self) -> Option<(u32, T)> {
        let mut inner = self.inner.lock().unwrap();
        inner.queue.pop_front().map(|env| (env.tag, env.payload))
    }

    /// Block until an envelope with the given tag is available. Envelopes
    /// of other tags are skipped in place (not discarded) and remain
    /// visible to later `read`/`read_of_type` calls.
    pub fn read_of_type(&self, tag: u32) -> T {
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(pos) = inner.queue.iter().position(|e| e.tag == tag) {
                return inner.queue.remove(pos).unwrap().payload;
            }
            inner = self.cond.wait(inner).unwrap();
        }
    }

    /// As `read_of_type`, but give up after `timeout`.
    pub fn read_of_type_timed(&self, tag: u32, timeout: Duration) -> Result<T, ReadTimeout> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(pos) = inner.queue.iter().position(|e| e.tag == tag) {
                return Ok(inner.queue.remove(pos).unwrap().payload);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ReadTimeout::TimedOut);
            }
            let (guard, result) = self.cond.wait_timeout(inner, deadline - now).unwrap();
            inner = guard;
            if result.timed_out() && !inner.queue.iter().any(|e| e.tag == tag) {
                return Err(ReadTimeout::TimedOut);
            }
        }
    }

    /// Non-blocking, tag-filtered read.
    pub fn poll_of_type(&self, tag: u32) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        let pos = inner.queue.iter().position(|e| e.tag == tag)?;
        Some(inner.queue.remove(pos).unwrap().payload)
    }

    /// Number of envelopes currently queued. Exposed for diagnostics and
    /// tests; not part of the ordering contract.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain and drop all remaining envelopes, running `on_drop` on each
    /// payload first. Used by `finalize`-style teardown paths that must
    /// destroy callback envelopes rather than silently leak them.
    pub fn drain_with<F: FnMut(u32, T)>(&self, mut on_drop: F) {
        let mut inner = self.inner.lock().unwrap();
        while let Some(env) = inner.queue.pop_front() {
            on_drop(env.tag, env.payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn m1_order_preserved_for_same_tag() {
        let mq: Mailbox<i32> = Mailbox::new();
        mq.write(1, 10);
        mq.write(1, 20);
        mq.write(1, 30);
        assert_eq!(mq.read(), (1, 10));
        assert_eq!(mq.read(), (1, 20));
        assert_eq!(mq.read(), (1, 30));
    }

    #[test]
    fn m2_urgent_goes_to_head() {
        let mq: Mailbox<i32> = Mailbox::new();
        mq.write(b'A' as u32, 1);
        mq.write_urgent(b'B' as u32, 2);
        mq.write(b'A' as u32, 3);
        assert_eq!(mq.read(), (b'B' as u32, 2));
        assert_eq!(mq.read(), (b'A' as u32, 1));
        assert_eq!(mq.read(), (b'A' as u32, 3));
    }

    #[test]
    fn m2_later_urgent_write_ends_up_in_front() {
        let mq: Mailbox<i32> = Mailbox::new();
        mq.write_urgent(1, 1);
        mq.write_urgent(2, 2);
        assert_eq!(mq.read(), (2, 2));
        assert_eq!(mq.read(), (1, 1));
    }

    #[test]
    fn m3_read_of_type_skips_without_discarding() {
        let mq: Mailbox<i32> = Mailbox::new();
        let a = 100;
        let b = 200;
        mq.write(a, 1);
        mq.write(b, 2);
        mq.write(a, 3);
        assert_eq!(mq.read_of_type(a), 1);
        assert_eq!(mq.read_of_type(a), 3);
        assert_eq!(mq.read(), (b, 2));
    }

    #[test]
    fn m4_timed_read_times_out_on_empty_mailbox() {
        let mq: Mailbox<i32> = Mailbox::new();
        let start = Instant::now();
        let result = mq.read_timed(Duration::from_millis(30));
        assert_eq!(result, Err(ReadTimeout::TimedOut));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn poll_is_non_blocking() {
        let mq: Mailbox<i32> = Mailbox::new();
        assert!(mq.poll().is_none());
        mq.write(1, 42);
        assert_eq!(mq.poll(), Some((1, 42)));
        assert!(mq.poll().is_none());
    }

    #[test]
    fn blocking_read_observes_write_from_other_thread() {
        let mq: Arc<Mailbox<i32>> = Arc::new(Mailbox::new());
        let mq2 = mq.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            mq2.write(7, 99);
        });
        assert_eq!(mq.read(), (7, 99));
        handle.join().unwrap();
    }

    #[test]
    fn drain_with_visits_every_remaining_envelope() {
        let mq: Mailbox<i32> = Mailbox::new();
        mq.write(1, 1);
        mq.write(2, 2);
        mq.write(3, 3);
        let mut seen = Vec::new();
        mq.drain_with(|tag, payload| seen.push((tag, payload)));
        assert_eq!(seen, vec![(1, 1), (2, 2), (3, 3)]);
        assert!(mq.is_empty());
    }
}
