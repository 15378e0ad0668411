// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Single-thread task executor driven by a private inbox mailbox (spec
//! §4.2). A worker doesn't own the data it operates on — it's just a way
//! to delegate callbacks to a dedicated OS thread while funneling their
//! output through a shared outbox.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::mailbox::Mailbox;

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Halted,
}

/// Tags used on a worker's private inbox.
const MSG_CALLBACK: u32 = 1;
const MSG_HALT: u32 = 2;

/// A unit of work a worker consumes from its inbox. Returning `true`
/// requeues the callback at the tail of the inbox (the "restart by
/// return value" convention — lets a persistent callback reschedule
/// itself cheaply without a separate timer mechanism); returning `false`
/// drops it.
pub type WorkerCallback<Outbox, Private> =
    Box<dyn FnMut(&Outbox, &Private) -> bool + Send>;

enum InboxMsg<Outbox, Private> {
    Callback(WorkerCallback<Outbox, Private>),
    Halt,
}

/// Owns one OS thread, consuming callback envelopes from a private inbox
/// it owns, and writing results to an outbox mailbox it does not own.
pub struct Worker<Outbox, Private> {
    inbox: Arc<Mailbox<InboxMsg<Outbox, Private>>>,
    outbox: Arc<Mailbox<u32>>,
    halt_requested: Arc<AtomicBool>,
    state: WorkerState,
    handle: Option<JoinHandle<()>>,
}

impl<Outbox, Private> Worker<Outbox, Private>
where
    Outbox: Send + Sync + 'static,
    Private: Send + Sync + 'static,
{
    /// Spawn a worker thread. `outbox` receives the Halt acknowledgement
    /// (tagged `MSG_HALT`, payload the worker's ordinal passed via
    /// `halt_ack_tag`); `outbox_data` is handed to callbacks on every
    /// invocation alongside `private`.
    pub fn new(outbox_data: Arc<Outbox>, private: Arc<Private>) -> Self {
        let inbox: Arc<Mailbox<InboxMsg<Outbox, Private>>> = Arc::new(Mailbox::new());
        let outbox: Arc<Mailbox<u32>> = Arc::new(Mailbox::new());
        let halt_requested = Arc::new(AtomicBool::new(false));

        let thread_inbox = inbox.clone();
        let thread_outbox = outbox.clone();
        let thread_halt = halt_requested.clone();

        let handle = std::thread::Builder::new()
            .name("waveguide-worker".into())
            .spawn(move || {
                Self::thread_main(thread_inbox, thread_outbox, thread_halt, outbox_data, private)
            })
            .expect("failed to spawn worker thread");

        Self {
            inbox,
            outbox,
            halt_requested,
            state: WorkerState::Running,
            handle: Some(handle),
        }
    }

    fn thread_main(
        inbox: Arc<Mailbox<InboxMsg<Outbox, Private>>>,
        outbox: Arc<Mailbox<u32>>,
        halt_requested: Arc<AtomicBool>,
        outbox_data: Arc<Outbox>,
        private: Arc<Private>,
    ) {
        loop {
            let (_tag, payload) = inbox.read();
            match payload {
                InboxMsg::Callback(mut cb) => {
                    if halt_requested.load(Ordering::SeqCst) {
                        // Halt was requested while this callback sat queued;
                        // drop it without running, matching worker.c's
                        // "destroy pending callbacks" teardown path.
                        continue;
                    }
                    if cb(&outbox_data, &private) {
                        inbox.write(MSG_CALLBACK, InboxMsg::Callback(cb));
                    }
                }
                InboxMsg::Halt => break,
            }
        }

        // Destroy any queued callback envelopes without running them.
        inbox.drain_with(|_, _| {});

        outbox.write_urgent(MSG_HALT, 0);
    }

    /// Enqueue a callback. Never blocks.
    pub fn push(&self, cb: WorkerCallback<Outbox, Private>) {
        self.inbox.write(MSG_CALLBACK, InboxMsg::Callback(cb));
    }

    /// Request cooperative halt: writes an urgent Halt to the inbox and
    /// sets the halt flag so in-flight loops stop rescheduling.
    pub fn request_halt(&mut self) {
        self.halt_requested.store(true, Ordering::SeqCst);
        self.inbox.write_urgent(MSG_HALT, InboxMsg::Halt);
    }

    /// Block until the worker acknowledges halt, then join its thread.
    /// Bounded by `timeout`; on timeout, logs a warning and leaves the
    /// thread running rather than forcibly killing it (spec §5).
    pub fn halt(&mut self, timeout: std::time::Duration) {
        if self.state == WorkerState::Halted {
            return;
        }
        self.request_halt();
        match self.outbox.read_timed(timeout) {
            Ok((tag, _)) if tag == MSG_HALT => {}
            Ok((tag, _)) => {
                tracing::warn!(tag, "unexpected worker outbox message while halting");
            }
            Err(_) => {
                tracing::warn!("worker halt timed out; leaving thread detached");
                return;
            }
        }
        self.state = WorkerState::Halted;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }
}

impl<Outbox, Private> Drop for Worker<Outbox, Private> {
    fn drop(&mut self) {
        if self.state != WorkerState::Halted {
            self.halt_requested.store(true, Ordering::SeqCst);
            self.inbox.write_urgent(MSG_HALT, InboxMsg::Halt);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn w1_callback_runs_exactly_n_times_in_order() {
        let outbox = Arc::new(());
        let private = Arc::new(());
        let mut worker: Worker<(), ()> = Worker::new(outbox, private);

        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = order.clone();
            worker.push(Box::new(move |_out, _priv| {
                order.lock().unwrap().push(i);
                false
            }));
        }

        // Give the thread a moment to drain the queue.
        std::thread::sleep(Duration::from_millis(100));
        worker.halt(Duration::from_secs(1));
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn w3_self_restarting_callback_runs_exactly_m_times() {
        let outbox = Arc::new(());
        let private = Arc::new(());
        let mut worker: Worker<(), ()> = Worker::new(outbox, private);

        let count = Arc::new(AtomicUsize::new(0));
        let target = 7;
        let count2 = count.clone();
        worker.push(Box::new(move |_out, _priv| {
            let prev = count2.fetch_add(1, Ordering::SeqCst);
            prev + 1 < target
        }));

        std::thread::sleep(Duration::from_millis(150));
        worker.halt(Duration::from_secs(1));
        assert_eq!(count.load(Ordering::SeqCst), target);
    }

    #[test]
    fn w2_halt_acks_exactly_once_and_joins() {
        let outbox = Arc::new(());
        let private = Arc::new(());
        let mut worker: Worker<(), ()> = Worker::new(outbox, private);
        worker.halt(Duration::from_secs(1));
        assert_eq!(worker.state(), WorkerState::Halted);
    }
}
