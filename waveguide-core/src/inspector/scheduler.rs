// SPDX-FileCopyrightText: 2026 The waveguide authors
//
// SPDX-License-Identifier: BSD-2-Clause

//! Pool of workers that run per-inspector feed tasks, plus a barrier used
//! to force quiescence before the source loop advances the spectral
//! tuner's internal state (spec §4.7).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use num_complex::Complex32;

use crate::messages::Message;
use crate::worker::Worker;

use super::instance;
use super::Inspector;

/// `N = max(available-cores - 1, 2)`, matching
/// `suscan_inspsched_get_min_workers` (spec SPEC_FULL.md supplement).
pub fn default_worker_count() -> usize {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
    cores.saturating_sub(1).max(2)
}

/// A unit of scheduled work: a buffer delivered to one inspector.
pub struct Task {
    pub inspector: Arc<Inspector>,
    pub data: Vec<Complex32>,
}

/// Freelist-backed task-info allocator (spec §4.7
/// "acquire_task_info"/"return_task_info").
#[derive(Default)]
struct TaskInfoPool {
    freelist: Vec<()>,
    alloc_count: usize,
}

pub struct InspectorScheduler {
    workers: Vec<Worker<Mailbox, ()>>,
    last_worker: AtomicUsize,
    barrier: Arc<Barrier>,
    task_info: Arc<Mutex<TaskInfoPool>>,
    outbox: Arc<Mailbox>,
}

/// The scheduler's shared control outbox; workers hand this to every
/// callback invocation so feed tasks can emit Estimator/Spectrum/Samples
/// messages.
pub type Mailbox = crate::mailbox::Mailbox<Message>;

impl InspectorScheduler {
    pub fn new(worker_count: usize, outbox: Arc<Mailbox>) -> Self {
        let workers = (0..worker_count)
            .map(|_| Worker::new(outbox.clone(), Arc::new(())))
            .collect();
        Self {
            workers,
            last_worker: AtomicUsize::new(0),
            barrier: Arc::new(Barrier::new(worker_count + 1)),
            task_info: Arc::new(Mutex::new(TaskInfoPool::default())),
            outbox,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn outbox(&self) -> &Arc<Mailbox> {
        &self.outbox
    }

    /// Reserve a task-info slot for `insp`, taking a `task_info` ref.
    pub fn acquire_task_info(&self, insp: &Arc<Inspector>) {
        let mut pool = self.task_info.lock().unwrap();
        if pool.freelist.pop().is_none() {
            pool.alloc_count += 1;
        }
        insp.refs.acquire("task_info");
    }

    /// Release a task-info slot acquired by `acquire_task_info`, returning
    /// it to the freelist and releasing the `task_info` ref. Takes the
    /// pool directly (rather than `&self`) so it can run from inside the
    /// worker callback, which outlives the scheduler call that queued it.
    fn return_task_info(task_info: &Arc<Mutex<TaskInfoPool>>, insp: &Arc<Inspector>) {
        task_info.lock().unwrap().freelist.push(());
        insp.refs.release("task_info");
    }

    /// Round-robin enqueue a feed task; runs the estimator, spectrum, and
    /// sampler loops on whichever worker picks it up (spec §4.9). On any
    /// failure inside the task, the inspector transitions to Halting.
    /// The `task_info` ref taken at enqueue is always returned once the
    /// task has run, regardless of outcome.
    pub fn queue_task(&self, task: Task) {
        self.acquire_task_info(&task.inspector);
        let idx = self.last_worker.fetch_add(1, Ordering::SeqCst) % self.workers.len();
        let insp = task.inspector.clone();
        let data = task.data;
        let task_info = self.task_info.clone();

        self.workers[idx].push(Box::new(move |outbox: &Mailbox, _private: &()| {
            if instance::run_feed_task(&insp, &data, outbox).is_err() {
                insp.transition(super::InspectorState::Halting);
            }
            Self::return_task_info(&task_info, &insp);
            false
        }));
    }

    /// Force quiescence: push a barrier-waiting callback onto every
    /// worker, then block until all of them (and this caller) reach the
    /// barrier (spec §4.7 "sync").
    pub fn sync(&self) {
        for worker in &self.workers {
            let barrier = self.barrier.clone();
            worker.push(Box::new(move |_outbox, _private| {
                barrier.wait();
                false
            }));
        }
        self.barrier.wait();
    }

    pub fn halt_all(&mut self, timeout: std::time::Duration) {
        for worker in &mut self.workers {
            worker.halt(timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::{InspectorState, SamplingInfo};
    use std::time::Duration;

    fn test_inspector() -> Arc<Inspector> {
        let insp = Inspector::new(
            1,
            SamplingInfo {
                equiv_samp_rate: 1000.0,
                bandwidth: 500.0,
                center_freq: 0.0,
                fft_size: 64,
                decimation: 1,
            },
        );
        insp.transition(InspectorState::Running);
        insp
    }

    #[test]
    fn f1_sync_forces_all_enqueued_tasks_to_complete() {
        let outbox = Arc::new(Mailbox::new());
        let mut scheduler = InspectorScheduler::new(2, outbox);
        let insp = test_inspector();

        for _ in 0..5 {
            scheduler.queue_task(Task {
                inspector: insp.clone(),
                data: vec![Complex32::new(0.0, 0.0); 16],
            });
        }
        scheduler.sync();
        scheduler.halt_all(Duration::from_secs(1));
    }

    #[test]
    fn default_worker_count_is_at_least_two() {
        assert!(default_worker_count() >= 2);
    }
}
